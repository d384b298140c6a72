use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};

/// Something that rebuilds an external view of the ledger after it changes.
pub trait IndexRefresher: Send + Sync {
    fn refresh(&self) -> io::Result<()>;
}

/// Runs `paisa update --config <path>` when the config file exists.
#[derive(Debug, Clone)]
pub struct PaisaRefresher {
    config_path: PathBuf,
    binary: Option<PathBuf>,
}

impl PaisaRefresher {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            binary: None,
        }
    }

    /// Use `binary` instead of looking `paisa` up on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

impl IndexRefresher for PaisaRefresher {
    fn refresh(&self) -> io::Result<()> {
        if !self.config_path.is_file() {
            log::warn!(
                "skipping index refresh, {} not found",
                self.config_path.display()
            );
            return Ok(());
        }

        let output = Command::new(crate::binpath::paisa_path(self.binary.as_deref()))
            .arg("update")
            .arg("--config")
            .arg(&self.config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;
        if output.status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "paisa update failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[derive(Default)]
struct WorkerState {
    running: bool,
    dirty: bool,
}

/// Runs refreshes for one refresher, one at a time.
///
/// A request made while a refresh is in flight marks the index dirty; any
/// number of such requests collapse into a single follow-up run that starts
/// after the current one finishes.
pub struct RefreshWorker {
    refresher: Arc<dyn IndexRefresher>,
    state: Mutex<WorkerState>,
    idle: Condvar,
}

impl RefreshWorker {
    pub fn new(refresher: Arc<dyn IndexRefresher>) -> Arc<Self> {
        Arc::new(Self {
            refresher,
            state: Mutex::new(WorkerState::default()),
            idle: Condvar::new(),
        })
    }

    /// Schedule a refresh without waiting for it. Failures are logged and dropped.
    pub fn request(self: &Arc<Self>) {
        {
            let mut state = self.lock_state();
            if state.running {
                state.dirty = true;
                return;
            }
            state.running = true;
        }

        let worker = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("index-refresh".to_string())
            .spawn(move || worker.run());
        if let Err(err) = spawned {
            self.lock_state().running = false;
            self.idle.notify_all();
            log::warn!("could not start index refresh (ignoring): {err}");
        }
    }

    fn run(&self) {
        loop {
            if let Err(err) = self.refresher.refresh() {
                log::warn!("index refresh failed (ignoring): {err}");
            }
            let mut state = self.lock_state();
            if state.dirty {
                state.dirty = false;
            } else {
                state.running = false;
                self.idle.notify_all();
                return;
            }
        }
    }

    /// Block until no refresh is running or queued.
    pub fn wait_idle(&self) {
        let mut state = self.lock_state();
        while state.running {
            state = self
                .idle
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, WorkerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::mpsc;
    use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

    fn create_temp_dir(prefix: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "pocketledger-{prefix}-{}-{now}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn missing_config_skips_without_running_anything() {
        let refresher = PaisaRefresher::new(
            std::env::temp_dir().join(format!("pocketledger-no-such-{}.yaml", std::process::id())),
        )
        .with_binary("/definitely/not/a/paisa/binary");
        assert!(refresher.refresh().is_ok());
    }

    #[test]
    fn missing_binary_is_an_error() {
        let dir = create_temp_dir("indexer-no-binary");
        let config = dir.join("paisa.yaml");
        fs::write(&config, "journal_path: finance.ledger\n").unwrap();

        let refresher = PaisaRefresher::new(&config).with_binary(dir.join("no-such-paisa"));
        let err = refresher.refresh().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        let _ = fs::remove_dir_all(&dir);
    }

    struct Failing(Mutex<mpsc::Sender<()>>);

    impl IndexRefresher for Failing {
        fn refresh(&self) -> io::Result<()> {
            self.0.lock().unwrap().send(()).unwrap();
            Err(io::Error::other("boom"))
        }
    }

    #[test]
    fn failed_refresh_is_swallowed_and_worker_recovers() {
        let (tx, rx) = mpsc::channel();
        let worker = RefreshWorker::new(Arc::new(Failing(Mutex::new(tx))));
        worker.request();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        worker.wait_idle();

        worker.request();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }

    /// Sleeps while counting how many refreshes overlap.
    #[derive(Default)]
    struct SlowRefresher {
        active: Mutex<usize>,
        peak: Mutex<usize>,
        starts: Mutex<Vec<Instant>>,
    }

    impl IndexRefresher for SlowRefresher {
        fn refresh(&self) -> io::Result<()> {
            {
                let mut active = self.active.lock().unwrap();
                *active += 1;
                let mut peak = self.peak.lock().unwrap();
                *peak = (*peak).max(*active);
                self.starts.lock().unwrap().push(Instant::now());
            }
            std::thread::sleep(Duration::from_millis(300));
            *self.active.lock().unwrap() -= 1;
            Ok(())
        }
    }

    #[test]
    fn requests_during_a_refresh_collapse_into_one_follow_up() {
        let slow = Arc::new(SlowRefresher::default());
        let worker = RefreshWorker::new(Arc::clone(&slow) as Arc<dyn IndexRefresher>);

        worker.request();
        std::thread::sleep(Duration::from_millis(50));
        worker.request();
        worker.request();
        let last_request = Instant::now();
        worker.wait_idle();

        assert_eq!(*slow.peak.lock().unwrap(), 1);
        let starts = slow.starts.lock().unwrap();
        assert_eq!(starts.len(), 2);
        assert!(starts[1] > last_request);
    }
}
