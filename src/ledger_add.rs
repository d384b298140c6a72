use crate::indexer::{IndexRefresher, RefreshWorker};
use chrono::{Local, NaiveDate};
use fs2::FileExt;
use std::collections::HashMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use thiserror::Error;

pub const DEFAULT_COMMODITY: &str = "IDR";

/// Minimum width of the debit account column, so amounts line up.
const ACCOUNT_COLUMN_WIDTH: usize = 39;
const INDENT: &str = "    ";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("amount must be a whole number, got '{0}'")]
    InvalidAmount(String),
    #[error("ledger I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A whole amount in the smallest currency unit, kept as its digit string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Amount(String);

impl Amount {
    /// Strip `.` and `,` grouping separators and require the rest to be digits.
    pub fn parse(text: &str) -> Result<Self, LedgerError> {
        let digits: String = text.chars().filter(|c| *c != '.' && *c != ',').collect();
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidAmount(text.to_string()));
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub date: NaiveDate,
    pub description: String,
    pub amount: Amount,
    pub debit_account: String,
    pub credit_account: String,
}

impl Posting {
    /// Render the three-line block, terminated by a single newline.
    pub fn render(&self, commodity: &str) -> String {
        format!(
            "{date} * {description}\n{INDENT}{debit:<width$} {commodity} {amount}\n{INDENT}{credit}\n",
            date = self.date.format("%Y-%m-%d"),
            description = single_line(&self.description),
            debit = self.debit_account,
            width = ACCOUNT_COLUMN_WIDTH,
            amount = self.amount,
            credit = self.credit_account,
        )
    }
}

fn single_line(value: &str) -> String {
    if value.contains(['\n', '\r']) {
        value
            .split(['\n', '\r'])
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        value.to_string()
    }
}

/// Appends postings to one ledger file.
///
/// Every append holds an in-process lock keyed by the ledger path plus an
/// exclusive advisory lock on the file itself for the whole
/// inspect-trailing-bytes-then-write sequence.
pub struct LedgerWriter {
    journal_path: PathBuf,
    commodity: String,
    refresh_worker: Option<Arc<RefreshWorker>>,
}

impl LedgerWriter {
    pub fn new(journal_path: impl Into<PathBuf>, commodity: impl Into<String>) -> Self {
        Self {
            journal_path: journal_path.into(),
            commodity: commodity.into(),
            refresh_worker: None,
        }
    }

    /// Refresh `refresher` in the background after each successful append.
    /// Refreshes never overlap; appends during one queue a single follow-up.
    pub fn with_refresher(mut self, refresher: Arc<dyn IndexRefresher>) -> Self {
        self.refresh_worker = Some(RefreshWorker::new(refresher));
        self
    }

    /// Wait for any background index refresh to finish.
    pub fn wait_for_refresh(&self) {
        if let Some(worker) = &self.refresh_worker {
            worker.wait_idle();
        }
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    pub fn commodity(&self) -> &str {
        &self.commodity
    }

    /// Append a posting dated today on the local clock.
    pub fn append(
        &self,
        description: &str,
        amount_text: &str,
        debit_account: &str,
        credit_account: &str,
    ) -> Result<Posting, LedgerError> {
        self.append_on(
            Local::now().date_naive(),
            description,
            amount_text,
            debit_account,
            credit_account,
        )
    }

    pub fn append_on(
        &self,
        date: NaiveDate,
        description: &str,
        amount_text: &str,
        debit_account: &str,
        credit_account: &str,
    ) -> Result<Posting, LedgerError> {
        let amount = Amount::parse(amount_text)?;
        let posting = Posting {
            date,
            description: description.to_string(),
            amount,
            debit_account: debit_account.to_string(),
            credit_account: credit_account.to_string(),
        };
        let block = posting.render(&self.commodity);

        self.append_block(&block)?;
        log::info!(
            "recorded {} {} {} -> {} in {}",
            posting.date,
            posting.amount,
            posting.credit_account,
            posting.debit_account,
            self.journal_path.display()
        );

        if let Some(worker) = &self.refresh_worker {
            worker.request();
        }
        Ok(posting)
    }

    fn append_block(&self, block: &str) -> io::Result<()> {
        let path_lock = path_lock(&self.journal_path)?;
        let _in_process = path_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut journal = LockedJournal::open(&self.journal_path)?;

        let separator = separator_for(&mut journal.file)?;
        let mut buffer = String::with_capacity(separator.len() + block.len());
        buffer.push_str(separator);
        buffer.push_str(block);
        journal.file.write_all(buffer.as_bytes())?;
        journal.file.flush()?;
        Ok(())
    }
}

/// Open ledger file holding an exclusive advisory lock until dropped.
struct LockedJournal {
    file: File,
}

impl LockedJournal {
    fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { file })
    }
}

impl Drop for LockedJournal {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn separator_for(file: &mut File) -> io::Result<&'static str> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok("");
    }
    let tail_len = len.min(2) as usize;
    file.seek(SeekFrom::End(-(tail_len as i64)))?;
    let mut tail = [0u8; 2];
    file.read_exact(&mut tail[..tail_len])?;
    Ok(trailing_separator(&tail[..tail_len]))
}

/// Newlines needed after `tail` so exactly one blank line precedes the next block.
fn trailing_separator(tail: &[u8]) -> &'static str {
    if tail.ends_with(b"\n\n") {
        ""
    } else if tail.ends_with(b"\n") {
        "\n"
    } else {
        "\n\n"
    }
}

static PATH_LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();

fn path_lock(path: &Path) -> io::Result<Arc<Mutex<()>>> {
    let key = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    let mut locks = PATH_LOCKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    Ok(Arc::clone(locks.entry(key).or_default()))
}
