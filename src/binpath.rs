use std::ffi::OsString;
use std::path::Path;
use std::sync::OnceLock;

/// Return the paisa binary to run.
///
/// A configured path is used as is, so a missing binary surfaces as a spawn
/// error naming it. Otherwise falls back to a `PATH` lookup, then to the bare
/// `"paisa"` name.
pub fn paisa_path(configured: Option<&Path>) -> OsString {
    static FROM_PATH: OnceLock<OsString> = OnceLock::new();
    match configured {
        Some(path) => path.as_os_str().to_os_string(),
        None => FROM_PATH
            .get_or_init(|| match which::which("paisa") {
                Ok(found) => found.into_os_string(),
                Err(_) => OsString::from("paisa"),
            })
            .clone(),
    }
}
