use crate::accounts::{FundingAccounts, DEFAULT_BANK_ACCOUNT, DEFAULT_CASH_ACCOUNT};
use crate::commands::CommandBinding;
use crate::ledger_add::DEFAULT_COMMODITY;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_DIR_NAME: &str = "pocketledger";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the recorder needs, loaded once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecorderConfig {
    pub ledger_file: PathBuf,
    /// Paisa config; the index refresh is skipped when absent or `null`.
    pub indexer_config: Option<PathBuf>,
    pub indexer_binary: Option<PathBuf>,
    pub cash_account: String,
    pub bank_account: String,
    pub commodity: String,
    pub allowed_user_id: Option<i64>,
    /// Added to the built-in commands, replacing any with the same name.
    pub commands: Vec<CommandBinding>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            ledger_file: PathBuf::from("finance.ledger"),
            indexer_config: Some(PathBuf::from("paisa.yaml")),
            indexer_binary: None,
            cash_account: DEFAULT_CASH_ACCOUNT.to_string(),
            bank_account: DEFAULT_BANK_ACCOUNT.to_string(),
            commodity: DEFAULT_COMMODITY.to_string(),
            allowed_user_id: None,
            commands: Vec::new(),
        }
    }
}

impl RecorderConfig {
    pub fn funding_accounts(&self) -> FundingAccounts {
        FundingAccounts {
            cash: self.cash_account.clone(),
            bank: self.bank_account.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_account(&self.cash_account, "cash_account")?;
        validate_account(&self.bank_account, "bank_account")?;
        if self.cash_account == self.bank_account {
            return Err(ConfigError::Invalid(
                "cash_account and bank_account must differ".to_string(),
            ));
        }
        if self.commodity.is_empty() || !self.commodity.chars().all(char::is_alphabetic) {
            return Err(ConfigError::Invalid(format!(
                "commodity must be alphabetic, got '{}'",
                self.commodity
            )));
        }

        let funding = self.funding_accounts();
        for binding in &self.commands {
            binding.validate(&funding)?;
        }
        Ok(())
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        self.ledger_file = base.join(&self.ledger_file);
        self.indexer_config = self.indexer_config.take().map(|path| base.join(path));
        self.indexer_binary = self.indexer_binary.take().map(|path| base.join(path));
    }
}

/// `<config dir>/pocketledger/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load and validate the config at `path`.
///
/// With `required` unset a missing file yields the defaults. Relative paths
/// in the file are taken relative to the file's directory.
pub fn read_config(path: &Path, required: bool) -> Result<RecorderConfig, ConfigError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
            let config = RecorderConfig::default();
            config.validate()?;
            return Ok(config);
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let mut config: RecorderConfig =
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    if let Some(base) = path.parent() {
        config.resolve_relative_to(base);
    }
    config.validate()?;
    Ok(config)
}

/// Reject account names that would not survive as a single posting line.
pub(crate) fn validate_account(account: &str, field: &str) -> Result<(), ConfigError> {
    if account.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must not be empty")));
    }
    if account.contains(['\n', '\r', '\t']) || account.contains("  ") {
        return Err(ConfigError::Invalid(format!(
            "{field} '{account}' must be a single line without tabs or double spaces"
        )));
    }
    if account.split(':').any(|segment| segment.trim().is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "{field} '{account}' has an empty ':' segment"
        )));
    }
    Ok(())
}
