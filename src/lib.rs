pub mod accounts;
pub mod cli;
pub mod commands;
pub mod config;
pub mod indexer;
pub mod ledger_add;
pub mod serve;

mod binpath;

pub use accounts::{resolve, FundingAccounts, ResolvedAccounts, TransactionKind};
pub use commands::{Dispatcher, Reply};
pub use config::{ConfigError, RecorderConfig};
pub use ledger_add::{Amount, LedgerError, LedgerWriter, Posting};
