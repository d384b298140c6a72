use crate::accounts::{resolve, FundingAccounts, TransactionKind};
use crate::config::{validate_account, ConfigError, RecorderConfig};
use crate::ledger_add::{LedgerError, LedgerWriter};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

const USAGE: &str = "Missing amount.\nUsage: /command [amount] [description]";
const INVALID_AMOUNT: &str = "Amount must be a valid number.";
const WRITE_FAILED: &str = "Failed to write to ledger file. Please check server logs.";

/// A chat command bound to a category and transaction kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommandBinding {
    pub name: String,
    #[serde(default)]
    pub category: String,
    pub kind: TransactionKind,
}

impl CommandBinding {
    fn new(name: &str, category: &str, kind: TransactionKind) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            kind,
        }
    }

    pub(crate) fn validate(&self, funding: &FundingAccounts) -> Result<(), ConfigError> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(ConfigError::Invalid(format!(
                "command name '{}' must be non-empty ASCII letters, digits or '_'",
                self.name
            )));
        }
        if let Some(counterpart) = self.kind.counterpart(funding) {
            validate_account(&self.category, &format!("category of /{}", self.name))?;
            if self.category == counterpart {
                return Err(ConfigError::Invalid(format!(
                    "category of /{} must differ from {counterpart}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

pub fn builtin_commands() -> Vec<CommandBinding> {
    use TransactionKind::*;
    vec![
        CommandBinding::new("food", "Expenses:Food", ExpenseCash),
        CommandBinding::new("transport", "Expenses:Transport", ExpenseCash),
        CommandBinding::new("shop", "Expenses:Shopping", ExpenseCash),
        CommandBinding::new("health", "Expenses:Health", ExpenseCash),
        CommandBinding::new("other", "Expenses:Misc", ExpenseCash),
        CommandBinding::new("qfood", "Expenses:Food", ExpenseBank),
        CommandBinding::new("qtransport", "Expenses:Transport", ExpenseBank),
        CommandBinding::new("qshop", "Expenses:Shopping", ExpenseBank),
        CommandBinding::new("qbill", "Expenses:Utilities", ExpenseBank),
        CommandBinding::new("qsub", "Expenses:Subscription", ExpenseBank),
        CommandBinding::new("income", "Income:Salary", IncomeBank),
        CommandBinding::new("gift", "Income:Allowance", IncomeCash),
        CommandBinding::new("withdraw", "", Withdraw),
    ]
}

/// What the transport should tell the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Reply {
    Recorded {
        display_kind: String,
        description: String,
        amount: String,
        display_label: String,
    },
    Help {
        text: String,
    },
    MissingAmount,
    InvalidAmount,
    WriteFailed,
    UnknownCommand {
        name: String,
    },
    /// Unauthorized sender or not a command; nothing is sent back.
    Ignored,
}

impl Reply {
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Reply::MissingAmount
                | Reply::InvalidAmount
                | Reply::WriteFailed
                | Reply::UnknownCommand { .. }
        )
    }

    pub fn text(&self) -> Option<String> {
        match self {
            Reply::Recorded {
                display_kind,
                description,
                amount,
                display_label,
            } => Some(format!(
                "Recorded: {display_kind}\n{description}\n{amount}\n{display_label}"
            )),
            Reply::Help { text } => Some(text.clone()),
            Reply::MissingAmount => Some(USAGE.to_string()),
            Reply::InvalidAmount => Some(INVALID_AMOUNT.to_string()),
            Reply::WriteFailed => Some(WRITE_FAILED.to_string()),
            Reply::UnknownCommand { name } => {
                Some(format!("Unknown command /{name}. Send /help for the list."))
            }
            Reply::Ignored => None,
        }
    }
}

/// Turns command messages into ledger postings.
pub struct Dispatcher {
    commands: Vec<CommandBinding>,
    funding: FundingAccounts,
    allowed_user_id: Option<i64>,
    writer: LedgerWriter,
}

impl Dispatcher {
    pub fn new(config: &RecorderConfig, writer: LedgerWriter) -> Self {
        let mut commands = builtin_commands();
        for binding in &config.commands {
            match commands.iter_mut().find(|known| known.name == binding.name) {
                Some(known) => *known = binding.clone(),
                None => commands.push(binding.clone()),
            }
        }
        Self {
            commands,
            funding: config.funding_accounts(),
            allowed_user_id: config.allowed_user_id,
            writer,
        }
    }

    pub fn commands(&self) -> &[CommandBinding] {
        &self.commands
    }

    pub fn writer(&self) -> &LedgerWriter {
        &self.writer
    }

    /// Handle one `/name[@bot] amount description...` message from `sender`.
    pub fn dispatch(&self, sender: Option<i64>, message: &str) -> Reply {
        if let Some(allowed) = self.allowed_user_id {
            if sender != Some(allowed) {
                log::info!("ignoring message from unauthorized sender {sender:?}");
                return Reply::Ignored;
            }
        }

        let mut words = message.split_whitespace();
        let Some(name) = words.next().and_then(|word| word.strip_prefix('/')) else {
            return Reply::Ignored;
        };
        let name = name.split('@').next().unwrap_or(name);
        let args: Vec<&str> = words.collect();

        if name == "start" || name == "help" {
            return Reply::Help {
                text: self.help_text(),
            };
        }
        let Some(binding) = self.commands.iter().find(|binding| binding.name == name) else {
            return Reply::UnknownCommand {
                name: name.to_string(),
            };
        };
        self.record(binding, &args)
    }

    fn record(&self, binding: &CommandBinding, args: &[&str]) -> Reply {
        let Some((amount_text, description_words)) = args.split_first() else {
            return Reply::MissingAmount;
        };
        let mut description = description_words.join(" ");
        if description.is_empty() {
            description = binding.kind.default_description().to_string();
        }

        let resolved = resolve(binding.kind, &binding.category, &self.funding);
        match self
            .writer
            .append(&description, amount_text, &resolved.debit, &resolved.credit)
        {
            Ok(posting) => Reply::Recorded {
                display_kind: resolved.display_kind.to_string(),
                description,
                amount: posting.amount.to_string(),
                display_label: resolved.display_label,
            },
            Err(LedgerError::InvalidAmount(_)) => Reply::InvalidAmount,
            Err(err @ LedgerError::Io(_)) => {
                log::error!(
                    "failed to append to {}: {err}",
                    self.writer.journal_path().display()
                );
                Reply::WriteFailed
            }
        }
    }

    /// Command list grouped the way users think about them.
    pub fn help_text(&self) -> String {
        let groups: [(&str, &[TransactionKind]); 3] = [
            ("CASH transactions", &[TransactionKind::ExpenseCash]),
            ("BANK / DIGITAL transactions", &[TransactionKind::ExpenseBank]),
            (
                "INCOME & TRANSFERS",
                &[
                    TransactionKind::IncomeBank,
                    TransactionKind::IncomeCash,
                    TransactionKind::Withdraw,
                ],
            ),
        ];

        let mut text = String::from("Finance recorder ready\n");
        for (title, kinds) in groups {
            let _ = write!(text, "\n{title}:\n");
            for binding in self.commands.iter().filter(|b| kinds.contains(&b.kind)) {
                let target = if binding.kind.uses_category() {
                    binding.category.as_str()
                } else {
                    "Bank -> Cash"
                };
                let _ = writeln!(text, "  /{} [amount] [description]  ({target})", binding.name);
            }
        }
        text
    }
}
