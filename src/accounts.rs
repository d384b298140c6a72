use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_CASH_ACCOUNT: &str = "Assets:Wallet:Cash";
pub const DEFAULT_BANK_ACCOUNT: &str = "Assets:Bank:Main";

const WITHDRAW_LABEL: &str = "Transfer: Bank -> Cash";

/// The closed set of transaction shapes a command can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    ExpenseCash,
    ExpenseBank,
    IncomeCash,
    IncomeBank,
    Withdraw,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 5] = [
        TransactionKind::ExpenseCash,
        TransactionKind::ExpenseBank,
        TransactionKind::IncomeCash,
        TransactionKind::IncomeBank,
        TransactionKind::Withdraw,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            TransactionKind::ExpenseCash => "expense_cash",
            TransactionKind::ExpenseBank => "expense_bank",
            TransactionKind::IncomeCash => "income_cash",
            TransactionKind::IncomeBank => "income_bank",
            TransactionKind::Withdraw => "withdraw",
        }
    }

    /// Heading shown to the user when a posting of this kind is recorded.
    pub fn display_kind(self) -> &'static str {
        match self {
            TransactionKind::ExpenseCash => "EXPENSE (CASH)",
            TransactionKind::ExpenseBank => "EXPENSE (BANK)",
            TransactionKind::IncomeCash => "INCOME (CASH)",
            TransactionKind::IncomeBank => "INCOME (BANK)",
            TransactionKind::Withdraw => "WITHDRAW (ATM)",
        }
    }

    /// Description written when the caller gives none.
    pub fn default_description(self) -> &'static str {
        match self {
            TransactionKind::ExpenseCash => "Expense Cash",
            TransactionKind::ExpenseBank => "Expense Digital",
            TransactionKind::IncomeCash => "Income Cash",
            TransactionKind::IncomeBank => "Income Bank",
            TransactionKind::Withdraw => "ATM Withdraw",
        }
    }

    pub fn uses_category(self) -> bool {
        !matches!(self, TransactionKind::Withdraw)
    }

    /// The funding account a category is paired with, if the kind takes a category.
    pub fn counterpart(self, funding: &FundingAccounts) -> Option<&str> {
        match self {
            TransactionKind::ExpenseCash | TransactionKind::IncomeCash => Some(funding.cash.as_str()),
            TransactionKind::ExpenseBank | TransactionKind::IncomeBank => Some(funding.bank.as_str()),
            TransactionKind::Withdraw => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The fixed accounts money moves in and out of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FundingAccounts {
    pub cash: String,
    pub bank: String,
}

impl Default for FundingAccounts {
    fn default() -> Self {
        Self {
            cash: DEFAULT_CASH_ACCOUNT.to_string(),
            bank: DEFAULT_BANK_ACCOUNT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAccounts {
    pub debit: String,
    pub credit: String,
    pub display_kind: &'static str,
    pub display_label: String,
}

/// Map a transaction kind and category to the (debit, credit) account pair.
///
/// Debit is where the value goes, credit is where it came from. `category` is
/// ignored for withdrawals.
pub fn resolve(
    kind: TransactionKind,
    category: &str,
    funding: &FundingAccounts,
) -> ResolvedAccounts {
    let (debit, credit, display_label) = match kind {
        TransactionKind::ExpenseCash => (category, funding.cash.as_str(), category),
        TransactionKind::ExpenseBank => (category, funding.bank.as_str(), category),
        TransactionKind::IncomeCash => (funding.cash.as_str(), category, category),
        TransactionKind::IncomeBank => (funding.bank.as_str(), category, category),
        TransactionKind::Withdraw => (
            funding.cash.as_str(),
            funding.bank.as_str(),
            WITHDRAW_LABEL,
        ),
    };
    ResolvedAccounts {
        debit: debit.to_string(),
        credit: credit.to_string(),
        display_kind: kind.display_kind(),
        display_label: display_label.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn expenses_debit_the_category() {
        let funding = FundingAccounts::default();
        let cash = resolve(TransactionKind::ExpenseCash, "Expenses:Food", &funding);
        assert_eq!(cash.debit, "Expenses:Food");
        assert_eq!(cash.credit, DEFAULT_CASH_ACCOUNT);
        assert_eq!(cash.display_kind, "EXPENSE (CASH)");
        assert_eq!(cash.display_label, "Expenses:Food");

        let bank = resolve(TransactionKind::ExpenseBank, "Expenses:Utilities", &funding);
        assert_eq!(bank.debit, "Expenses:Utilities");
        assert_eq!(bank.credit, DEFAULT_BANK_ACCOUNT);
        assert_eq!(bank.display_kind, "EXPENSE (BANK)");
    }

    #[test]
    fn income_credits_the_category() {
        let funding = FundingAccounts::default();
        let cash = resolve(TransactionKind::IncomeCash, "Income:Allowance", &funding);
        assert_eq!(cash.debit, DEFAULT_CASH_ACCOUNT);
        assert_eq!(cash.credit, "Income:Allowance");

        let bank = resolve(TransactionKind::IncomeBank, "Income:Salary", &funding);
        assert_eq!(bank.debit, DEFAULT_BANK_ACCOUNT);
        assert_eq!(bank.credit, "Income:Salary");
        assert_eq!(bank.display_kind, "INCOME (BANK)");
    }

    #[test]
    fn withdraw_ignores_category() {
        let funding = FundingAccounts::default();
        let resolved = resolve(TransactionKind::Withdraw, "ATM Withdraw", &funding);
        assert_eq!(resolved.debit, DEFAULT_CASH_ACCOUNT);
        assert_eq!(resolved.credit, DEFAULT_BANK_ACCOUNT);
        assert_eq!(resolved.display_kind, "WITHDRAW (ATM)");
        assert_eq!(resolved.display_label, "Transfer: Bank -> Cash");
        assert_eq!(resolve(TransactionKind::Withdraw, "", &funding), resolved);
    }

    #[test]
    fn category_appears_exactly_once_and_accounts_differ() {
        let funding = FundingAccounts::default();
        for kind in TransactionKind::ALL {
            let category = "Expenses:Anything";
            let resolved = resolve(kind, category, &funding);
            assert!(!resolved.debit.is_empty());
            assert!(!resolved.credit.is_empty());
            assert_ne!(resolved.debit, resolved.credit, "{kind}");
            let hits = [&resolved.debit, &resolved.credit]
                .iter()
                .filter(|account| account.as_str() == category)
                .count();
            let expected = if kind.uses_category() { 1 } else { 0 };
            assert_eq!(hits, expected, "{kind}");
        }
    }

    #[test]
    fn kind_tags_round_trip_through_serde() {
        for kind in TransactionKind::ALL {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.tag()));
        }
        assert!(serde_json::from_str::<TransactionKind>("\"transfer\"").is_err());
    }
}
