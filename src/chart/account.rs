use std::fmt;

use serde::{Deserialize, Serialize};

/// The five fundamental account classes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    /// Normal balance of a non-contra account of this type.
    pub fn natural_balance(self) -> NormalBalance {
        match self {
            AccountType::Asset | AccountType::Expense => NormalBalance::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                NormalBalance::Credit
            }
        }
    }

    /// Balance-sheet classes; revenue and expense belong to the income statement.
    pub fn is_permanent(self) -> bool {
        matches!(
            self,
            AccountType::Asset | AccountType::Liability | AccountType::Equity
        )
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        };
        f.pad(label)
    }
}

/// The side on which an account's balance increases.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NormalBalance {
    Debit,
    Credit,
}

impl NormalBalance {
    pub fn opposite(self) -> Self {
        match self {
            NormalBalance::Debit => NormalBalance::Credit,
            NormalBalance::Credit => NormalBalance::Debit,
        }
    }

    /// Converts raw debit/credit amounts into a balance delta signed by this side.
    pub fn signed(self, debit: f64, credit: f64) -> f64 {
        let delta = debit - credit;
        match self {
            NormalBalance::Debit => delta,
            NormalBalance::Credit => -delta,
        }
    }
}

impl fmt::Display for NormalBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            NormalBalance::Debit => "debit",
            NormalBalance::Credit => "credit",
        })
    }
}

/// Presentation grouping used by the statement generators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AccountCategory {
    Cash,
    Receivable,
    Inventory,
    Prepaid,
    OtherCurrentAsset,
    FixedAsset,
    Investment,
    Payable,
    Accrued,
    OtherCurrentLiability,
    LongTermLiability,
    Capital,
    RetainedEarnings,
    OperatingRevenue,
    OtherIncome,
    CostOfSales,
    OperatingExpense,
    Depreciation,
    OtherExpense,
}

impl AccountCategory {
    pub fn account_type(self) -> AccountType {
        use AccountCategory::*;
        match self {
            Cash | Receivable | Inventory | Prepaid | OtherCurrentAsset | FixedAsset
            | Investment => AccountType::Asset,
            Payable | Accrued | OtherCurrentLiability | LongTermLiability => {
                AccountType::Liability
            }
            Capital | RetainedEarnings => AccountType::Equity,
            OperatingRevenue | OtherIncome => AccountType::Revenue,
            CostOfSales | OperatingExpense | Depreciation | OtherExpense => AccountType::Expense,
        }
    }

    pub fn label(self) -> &'static str {
        use AccountCategory::*;
        match self {
            Cash => "Cash & Bank",
            Receivable => "Receivables",
            Inventory => "Inventory",
            Prepaid => "Prepayments",
            OtherCurrentAsset => "Other Current Assets",
            FixedAsset => "Property, Plant & Equipment",
            Investment => "Investments",
            Payable => "Payables",
            Accrued => "Accruals",
            OtherCurrentLiability => "Other Current Liabilities",
            LongTermLiability => "Long-Term Liabilities",
            Capital => "Capital",
            RetainedEarnings => "Retained Earnings",
            OperatingRevenue => "Operating Revenue",
            OtherIncome => "Other Income",
            CostOfSales => "Cost of Sales",
            OperatingExpense => "Operating Expenses",
            Depreciation => "Depreciation & Amortisation",
            OtherExpense => "Other Expenses",
        }
    }

    /// Current assets and liabilities other than cash.
    pub fn is_working_capital(self) -> bool {
        use AccountCategory::*;
        matches!(
            self,
            Receivable
                | Inventory
                | Prepaid
                | OtherCurrentAsset
                | Payable
                | Accrued
                | OtherCurrentLiability
        )
    }

    pub fn is_current(self) -> bool {
        self == AccountCategory::Cash || self.is_working_capital()
    }
}

/// A single entry of the chart of accounts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub category: AccountCategory,
    #[serde(default)]
    pub is_contra: bool,
}

impl Account {
    /// Creates a regular account whose type follows from its category.
    pub fn new(code: impl Into<String>, name: impl Into<String>, category: AccountCategory) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type: category.account_type(),
            category,
            is_contra: false,
        }
    }

    /// Creates a contra account carrying the opposite normal balance of its type.
    pub fn contra(
        code: impl Into<String>,
        name: impl Into<String>,
        category: AccountCategory,
    ) -> Self {
        Self {
            is_contra: true,
            ..Self::new(code, name, category)
        }
    }

    pub fn normal_balance(&self) -> NormalBalance {
        let natural = self.account_type.natural_balance();
        if self.is_contra {
            natural.opposite()
        } else {
            natural
        }
    }

    /// Balance delta produced by posting `debit`/`credit` to this account.
    pub fn signed_delta(&self, debit: f64, credit: f64) -> f64 {
        self.normal_balance().signed(debit, credit)
    }

    /// Multiplier that turns a stored balance into its contribution to the type's total.
    pub fn carrying_sign(&self) -> f64 {
        if self.is_contra {
            -1.0
        } else {
            1.0
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.name)
    }
}
