//! Chart of accounts: an immutable registry of account definitions shared by every component.

pub mod account;

use std::{collections::BTreeMap, fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};

pub use account::{Account, AccountCategory, AccountType, NormalBalance};

/// Immutable code-ordered registry of [`Account`] definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "ChartFile", into = "ChartFile")]
pub struct ChartOfAccounts {
    accounts: BTreeMap<String, Account>,
}

#[derive(Serialize, Deserialize)]
struct ChartFile {
    accounts: Vec<Account>,
}

impl TryFrom<ChartFile> for ChartOfAccounts {
    type Error = LedgerError;

    fn try_from(file: ChartFile) -> Result<Self> {
        ChartOfAccounts::from_accounts(file.accounts)
    }
}

impl From<ChartOfAccounts> for ChartFile {
    fn from(chart: ChartOfAccounts) -> Self {
        ChartFile {
            accounts: chart.accounts.into_values().collect(),
        }
    }
}

impl ChartOfAccounts {
    /// Builds a chart, rejecting duplicate codes and category/type mismatches.
    pub fn from_accounts(accounts: impl IntoIterator<Item = Account>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for account in accounts {
            let code = account.code.trim();
            if code.is_empty() {
                return Err(LedgerError::InvalidChart(format!(
                    "account `{}` has an empty code",
                    account.name
                )));
            }
            if account.category.account_type() != account.account_type {
                return Err(LedgerError::InvalidChart(format!(
                    "account {} is typed {} but categorised as {}",
                    account.code,
                    account.account_type,
                    account.category.label()
                )));
            }
            if map.contains_key(code) {
                return Err(LedgerError::InvalidChart(format!(
                    "duplicate account code {code}"
                )));
            }
            map.insert(code.to_string(), account);
        }
        if map.is_empty() {
            return Err(LedgerError::InvalidChart("chart has no accounts".into()));
        }
        Ok(Self { accounts: map })
    }

    /// Loads a chart from a JSON file of the form `{"accounts": [...]}`.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|err| {
            LedgerError::InvalidChart(format!("{}: {err}", path.display()))
        })
    }

    /// Resolves a code, surfacing unknown codes instead of defaulting.
    pub fn lookup(&self, code: &str) -> Result<&Account> {
        self.get(code)
            .ok_or_else(|| LedgerError::Resolution(code.trim().to_string()))
    }

    pub fn get(&self, code: &str) -> Option<&Account> {
        self.accounts.get(code.trim())
    }

    pub fn contains(&self, code: &str) -> bool {
        self.get(code).is_some()
    }

    /// All accounts in code order.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn of_type(&self, account_type: AccountType) -> impl Iterator<Item = &Account> {
        self.accounts()
            .filter(move |account| account.account_type == account_type)
    }

    pub fn of_category(&self, category: AccountCategory) -> impl Iterator<Item = &Account> {
        self.accounts()
            .filter(move |account| account.category == category)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Default chart for a small Malaysian trading and services business.
    pub fn malaysian_default() -> Self {
        use AccountCategory::*;
        let accounts = vec![
            Account::new("1000", "Cash in Hand", Cash),
            Account::new("1100", "Bank - Current Account", Cash),
            Account::new("1200", "Trade Receivables", Receivable),
            Account::contra("1210", "Allowance for Doubtful Debts", Receivable),
            Account::new("1300", "Inventory", Inventory),
            Account::new("1400", "Prepayments & Deposits", Prepaid),
            Account::new("1450", "SST Input Claimable", OtherCurrentAsset),
            Account::new("1500", "Property, Plant & Equipment", FixedAsset),
            Account::contra("1510", "Accumulated Depreciation", FixedAsset),
            Account::new("1600", "Fixed Deposits & Investments", Investment),
            Account::new("2000", "Trade Payables", Payable),
            Account::new("2100", "Accrued Expenses", Accrued),
            Account::new("2200", "SST Payable", OtherCurrentLiability),
            Account::new("2300", "EPF & SOCSO Payable", OtherCurrentLiability),
            Account::new("2400", "Credit Card Payable", OtherCurrentLiability),
            Account::new("2500", "Bank Term Loan", LongTermLiability),
            Account::new("2600", "Hire Purchase Payable", LongTermLiability),
            Account::new("3000", "Owner's Capital", Capital),
            Account::contra("3100", "Owner's Drawings", Capital),
            Account::new("3200", "Retained Earnings", RetainedEarnings),
            Account::new("4000", "Sales Revenue", OperatingRevenue),
            Account::new("4100", "Service Revenue", OperatingRevenue),
            Account::contra("4200", "Sales Returns & Discounts", OperatingRevenue),
            Account::new("4500", "Interest Income", OtherIncome),
            Account::new("4600", "Other Income", OtherIncome),
            Account::new("5000", "Cost of Goods Sold", CostOfSales),
            Account::new("5100", "Rent Expense", OperatingExpense),
            Account::new("5200", "Salaries & Wages", OperatingExpense),
            Account::new("5210", "EPF & SOCSO Contributions", OperatingExpense),
            Account::new("5300", "Utilities", OperatingExpense),
            Account::new("5400", "Marketing & Advertising", OperatingExpense),
            Account::new("5500", "Depreciation Expense", Depreciation),
            Account::new("5600", "General & Administrative", OperatingExpense),
            Account::new("5700", "Bank Charges", OperatingExpense),
            Account::new("5800", "Interest Expense", OtherExpense),
            Account::new("5900", "Income Tax Expense", OtherExpense),
        ];
        Self {
            accounts: accounts
                .into_iter()
                .map(|account| (account.code.clone(), account))
                .collect(),
        }
    }
}

impl Default for ChartOfAccounts {
    fn default() -> Self {
        Self::malaysian_default()
    }
}
