//! Configurable mapping from categorised business transactions to journal lines.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    chart::ChartOfAccounts,
    errors::{LedgerError, Result},
};

use super::entry::{EntryLine, EntryRequest};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

impl TransactionKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "income" | "in" => Some(TransactionKind::Income),
            "expense" | "out" => Some(TransactionKind::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        })
    }
}

/// One row of the mapping table, e.g. expense `rent` debits 5100 and credits 1100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostingRule {
    pub kind: TransactionKind,
    pub category: String,
    pub debit_account: String,
    pub credit_account: String,
}

impl PostingRule {
    pub fn new(
        kind: TransactionKind,
        category: impl Into<String>,
        debit_account: impl Into<String>,
        credit_account: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            category: category.into(),
            debit_account: debit_account.into(),
            credit_account: credit_account.into(),
        }
    }
}

/// A categorised transaction as produced by an upstream classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionInput {
    pub kind: TransactionKind,
    pub category: String,
    pub amount: f64,
    pub description: String,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PostingRules {
    rules: Vec<PostingRule>,
}

impl PostingRules {
    pub fn new(rules: Vec<PostingRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[PostingRule] {
        &self.rules
    }

    pub fn find(&self, kind: TransactionKind, category: &str) -> Option<&PostingRule> {
        let needle = category.trim();
        self.rules
            .iter()
            .find(|rule| rule.kind == kind && rule.category.eq_ignore_ascii_case(needle))
    }

    /// Checks that every rule references accounts present in `chart`.
    pub fn validate_against(&self, chart: &ChartOfAccounts) -> Result<()> {
        for rule in &self.rules {
            chart.lookup(&rule.debit_account)?;
            chart.lookup(&rule.credit_account)?;
        }
        Ok(())
    }

    /// Maps a transaction to its two journal lines; unknown categories are an error.
    pub fn map(&self, input: &TransactionInput) -> Result<Vec<EntryLine>> {
        if !input.amount.is_finite() || input.amount <= 0.0 {
            return Err(LedgerError::InvalidEntry(format!(
                "transaction amount must be positive, got {}",
                input.amount
            )));
        }
        let rule = self.find(input.kind, &input.category).ok_or_else(|| {
            LedgerError::UnmappedTransaction {
                category: input.category.trim().to_string(),
                kind: input.kind.to_string(),
            }
        })?;
        Ok(vec![
            EntryLine::debit(rule.debit_account.clone(), input.amount),
            EntryLine::credit(rule.credit_account.clone(), input.amount),
        ])
    }

    pub fn to_request(&self, input: &TransactionInput) -> Result<EntryRequest> {
        Ok(EntryRequest {
            description: input.description.clone(),
            reference: input.reference.clone(),
            date: input.date,
            lines: self.map(input)?,
        })
    }
}

impl Default for PostingRules {
    fn default() -> Self {
        use TransactionKind::*;
        Self::new(vec![
            PostingRule::new(Expense, "rent", "5100", "1100"),
            PostingRule::new(Expense, "salary", "5200", "1100"),
            PostingRule::new(Expense, "epf_socso", "5210", "1100"),
            PostingRule::new(Expense, "utilities", "5300", "1100"),
            PostingRule::new(Expense, "marketing", "5400", "1100"),
            PostingRule::new(Expense, "depreciation", "5500", "1510"),
            PostingRule::new(Expense, "general", "5600", "1100"),
            PostingRule::new(Expense, "bank_charges", "5700", "1100"),
            PostingRule::new(Expense, "interest", "5800", "1100"),
            PostingRule::new(Expense, "income_tax", "5900", "1100"),
            PostingRule::new(Expense, "inventory", "1300", "1100"),
            PostingRule::new(Expense, "equipment", "1500", "1100"),
            PostingRule::new(Expense, "petty_cash", "5600", "1000"),
            PostingRule::new(Income, "sales", "1100", "4000"),
            PostingRule::new(Income, "credit_sales", "1200", "4000"),
            PostingRule::new(Income, "services", "1100", "4100"),
            PostingRule::new(Income, "interest", "1100", "4500"),
            PostingRule::new(Income, "other", "1100", "4600"),
            PostingRule::new(Income, "capital", "1100", "3000"),
            PostingRule::new(Income, "loan", "1100", "2500"),
        ])
    }
}
