//! Read-only statement generators over the general ledger and the chart of accounts.
//!
//! Generators never write. Inconsistencies are reported in the output (`is_balanced`,
//! `difference`) and never corrected here; see [`crate::reconcile`].

pub mod balance_sheet;
pub mod cash_flow;
pub mod income_statement;
pub mod trial_balance;

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    chart::{Account, AccountCategory, ChartOfAccounts},
    currency::round2,
    errors::Result,
    gl::{Bucket, Delta, LedgerStore},
    time::{Period, PeriodRange},
};

pub use balance_sheet::{BalanceSheet, BalanceSheetSide};
pub use cash_flow::CashFlowStatement;
pub use income_statement::IncomeStatement;
pub use trial_balance::{TrialBalance, TrialBalanceLine};

/// Per-account activity over an inclusive date range.
///
/// Whole months are read from the buckets. Days of a month the range only partly covers
/// are summed from the stored entries, so a range never picks up postings outside its dates.
pub(crate) struct RangeActivity {
    months: Option<PeriodRange>,
    edges: BTreeMap<String, Bucket>,
}

/// Ledger position at the close of one day: whole months through `through`, plus the
/// month-to-date entries when the day is not a month end.
pub(crate) struct Position {
    through: Period,
    month_to_date: Option<RangeActivity>,
}

/// Shared read access for the generators.
#[derive(Clone, Copy)]
pub struct ReportContext<'a> {
    pub store: &'a dyn LedgerStore,
    pub chart: &'a ChartOfAccounts,
    pub tolerance: f64,
}

impl<'a> ReportContext<'a> {
    pub fn new(store: &'a dyn LedgerStore, chart: &'a ChartOfAccounts, tolerance: f64) -> Self {
        Self {
            store,
            chart,
            tolerance,
        }
    }

    pub(crate) fn activity(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<RangeActivity> {
        let covered = PeriodRange::from_dates(start, end)?;
        let first = if start == covered.start.first_day() {
            covered.start
        } else {
            covered.start.next()
        };
        let last = if end == covered.end.last_day() {
            covered.end
        } else {
            covered.end.prev()
        };
        let months = (first <= last).then_some(PeriodRange {
            start: first,
            end: last,
        });

        let mut edges: BTreeMap<String, Bucket> = BTreeMap::new();
        if months != Some(covered) {
            for entry in self.store.list_entries(user_id)? {
                if entry.date < start || entry.date > end {
                    continue;
                }
                if months.is_some_and(|months| months.contains(Period::of(entry.date))) {
                    continue;
                }
                for line in &entry.lines {
                    let Some(account) = self.chart.get(&line.account_code) else {
                        warn!(
                            user_id,
                            entry_id = %entry.id,
                            account = %line.account_code,
                            "entry line references an account missing from the chart"
                        );
                        continue;
                    };
                    edges.entry(account.code.clone()).or_default().apply(&Delta {
                        debit: line.debit,
                        credit: line.credit,
                        balance: account.signed_delta(line.debit, line.credit),
                    });
                }
            }
        }
        Ok(RangeActivity { months, edges })
    }

    pub(crate) fn position_at(&self, user_id: &str, date: NaiveDate) -> Result<Position> {
        let period = Period::of(date);
        if date == period.last_day() {
            return Ok(Position {
                through: period,
                month_to_date: None,
            });
        }
        Ok(Position {
            through: period.prev(),
            month_to_date: Some(self.activity(user_id, period.first_day(), date)?),
        })
    }

    /// Activity of `account` inside the range, as a contribution to its type's total.
    pub(crate) fn value_in(
        &self,
        user_id: &str,
        account: &Account,
        activity: &RangeActivity,
    ) -> Result<Option<f64>> {
        let mut bucket = match activity.months {
            Some(months) => self.store.range_total(user_id, &account.code, months)?,
            None => Bucket::default(),
        };
        if let Some(edge) = activity.edges.get(&account.code) {
            bucket.add(edge);
        }
        if bucket.is_zero() {
            return Ok(None);
        }
        Ok(Some(account.carrying_sign() * bucket.balance))
    }

    /// Stored balance of `account` at `position`, signed by its normal balance.
    pub(crate) fn balance_at(
        &self,
        user_id: &str,
        account: &Account,
        position: &Position,
    ) -> Result<f64> {
        let mut balance = self
            .store
            .cumulative_balance(user_id, &account.code, position.through)?;
        if let Some(edge) = position
            .month_to_date
            .as_ref()
            .and_then(|month| month.edges.get(&account.code))
        {
            balance += edge.balance;
        }
        Ok(balance)
    }

    /// Cumulative value of `account` at `position`, as a contribution to its type's total.
    pub(crate) fn value_at(
        &self,
        user_id: &str,
        account: &Account,
        position: &Position,
    ) -> Result<f64> {
        Ok(account.carrying_sign() * self.balance_at(user_id, account, position)?)
    }

    /// Cumulative value of `account` through the end of `period`.
    pub(crate) fn value_through(
        &self,
        user_id: &str,
        account: &Account,
        period: Period,
    ) -> Result<f64> {
        let balance = self
            .store
            .cumulative_balance(user_id, &account.code, period)?;
        Ok(account.carrying_sign() * balance)
    }

    /// One section per category, holding every account with activity in the range.
    pub(crate) fn range_section(
        &self,
        user_id: &str,
        category: AccountCategory,
        activity: &RangeActivity,
    ) -> Result<StatementSection> {
        let mut section = StatementSection::new(category.label());
        for account in self.chart.of_category(category) {
            if let Some(amount) = self.value_in(user_id, account, activity)? {
                section.push(StatementLine::account(account, amount));
            }
        }
        Ok(section)
    }
}

/// A presentation line: an account, or a synthesised line such as current-year earnings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementLine {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_code: Option<String>,
    pub name: String,
    pub amount: f64,
}

impl StatementLine {
    pub fn account(account: &Account, amount: f64) -> Self {
        Self {
            account_code: Some(account.code.clone()),
            name: account.name.clone(),
            amount: round2(amount),
        }
    }

    pub fn synthetic(name: impl Into<String>, amount: f64) -> Self {
        Self {
            account_code: None,
            name: name.into(),
            amount: round2(amount),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSection {
    pub title: String,
    pub lines: Vec<StatementLine>,
    pub total: f64,
}

impl StatementSection {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            lines: Vec::new(),
            total: 0.0,
        }
    }

    pub fn push(&mut self, line: StatementLine) {
        self.total = round2(self.total + line.amount);
        self.lines.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, account_code: &str) -> Option<&StatementLine> {
        self.lines
            .iter()
            .find(|line| line.account_code.as_deref() == Some(account_code))
    }
}
