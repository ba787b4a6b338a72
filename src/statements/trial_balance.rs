use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    chart::{AccountType, NormalBalance},
    currency::{round2, within_tolerance},
    errors::Result,
    time::Period,
};

use super::ReportContext;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub debit_balance: f64,
    pub credit_balance: f64,
    /// Raw bucket totals for the period.
    pub total_debits: f64,
    pub total_credits: f64,
}

/// Single-period listing of every account with activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub user_id: String,
    pub period: Period,
    pub lines: Vec<TrialBalanceLine>,
    pub total_debit_balance: f64,
    pub total_credit_balance: f64,
    pub total_debits: f64,
    pub total_credits: f64,
    pub is_balanced: bool,
    pub difference: f64,
}

impl TrialBalance {
    pub fn generate(ctx: &ReportContext<'_>, user_id: &str, period: Period) -> Result<Self> {
        let mut lines = Vec::new();
        for (key, bucket) in ctx.store.scan_user(user_id)? {
            if key.period != period || bucket.is_zero() {
                continue;
            }
            let Some(account) = ctx.chart.get(&key.account_code) else {
                warn!(
                    user_id,
                    account = %key.account_code,
                    %period,
                    "bucket references an account missing from the chart"
                );
                continue;
            };
            // A balance on the wrong side of its normal balance moves to the other column.
            let (debit_balance, credit_balance) = match (account.normal_balance(), bucket.balance >= 0.0) {
                (NormalBalance::Debit, true) => (bucket.balance, 0.0),
                (NormalBalance::Debit, false) => (0.0, -bucket.balance),
                (NormalBalance::Credit, true) => (0.0, bucket.balance),
                (NormalBalance::Credit, false) => (-bucket.balance, 0.0),
            };
            lines.push(TrialBalanceLine {
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                account_type: account.account_type,
                debit_balance: round2(debit_balance),
                credit_balance: round2(credit_balance),
                total_debits: round2(bucket.total_debits),
                total_credits: round2(bucket.total_credits),
            });
        }

        let total_debit_balance = round2(lines.iter().map(|l| l.debit_balance).sum());
        let total_credit_balance = round2(lines.iter().map(|l| l.credit_balance).sum());
        let total_debits = round2(lines.iter().map(|l| l.total_debits).sum());
        let total_credits = round2(lines.iter().map(|l| l.total_credits).sum());
        Ok(Self {
            user_id: user_id.to_string(),
            period,
            is_balanced: within_tolerance(total_debit_balance, total_credit_balance, ctx.tolerance),
            difference: round2(total_debit_balance - total_credit_balance),
            lines,
            total_debit_balance,
            total_credit_balance,
            total_debits,
            total_credits,
        })
    }

    pub fn line(&self, account_code: &str) -> Option<&TrialBalanceLine> {
        self.lines.iter().find(|line| line.account_code == account_code)
    }
}
