use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    chart::{Account, AccountCategory, AccountType},
    currency::{round2, within_tolerance},
    errors::Result,
};

use super::{IncomeStatement, ReportContext, StatementLine, StatementSection};

/// Indirect-method cash-flow statement.
///
/// Classification follows account categories: working capital is every non-cash current
/// asset or liability, investing is non-contra fixed assets and investments, financing is
/// long-term liabilities and equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub net_income: f64,
    pub operating: StatementSection,
    pub investing: StatementSection,
    pub financing: StatementSection,
    pub net_change_in_cash: f64,
    pub beginning_cash: f64,
    pub ending_cash: f64,
    /// Cash per the cash and bank accounts at the end of the range.
    pub ledger_ending_cash: f64,
    pub is_reconciled: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Activity {
    WorkingCapital,
    Investing,
    Financing,
}

fn classify(account: &Account) -> Option<Activity> {
    use AccountCategory::*;
    if account.category.is_working_capital() {
        return Some(Activity::WorkingCapital);
    }
    match account.category {
        FixedAsset if !account.is_contra => Some(Activity::Investing),
        Investment => Some(Activity::Investing),
        LongTermLiability | Capital | RetainedEarnings => Some(Activity::Financing),
        _ => None,
    }
}

/// Cash effect of a change in an account's carrying value.
fn cash_effect(account: &Account, value_change: f64) -> f64 {
    match account.account_type {
        AccountType::Asset => -value_change,
        _ => value_change,
    }
}

impl CashFlowStatement {
    pub fn generate(
        ctx: &ReportContext<'_>,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        let movements = ctx.activity(user_id, start, end)?;
        let income = IncomeStatement::generate(ctx, user_id, start, end)?;

        let mut operating = StatementSection::new("Operating Activities");
        operating.push(StatementLine::synthetic("Net Income", income.net_income));
        for account in ctx.chart.of_category(AccountCategory::Depreciation) {
            if let Some(expense) = ctx.value_in(user_id, account, &movements)? {
                operating.push(StatementLine::account(account, expense));
            }
        }

        let mut investing = StatementSection::new("Investing Activities");
        let mut financing = StatementSection::new("Financing Activities");
        for account in ctx.chart.accounts() {
            let Some(activity) = classify(account) else {
                continue;
            };
            let Some(change) = ctx.value_in(user_id, account, &movements)? else {
                continue;
            };
            let effect = cash_effect(account, change);
            if round2(effect) == 0.0 {
                continue;
            }
            let line = StatementLine::account(account, effect);
            match activity {
                Activity::WorkingCapital => operating.push(line),
                Activity::Investing => investing.push(line),
                Activity::Financing => financing.push(line),
            }
        }

        let net_change_in_cash = round2(operating.total + investing.total + financing.total);
        let beginning_cash = match start.pred_opt() {
            Some(day_before) => cash_at(ctx, user_id, day_before)?,
            None => 0.0,
        };
        let ending_cash = round2(beginning_cash + net_change_in_cash);
        let ledger_ending_cash = cash_at(ctx, user_id, end)?;

        Ok(Self {
            user_id: user_id.to_string(),
            start,
            end,
            net_income: income.net_income,
            operating,
            investing,
            financing,
            net_change_in_cash,
            beginning_cash,
            ending_cash,
            ledger_ending_cash,
            is_reconciled: within_tolerance(ending_cash, ledger_ending_cash, ctx.tolerance),
        })
    }
}

/// Cash and bank balances at the close of `date`.
fn cash_at(ctx: &ReportContext<'_>, user_id: &str, date: NaiveDate) -> Result<f64> {
    let position = ctx.position_at(user_id, date)?;
    let mut cash = 0.0;
    for account in ctx.chart.of_category(AccountCategory::Cash) {
        cash += ctx.value_at(user_id, account, &position)?;
    }
    Ok(round2(cash))
}
