use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    chart::{AccountCategory, AccountType},
    currency::{round2, within_tolerance},
    errors::Result,
    time::Period,
};

use super::{
    income_statement::{cumulative_net_income, IncomeStatement},
    Position, ReportContext, StatementLine, StatementSection,
};

pub const CURRENT_YEAR_EARNINGS: &str = "Current Year Earnings";
pub const PRIOR_YEARS_EARNINGS: &str = "Retained Earnings (prior years, unclosed)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BalanceSheetSide {
    pub sections: Vec<StatementSection>,
    pub total: f64,
}

impl BalanceSheetSide {
    fn push(&mut self, section: StatementSection) {
        if section.is_empty() {
            return;
        }
        self.total = round2(self.total + section.total);
        self.sections.push(section);
    }

    pub fn line(&self, account_code: &str) -> Option<&StatementLine> {
        self.sections
            .iter()
            .find_map(|section| section.line(account_code))
    }

    pub fn synthetic(&self, name: &str) -> Option<&StatementLine> {
        self.sections
            .iter()
            .flat_map(|section| section.lines.iter())
            .find(|line| line.account_code.is_none() && line.name == name)
    }
}

/// Cumulative position of assets, liabilities and equity as of a date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub user_id: String,
    pub as_of: NaiveDate,
    pub assets: BalanceSheetSide,
    pub liabilities: BalanceSheetSide,
    pub equity: BalanceSheetSide,
    pub current_year_earnings: f64,
    pub prior_years_earnings: f64,
    pub is_balanced: bool,
    /// Assets minus liabilities and equity.
    pub difference: f64,
}

impl BalanceSheet {
    /// Always returns the statement; an imbalance is reported through `is_balanced`.
    pub fn generate(ctx: &ReportContext<'_>, user_id: &str, as_of: NaiveDate) -> Result<Self> {
        let position = ctx.position_at(user_id, as_of)?;
        let assets = side(ctx, user_id, AccountType::Asset, &position)?;
        let liabilities = side(ctx, user_id, AccountType::Liability, &position)?;
        let mut equity = side(ctx, user_id, AccountType::Equity, &position)?;

        let through = Period::of(as_of);
        let year_start = through.year_start().first_day();
        let current_year_earnings =
            IncomeStatement::generate(ctx, user_id, year_start, as_of)?.net_income;
        let prior_years_earnings =
            cumulative_net_income(ctx, user_id, through.year_start().prev())?;

        let mut earnings = StatementSection::new("Earnings");
        if prior_years_earnings != 0.0 {
            earnings.push(StatementLine::synthetic(PRIOR_YEARS_EARNINGS, prior_years_earnings));
        }
        earnings.push(StatementLine::synthetic(CURRENT_YEAR_EARNINGS, current_year_earnings));
        equity.push(earnings);

        let claims = round2(liabilities.total + equity.total);
        Ok(Self {
            user_id: user_id.to_string(),
            as_of,
            is_balanced: within_tolerance(assets.total, claims, ctx.tolerance),
            difference: round2(assets.total - claims),
            assets,
            liabilities,
            equity,
            current_year_earnings,
            prior_years_earnings,
        })
    }
}

fn side(
    ctx: &ReportContext<'_>,
    user_id: &str,
    account_type: AccountType,
    position: &Position,
) -> Result<BalanceSheetSide> {
    let mut grouped: BTreeMap<AccountCategory, StatementSection> = BTreeMap::new();
    for account in ctx.chart.of_type(account_type) {
        let value = ctx.value_at(user_id, account, position)?;
        if round2(value) == 0.0 {
            continue;
        }
        grouped
            .entry(account.category)
            .or_insert_with(|| StatementSection::new(account.category.label()))
            .push(StatementLine::account(account, value));
    }
    let mut side = BalanceSheetSide::default();
    for (_, section) in grouped {
        side.push(section);
    }
    Ok(side)
}
