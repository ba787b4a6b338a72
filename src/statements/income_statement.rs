use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    chart::{AccountCategory, AccountType},
    currency::round2,
    errors::Result,
    time::Period,
};

use super::{ReportContext, StatementSection};

/// Revenue and expense activity over an inclusive date range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub user_id: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub revenue: StatementSection,
    pub other_income: StatementSection,
    pub cost_of_sales: StatementSection,
    pub operating_expenses: StatementSection,
    pub other_expenses: StatementSection,
    pub total_revenue: f64,
    pub gross_profit: f64,
    pub operating_income: f64,
    pub net_income: f64,
}

impl IncomeStatement {
    /// Both dates are inclusive. Postings dated outside them are excluded even when they
    /// share a month with the range.
    pub fn generate(
        ctx: &ReportContext<'_>,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self> {
        let activity = ctx.activity(user_id, start, end)?;
        let revenue = ctx.range_section(user_id, AccountCategory::OperatingRevenue, &activity)?;
        let other_income = ctx.range_section(user_id, AccountCategory::OtherIncome, &activity)?;
        let cost_of_sales = ctx.range_section(user_id, AccountCategory::CostOfSales, &activity)?;
        let mut operating_expenses =
            ctx.range_section(user_id, AccountCategory::OperatingExpense, &activity)?;
        // Depreciation is an operating cost; it is split out only for the cash-flow add-back.
        let depreciation = ctx.range_section(user_id, AccountCategory::Depreciation, &activity)?;
        for line in depreciation.lines {
            operating_expenses.push(line);
        }
        let other_expenses = ctx.range_section(user_id, AccountCategory::OtherExpense, &activity)?;

        let total_revenue = revenue.total;
        let gross_profit = round2(total_revenue - cost_of_sales.total);
        let operating_income = round2(gross_profit - operating_expenses.total);
        let net_income = round2(operating_income + other_income.total - other_expenses.total);

        Ok(Self {
            user_id: user_id.to_string(),
            start,
            end,
            revenue,
            other_income,
            cost_of_sales,
            operating_expenses,
            other_expenses,
            total_revenue,
            gross_profit,
            operating_income,
            net_income,
        })
    }

    pub fn total_expenses(&self) -> f64 {
        round2(self.cost_of_sales.total + self.operating_expenses.total + self.other_expenses.total)
    }
}

/// Net income of every month from the start of tracking through `through`.
pub(crate) fn cumulative_net_income(
    ctx: &ReportContext<'_>,
    user_id: &str,
    through: Period,
) -> Result<f64> {
    let mut net = 0.0;
    for account in ctx.chart.accounts() {
        let sign = match account.account_type {
            AccountType::Revenue => 1.0,
            AccountType::Expense => -1.0,
            _ => continue,
        };
        net += sign * ctx.value_through(user_id, account, through)?;
    }
    Ok(round2(net))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    use crate::{
        chart::ChartOfAccounts,
        currency::DEFAULT_TOLERANCE,
        gl::{apply_all, LedgerStore, MemoryStore},
        journal::{EntryLine, EntryValidator, JournalEntry},
    };

    fn post(store: &MemoryStore, chart: &ChartOfAccounts, date: NaiveDate, lines: &[EntryLine]) {
        let staged = EntryValidator::new(chart, DEFAULT_TOLERANCE)
            .validate("u1", date, lines)
            .unwrap();
        apply_all(store, &staged.deltas).unwrap();
        store
            .save_entry(&JournalEntry {
                id: Uuid::new_v4(),
                user_id: "u1".into(),
                date,
                reference: format!("JE-{date}"),
                description: String::new(),
                lines: staged.lines,
                total_debit: staged.total_debit,
                total_credit: staged.total_credit,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn derives_profit_lines() {
        let chart = ChartOfAccounts::default();
        let store = MemoryStore::new();
        post(&store, &chart, date(2024, 2, 5), &[
            EntryLine::debit("1100", 5000.0),
            EntryLine::credit("4000", 5000.0),
        ]);
        post(&store, &chart, date(2024, 2, 6), &[
            EntryLine::debit("4200", 200.0),
            EntryLine::credit("1100", 200.0),
        ]);
        post(&store, &chart, date(2024, 2, 7), &[
            EntryLine::debit("5000", 1800.0),
            EntryLine::credit("1300", 1800.0),
        ]);
        post(&store, &chart, date(2024, 3, 1), &[
            EntryLine::debit("5100", 800.0),
            EntryLine::debit("5500", 100.0),
            EntryLine::credit("1100", 800.0),
            EntryLine::credit("1510", 100.0),
        ]);
        post(&store, &chart, date(2024, 3, 2), &[
            EntryLine::debit("1100", 30.0),
            EntryLine::credit("4500", 30.0),
        ]);
        post(&store, &chart, date(2024, 3, 3), &[
            EntryLine::debit("5800", 50.0),
            EntryLine::credit("1100", 50.0),
        ]);

        let ctx = ReportContext::new(&store, &chart, DEFAULT_TOLERANCE);
        let statement =
            IncomeStatement::generate(&ctx, "u1", date(2024, 1, 1), date(2024, 3, 31)).unwrap();
        assert_eq!(statement.total_revenue, 4800.0);
        assert_eq!(statement.gross_profit, 3000.0);
        assert_eq!(statement.operating_expenses.total, 900.0);
        assert_eq!(statement.operating_income, 2100.0);
        assert_eq!(statement.net_income, 2080.0);
        assert_eq!(statement.total_expenses(), 2750.0);

        let february_only =
            IncomeStatement::generate(&ctx, "u1", date(2024, 2, 1), date(2024, 2, 29)).unwrap();
        assert_eq!(february_only.net_income, 3000.0);

        let straddling =
            IncomeStatement::generate(&ctx, "u1", date(2024, 2, 6), date(2024, 3, 1)).unwrap();
        assert_eq!(straddling.total_revenue, -200.0);
        assert_eq!(straddling.gross_profit, -2000.0);
        assert_eq!(straddling.operating_expenses.total, 900.0);
        assert_eq!(straddling.net_income, -2900.0);
        assert!(straddling.other_income.is_empty());
        assert_eq!(
            cumulative_net_income(&ctx, "u1", Period::new(2024, 3).unwrap()).unwrap(),
            2080.0
        );
    }

    #[test]
    fn empty_range_is_all_zero() {
        let chart = ChartOfAccounts::default();
        let store = MemoryStore::new();
        let ctx = ReportContext::new(&store, &chart, DEFAULT_TOLERANCE);
        let day = date(2024, 6, 15);
        let statement = IncomeStatement::generate(&ctx, "u1", day, day).unwrap();
        assert_eq!(statement.net_income, 0.0);
        assert_eq!(statement.gross_profit, 0.0);
        assert!(statement.revenue.is_empty());
    }

    #[test]
    fn single_day_excludes_the_rest_of_its_month() {
        let chart = ChartOfAccounts::default();
        let store = MemoryStore::new();
        post(&store, &chart, date(2024, 3, 1), &[
            EntryLine::debit("5100", 800.0),
            EntryLine::credit("1100", 800.0),
        ]);
        post(&store, &chart, date(2024, 3, 31), &[
            EntryLine::debit("1100", 300.0),
            EntryLine::credit("4000", 300.0),
        ]);
        let ctx = ReportContext::new(&store, &chart, DEFAULT_TOLERANCE);

        let day = date(2024, 3, 15);
        let statement = IncomeStatement::generate(&ctx, "u1", day, day).unwrap();
        assert!(statement.operating_expenses.is_empty());
        assert!(statement.revenue.is_empty());
        assert_eq!(statement.net_income, 0.0);

        let month_end = date(2024, 3, 31);
        let statement = IncomeStatement::generate(&ctx, "u1", month_end, month_end).unwrap();
        assert_eq!(statement.total_revenue, 300.0);
        assert!(statement.operating_expenses.is_empty());
    }

    #[test]
    fn inverted_range_is_invalid_input() {
        let chart = ChartOfAccounts::default();
        let store = MemoryStore::new();
        let ctx = ReportContext::new(&store, &chart, DEFAULT_TOLERANCE);
        assert!(IncomeStatement::generate(&ctx, "u1", date(2024, 3, 1), date(2024, 1, 1)).is_err());
    }
}
