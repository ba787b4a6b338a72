//! `LedgerEngine` ties the chart, the general ledger, and the statement generators together
//! behind the operations exposed to callers.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    chart::{Account, ChartOfAccounts},
    config::EngineConfig,
    currency::{round2, DEFAULT_TOLERANCE},
    errors::{LedgerError, Result},
    events::{EventSink, LedgerEvent, TracingSink},
    gl::{apply_all, BucketDelta, JsonStore, LedgerStore},
    journal::{
        generate_reference, EntryRequest, EntryValidator, JournalEntry, PostingRules,
        StagedPosting, TransactionInput,
    },
    reconcile::{self, RebuildOutcome, ReconciliationReport},
    reversal,
    statements::{
        BalanceSheet, CashFlowStatement, IncomeStatement, ReportContext, TrialBalance,
    },
    time::{Clock, Period, SystemClock},
};

/// Facade over one chart of accounts and one ledger store.
pub struct LedgerEngine {
    chart: Arc<ChartOfAccounts>,
    store: Arc<dyn LedgerStore>,
    events: Arc<dyn EventSink>,
    clock: Arc<dyn Clock>,
    rules: PostingRules,
    tolerance: f64,
}

impl LedgerEngine {
    pub fn new(chart: Arc<ChartOfAccounts>, store: Arc<dyn LedgerStore>) -> Self {
        Self {
            chart,
            store,
            events: Arc::new(TracingSink),
            clock: Arc::new(SystemClock),
            rules: PostingRules::default(),
            tolerance: DEFAULT_TOLERANCE,
        }
    }

    /// Builds an engine over the JSON store and chart named by `config`.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let chart = match &config.chart_path {
            Some(path) => ChartOfAccounts::load_from_path(path)?,
            None => ChartOfAccounts::default(),
        };
        let store = JsonStore::open(config.ledger_path(), Some(config.backup_retention))?;
        Self::new(Arc::new(chart), Arc::new(store))
            .with_posting_rules(config.posting_rules.clone())?
            .with_tolerance(config.tolerance)
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the mapping table; every rule must reference accounts in the chart.
    pub fn with_posting_rules(mut self, rules: PostingRules) -> Result<Self> {
        rules.validate_against(&self.chart)?;
        self.rules = rules;
        Ok(self)
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(LedgerError::Config(format!(
                "tolerance must be a non-negative number, got {tolerance}"
            )));
        }
        self.tolerance = tolerance;
        Ok(self)
    }

    pub fn chart(&self) -> &ChartOfAccounts {
        &self.chart
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub fn posting_rules(&self) -> &PostingRules {
        &self.rules
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Chart accounts ordered by code.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.chart.accounts()
    }

    fn validator(&self) -> EntryValidator<'_> {
        EntryValidator::new(&self.chart, self.tolerance)
    }

    fn report_context(&self) -> ReportContext<'_> {
        ReportContext::new(self.store.as_ref(), &self.chart, self.tolerance)
    }

    fn stage(&self, user_id: &str, date: NaiveDate, request: &EntryRequest) -> Result<StagedPosting> {
        self.validator()
            .validate(user_id, date, &request.lines)
            .map_err(|err| {
                warn!(user_id, %date, error = %err, "journal entry rejected");
                err
            })
    }

    /// Validates and posts a journal entry. Nothing is applied unless every line resolves
    /// and the entry balances.
    pub fn post_entry(&self, user_id: &str, request: EntryRequest) -> Result<JournalEntry> {
        let user_id = checked_user(user_id)?;
        let date = request.date.unwrap_or_else(|| self.clock.today());
        let staged = self.stage(user_id, date, &request)?;
        apply_all(self.store.as_ref(), &staged.deltas)?;

        let id = Uuid::new_v4();
        let now = self.clock.now();
        let entry = JournalEntry {
            id,
            user_id: user_id.to_string(),
            date,
            reference: request
                .reference
                .filter(|reference| !reference.trim().is_empty())
                .unwrap_or_else(|| generate_reference(date, id)),
            description: request.description,
            lines: staged.lines,
            total_debit: round2(staged.total_debit),
            total_credit: round2(staged.total_credit),
            created_at: now,
            updated_at: now,
        };
        if let Err(err) = self.store.save_entry(&entry).and_then(|()| self.store.flush()) {
            self.discard_entry(user_id, id);
            self.undo(&staged.deltas);
            return Err(err);
        }

        info!(
            user_id,
            entry_id = %entry.id,
            reference = %entry.reference,
            amount = entry.amount(),
            lines = entry.lines.len(),
            "journal entry posted"
        );
        self.events.publish(&posted_event(&entry));
        Ok(entry)
    }

    /// Maps a categorised transaction through the posting rules and posts it.
    pub fn record_transaction(&self, user_id: &str, input: TransactionInput) -> Result<JournalEntry> {
        let user_id = checked_user(user_id)?;
        let request = self.rules.to_request(&input).map_err(|err| {
            warn!(user_id, category = %input.category, error = %err, "transaction not mapped");
            err
        })?;
        self.post_entry(user_id, request)
    }

    /// Offsets the entry's ledger effect and removes the record.
    pub fn reverse_entry(&self, user_id: &str, id: Uuid) -> Result<JournalEntry> {
        let user_id = checked_user(user_id)?;
        let entry = self
            .store
            .remove_entry(user_id, id)?
            .ok_or(LedgerError::EntryNotFound(id))?;
        let applied = match reversal::reverse(self.store.as_ref(), &self.chart, &entry) {
            Ok(applied) => applied,
            Err(err) => {
                self.restore_entry(&entry);
                return Err(err);
            }
        };
        if let Err(err) = self.store.flush() {
            self.undo(&applied);
            self.restore_entry(&entry);
            return Err(err);
        }

        info!(user_id, entry_id = %id, reference = %entry.reference, "journal entry reversed");
        self.events.publish(&reversed_event(&entry));
        Ok(entry)
    }

    /// Replaces an entry's lines, date, and text. The replacement is validated before the old
    /// effect is touched, and both are applied as one all-or-nothing batch.
    pub fn edit_entry(&self, user_id: &str, id: Uuid, request: EntryRequest) -> Result<JournalEntry> {
        let user_id = checked_user(user_id)?;
        let current = self.get_entry(user_id, id)?;
        let date = request.date.unwrap_or(current.date);
        let staged = self.stage(user_id, date, &request)?;

        let previous = self
            .store
            .remove_entry(user_id, id)?
            .ok_or(LedgerError::EntryNotFound(id))?;
        let batch = reversal::reversal_deltas(&self.chart, &previous)
            .map(|mut deltas| {
                deltas.extend(staged.deltas.iter().cloned());
                deltas
            })
            .and_then(|deltas| apply_all(self.store.as_ref(), &deltas).map(|_| deltas));
        let applied = match batch {
            Ok(deltas) => deltas,
            Err(err) => {
                self.restore_entry(&previous);
                return Err(err);
            }
        };

        let description = if request.description.trim().is_empty() {
            previous.description.clone()
        } else {
            request.description
        };
        let updated = JournalEntry {
            id,
            user_id: previous.user_id.clone(),
            date,
            reference: request
                .reference
                .filter(|reference| !reference.trim().is_empty())
                .unwrap_or_else(|| previous.reference.clone()),
            description,
            lines: staged.lines,
            total_debit: round2(staged.total_debit),
            total_credit: round2(staged.total_credit),
            created_at: previous.created_at,
            updated_at: self.clock.now(),
        };
        if let Err(err) = self.store.save_entry(&updated).and_then(|()| self.store.flush()) {
            self.undo(&applied);
            self.restore_entry(&previous);
            return Err(err);
        }

        info!(user_id, entry_id = %id, reference = %updated.reference, "journal entry replaced");
        self.events.publish(&reversed_event(&previous));
        self.events.publish(&posted_event(&updated));
        Ok(updated)
    }

    /// Changes only the entry's description; the ledger is untouched.
    pub fn edit_description(
        &self,
        user_id: &str,
        id: Uuid,
        description: impl Into<String>,
    ) -> Result<JournalEntry> {
        let user_id = checked_user(user_id)?;
        let previous = self.get_entry(user_id, id)?;
        let entry = JournalEntry {
            description: description.into(),
            updated_at: self.clock.now(),
            ..previous.clone()
        };
        if let Err(err) = self.store.save_entry(&entry).and_then(|()| self.store.flush()) {
            self.restore_entry(&previous);
            return Err(err);
        }
        debug!(user_id, entry_id = %id, "journal entry description updated");
        Ok(entry)
    }

    pub fn get_entry(&self, user_id: &str, id: Uuid) -> Result<JournalEntry> {
        self.store
            .load_entry(checked_user(user_id)?, id)?
            .ok_or(LedgerError::EntryNotFound(id))
    }

    /// Entries ordered by date then creation time, optionally limited to a date range.
    pub fn list_entries(
        &self,
        user_id: &str,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<JournalEntry>> {
        let entries = self.store.list_entries(checked_user(user_id)?)?;
        let Some((start, end)) = range else {
            return Ok(entries);
        };
        if start > end {
            return Err(LedgerError::InvalidInput(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(entries
            .into_iter()
            .filter(|entry| entry.date >= start && entry.date <= end)
            .collect())
    }

    /// Trial balance for one month; missing parts default to the current month.
    pub fn trial_balance(
        &self,
        user_id: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<TrialBalance> {
        let today = self.clock.today();
        let period = Period::new(
            year.unwrap_or_else(|| today.year()),
            month.unwrap_or_else(|| today.month()),
        )?;
        TrialBalance::generate(&self.report_context(), checked_user(user_id)?, period)
    }

    pub fn balance_sheet(&self, user_id: &str, as_of: Option<NaiveDate>) -> Result<BalanceSheet> {
        let user_id = checked_user(user_id)?;
        let as_of = as_of.unwrap_or_else(|| self.clock.today());
        BalanceSheet::generate(&self.report_context(), user_id, as_of)
    }

    pub fn income_statement(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IncomeStatement> {
        IncomeStatement::generate(&self.report_context(), checked_user(user_id)?, start, end)
    }

    pub fn cash_flow_statement(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<CashFlowStatement> {
        CashFlowStatement::generate(&self.report_context(), checked_user(user_id)?, start, end)
    }

    /// Balance of one account at the close of `as_of`, signed by its normal balance.
    pub fn account_balance(
        &self,
        user_id: &str,
        account_code: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<f64> {
        let user_id = checked_user(user_id)?;
        let account = self.chart.lookup(account_code)?;
        let ctx = self.report_context();
        let position = ctx.position_at(user_id, as_of.unwrap_or_else(|| self.clock.today()))?;
        Ok(round2(ctx.balance_at(user_id, account, &position)?))
    }

    /// Compares stored buckets against a recomputation from the entries. Read-only.
    pub fn verify(&self, user_id: &str) -> Result<ReconciliationReport> {
        reconcile::verify(self.store.as_ref(), &self.chart, checked_user(user_id)?, self.tolerance)
    }

    /// Recomputes the user's buckets from the stored entries and replaces them.
    pub fn rebuild(&self, user_id: &str) -> Result<RebuildOutcome> {
        reconcile::rebuild(self.store.as_ref(), &self.chart, checked_user(user_id)?, self.tolerance)
    }

    fn undo(&self, deltas: &[BucketDelta]) {
        let inverse: Vec<BucketDelta> = deltas.iter().map(BucketDelta::negated).collect();
        if let Err(err) = apply_all(self.store.as_ref(), &inverse) {
            warn!(error = %err, "could not undo ledger effect; run reconciliation");
        }
    }

    fn restore_entry(&self, entry: &JournalEntry) {
        if let Err(err) = self.store.save_entry(entry) {
            warn!(entry_id = %entry.id, error = %err, "could not restore journal entry; run reconciliation");
        }
    }

    fn discard_entry(&self, user_id: &str, id: Uuid) {
        if let Err(err) = self.store.remove_entry(user_id, id) {
            warn!(user_id, entry_id = %id, error = %err, "could not discard journal entry");
        }
    }
}

fn checked_user(user_id: &str) -> Result<&str> {
    let trimmed = user_id.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidInput("user id must not be empty".into()));
    }
    Ok(trimmed)
}

fn posted_event(entry: &JournalEntry) -> LedgerEvent {
    LedgerEvent::EntryPosted {
        user_id: entry.user_id.clone(),
        entry_id: entry.id,
        reference: entry.reference.clone(),
        date: entry.date,
        amount: entry.amount(),
    }
}

fn reversed_event(entry: &JournalEntry) -> LedgerEvent {
    LedgerEvent::EntryReversed {
        user_id: entry.user_id.clone(),
        entry_id: entry.id,
        reference: entry.reference.clone(),
        date: entry.date,
        amount: entry.amount(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::{
        events::CollectingSink,
        gl::{AccountTotal, Bucket, BucketKey, Delta, MemoryStore},
        journal::TransactionKind,
        time::FixedClock,
    };

    /// Memory store whose `flush` fails while `fail_flush` is set, like a JSON store whose
    /// file cannot be replaced.
    #[derive(Default)]
    struct UnwritableStore {
        inner: MemoryStore,
        fail_flush: AtomicBool,
    }

    impl LedgerStore for UnwritableStore {
        fn apply_delta(&self, key: &BucketKey, delta: &Delta) -> Result<()> {
            self.inner.apply_delta(key, delta)
        }
        fn read_bucket(&self, key: &BucketKey) -> Result<Bucket> {
            self.inner.read_bucket(key)
        }
        fn account_total(&self, user_id: &str, code: &str) -> Result<AccountTotal> {
            self.inner.account_total(user_id, code)
        }
        fn scan_account(&self, user_id: &str, code: &str) -> Result<Vec<(Period, Bucket)>> {
            self.inner.scan_account(user_id, code)
        }
        fn scan_user(&self, user_id: &str) -> Result<Vec<(BucketKey, Bucket)>> {
            self.inner.scan_user(user_id)
        }
        fn save_entry(&self, entry: &JournalEntry) -> Result<()> {
            self.inner.save_entry(entry)
        }
        fn load_entry(&self, user_id: &str, id: Uuid) -> Result<Option<JournalEntry>> {
            self.inner.load_entry(user_id, id)
        }
        fn remove_entry(&self, user_id: &str, id: Uuid) -> Result<Option<JournalEntry>> {
            self.inner.remove_entry(user_id, id)
        }
        fn list_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
            self.inner.list_entries(user_id)
        }
        fn replace_user_ledger(&self, user_id: &str, b: Vec<(BucketKey, Bucket)>) -> Result<()> {
            self.inner.replace_user_ledger(user_id, b)
        }
        fn flush(&self) -> Result<()> {
            if self.fail_flush.load(Ordering::SeqCst) {
                return Err(LedgerError::Storage("ledger.json is not writable".into()));
            }
            Ok(())
        }
    }

    fn unwritable_engine() -> (LedgerEngine, Arc<UnwritableStore>, Arc<CollectingSink>) {
        let store = Arc::new(UnwritableStore::default());
        let sink = Arc::new(CollectingSink::new());
        let engine = LedgerEngine::new(Arc::new(ChartOfAccounts::default()), store.clone())
            .with_events(sink.clone())
            .with_clock(Arc::new(FixedClock(date(2024, 3, 20))));
        (engine, store, sink)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn engine() -> (LedgerEngine, Arc<MemoryStore>, Arc<CollectingSink>) {
        let store = Arc::new(MemoryStore::new());
        let sink = Arc::new(CollectingSink::new());
        let engine = LedgerEngine::new(Arc::new(ChartOfAccounts::default()), store.clone())
            .with_events(sink.clone())
            .with_clock(Arc::new(FixedClock(date(2024, 3, 20))));
        (engine, store, sink)
    }

    fn rent(on: NaiveDate) -> EntryRequest {
        EntryRequest::new("Office rent")
            .dated(on)
            .debit("5100", 800.0)
            .credit("1100", 800.0)
    }

    #[test]
    fn post_defaults_date_and_reference() {
        let (engine, _, sink) = engine();
        let entry = engine
            .post_entry("u1", EntryRequest::new("rent").debit("5100", 800.0).credit("1100", 800.0))
            .unwrap();
        assert_eq!(entry.date, date(2024, 3, 20));
        assert!(entry.reference.starts_with("JE-20240320-"));
        assert_eq!(sink.events(), vec![posted_event(&entry)]);
    }

    #[test]
    fn rejected_entry_publishes_nothing() {
        let (engine, store, sink) = engine();
        let err = engine
            .post_entry(
                "u1",
                EntryRequest::new("bad").debit("5100", 800.0).credit("1100", 750.0),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Balance { .. }));
        assert!(store.scan_user("u1").unwrap().is_empty());
        assert!(store.list_entries("u1").unwrap().is_empty());
        assert!(sink.events().is_empty());
    }

    #[test]
    fn blank_user_is_invalid_input() {
        let (engine, _, _) = engine();
        let err = engine.post_entry("  ", rent(date(2024, 3, 10))).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }

    #[test]
    fn blank_user_is_rejected_everywhere() {
        let (engine, _, _) = engine();
        let entry = engine.post_entry("u1", rent(date(2024, 3, 10))).unwrap();
        let blank = |result: Result<()>| matches!(result, Err(LedgerError::InvalidInput(_)));
        let (start, end) = (date(2024, 3, 1), date(2024, 3, 31));

        assert!(blank(engine.reverse_entry(" ", entry.id).map(drop)));
        assert!(blank(engine.edit_entry("", entry.id, rent(start)).map(drop)));
        assert!(blank(engine.edit_description("\t", entry.id, "x").map(drop)));
        assert!(blank(engine.get_entry("", entry.id).map(drop)));
        assert!(blank(engine.list_entries("", None).map(drop)));
        assert!(blank(engine.trial_balance("", Some(2024), Some(3)).map(drop)));
        assert!(blank(engine.balance_sheet("", None).map(drop)));
        assert!(blank(engine.income_statement("", start, end).map(drop)));
        assert!(blank(engine.cash_flow_statement("", start, end).map(drop)));
        assert!(blank(engine.account_balance("", "1100", None).map(drop)));
        assert!(blank(engine.verify("").map(drop)));
        assert!(blank(engine.rebuild("").map(drop)));
        assert_eq!(engine.get_entry("u1", entry.id).unwrap(), entry);
    }

    #[test]
    fn padded_user_id_reads_the_same_ledger() {
        let (engine, _, _) = engine();
        let entry = engine.post_entry(" u1 ", rent(date(2024, 3, 10))).unwrap();
        assert_eq!(entry.user_id, "u1");
        assert_eq!(engine.list_entries("u1 ", None).unwrap().len(), 1);
        assert_eq!(engine.account_balance(" u1", "5100", None).unwrap(), 800.0);
        engine.reverse_entry(" u1 ", entry.id).unwrap();
        assert!(engine.list_entries("u1", None).unwrap().is_empty());
    }

    #[test]
    fn failed_flush_undoes_the_post() {
        let (engine, store, sink) = unwritable_engine();
        store.fail_flush.store(true, Ordering::SeqCst);
        let err = engine.post_entry("u1", rent(date(2024, 3, 10))).unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));
        assert!(store.list_entries("u1").unwrap().is_empty());
        assert!(store.scan_user("u1").unwrap().iter().all(|(_, bucket)| bucket.is_zero()));
        assert_eq!(store.account_total("u1", "1100").unwrap().balance, 0.0);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn failed_flush_keeps_the_entry_on_reverse() {
        let (engine, store, sink) = unwritable_engine();
        let entry = engine.post_entry("u1", rent(date(2024, 3, 10))).unwrap();
        let before = store.scan_user("u1").unwrap();

        store.fail_flush.store(true, Ordering::SeqCst);
        assert!(engine.reverse_entry("u1", entry.id).is_err());
        assert_eq!(engine.get_entry("u1", entry.id).unwrap(), entry);
        assert_eq!(store.scan_user("u1").unwrap(), before);
        assert_eq!(engine.account_balance("u1", "1100", None).unwrap(), -800.0);
        assert_eq!(sink.events().len(), 1);

        store.fail_flush.store(false, Ordering::SeqCst);
        engine.reverse_entry("u1", entry.id).unwrap();
        assert_eq!(engine.account_balance("u1", "1100", None).unwrap(), 0.0);
    }

    #[test]
    fn failed_flush_restores_edited_entries() {
        let (engine, store, _) = unwritable_engine();
        let entry = engine.post_entry("u1", rent(date(2024, 2, 10))).unwrap();
        let live = |store: &UnwritableStore| -> Vec<(BucketKey, Bucket)> {
            let buckets = store.scan_user("u1").unwrap();
            buckets.into_iter().filter(|(_, bucket)| !bucket.is_zero()).collect()
        };
        let before = live(store.as_ref());

        store.fail_flush.store(true, Ordering::SeqCst);
        assert!(engine
            .edit_entry("u1", entry.id, rent(date(2024, 3, 10)))
            .is_err());
        assert!(engine
            .edit_description("u1", entry.id, "February office rent")
            .is_err());
        assert_eq!(engine.get_entry("u1", entry.id).unwrap(), entry);
        assert_eq!(live(store.as_ref()), before);
    }

    #[test]
    fn statement_ranges_are_day_precise() {
        let (engine, _, _) = engine();
        engine
            .post_entry(
                "u1",
                EntryRequest::new("capital")
                    .dated(date(2024, 1, 2))
                    .debit("1100", 5000.0)
                    .credit("3000", 5000.0),
            )
            .unwrap();
        engine.post_entry("u1", rent(date(2024, 3, 1))).unwrap();
        engine.post_entry("u1", rent(date(2024, 3, 18))).unwrap();

        let single_day = engine
            .income_statement("u1", date(2024, 3, 15), date(2024, 3, 15))
            .unwrap();
        assert!(single_day.operating_expenses.is_empty());
        assert_eq!(single_day.net_income, 0.0);
        let first_half = engine
            .income_statement("u1", date(2024, 3, 1), date(2024, 3, 15))
            .unwrap();
        assert_eq!(first_half.net_income, -800.0);

        let flow = engine
            .cash_flow_statement("u1", date(2024, 3, 15), date(2024, 3, 15))
            .unwrap();
        assert_eq!(flow.net_change_in_cash, 0.0);
        assert_eq!(flow.beginning_cash, 4200.0);
        assert_eq!(flow.ledger_ending_cash, 4200.0);
        assert!(flow.is_reconciled);

        let sheet = engine.balance_sheet("u1", Some(date(2024, 3, 15))).unwrap();
        assert!(sheet.is_balanced, "difference {}", sheet.difference);
        assert_eq!(sheet.assets.total, 4200.0);
        assert_eq!(sheet.current_year_earnings, -800.0);

        assert_eq!(
            engine
                .account_balance("u1", "1100", Some(date(2024, 3, 15)))
                .unwrap(),
            4200.0
        );
        assert_eq!(engine.account_balance("u1", "1100", None).unwrap(), 3400.0);
        assert_eq!(
            engine
                .account_balance("u1", "1100", Some(date(2024, 2, 29)))
                .unwrap(),
            5000.0
        );
    }

    #[test]
    fn reverse_is_scoped_to_owner() {
        let (engine, _, _) = engine();
        let entry = engine.post_entry("u1", rent(date(2024, 3, 10))).unwrap();
        let err = engine.reverse_entry("u2", entry.id).unwrap_err();
        assert!(matches!(err, LedgerError::EntryNotFound(id) if id == entry.id));

        engine.reverse_entry("u1", entry.id).unwrap();
        assert!(matches!(
            engine.reverse_entry("u1", entry.id),
            Err(LedgerError::EntryNotFound(_))
        ));
        assert_eq!(engine.account_balance("u1", "1100", None).unwrap(), 0.0);
    }

    #[test]
    fn edit_moves_effect_between_periods() {
        let (engine, store, sink) = engine();
        let entry = engine.post_entry("u1", rent(date(2024, 2, 10))).unwrap();
        let edited = engine
            .edit_entry(
                "u1",
                entry.id,
                EntryRequest::new("")
                    .dated(date(2024, 3, 10))
                    .debit("5100", 900.0)
                    .credit("1100", 900.0),
            )
            .unwrap();

        assert_eq!(edited.id, entry.id);
        assert_eq!(edited.description, "Office rent");
        assert_eq!(edited.reference, entry.reference);
        let feb = Period::new(2024, 2).unwrap();
        let mar = Period::new(2024, 3).unwrap();
        assert_eq!(store.read_bucket(&BucketKey::new("u1", "5100", feb)).unwrap().balance, 0.0);
        assert_eq!(store.read_bucket(&BucketKey::new("u1", "5100", mar)).unwrap().balance, 900.0);
        assert_eq!(sink.events().len(), 3);
    }

    #[test]
    fn invalid_edit_leaves_original_in_place() {
        let (engine, store, _) = engine();
        let entry = engine.post_entry("u1", rent(date(2024, 3, 10))).unwrap();
        let before = store.scan_user("u1").unwrap();
        let err = engine
            .edit_entry(
                "u1",
                entry.id,
                EntryRequest::new("typo").debit("9999", 10.0).credit("1100", 10.0),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Resolution(_)));
        assert_eq!(store.scan_user("u1").unwrap(), before);
        assert_eq!(engine.get_entry("u1", entry.id).unwrap(), entry);
    }

    #[test]
    fn description_edit_does_not_touch_ledger() {
        let (engine, store, _) = engine();
        let entry = engine.post_entry("u1", rent(date(2024, 3, 10))).unwrap();
        let before = store.scan_user("u1").unwrap();
        let edited = engine.edit_description("u1", entry.id, "March office rent").unwrap();
        assert_eq!(edited.description, "March office rent");
        assert_eq!(store.scan_user("u1").unwrap(), before);
    }

    #[test]
    fn record_transaction_uses_posting_rules() {
        let (engine, _, _) = engine();
        let entry = engine
            .record_transaction(
                "u1",
                TransactionInput {
                    kind: TransactionKind::Expense,
                    category: "Rent".into(),
                    amount: 800.0,
                    description: "rent".into(),
                    date: Some(date(2024, 3, 10)),
                    reference: None,
                },
            )
            .unwrap();
        assert!(entry.touches("5100"));
        assert!(entry.touches("1100"));

        let err = engine
            .record_transaction(
                "u1",
                TransactionInput {
                    kind: TransactionKind::Expense,
                    category: "yacht".into(),
                    amount: 10.0,
                    description: "?".into(),
                    date: None,
                    reference: None,
                },
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::UnmappedTransaction { .. }));
    }

    #[test]
    fn list_entries_filters_by_date() {
        let (engine, _, _) = engine();
        engine.post_entry("u1", rent(date(2024, 1, 10))).unwrap();
        engine.post_entry("u1", rent(date(2024, 3, 10))).unwrap();
        let march = engine
            .list_entries("u1", Some((date(2024, 3, 1), date(2024, 3, 31))))
            .unwrap();
        assert_eq!(march.len(), 1);
        assert!(engine
            .list_entries("u1", Some((date(2024, 3, 31), date(2024, 3, 1))))
            .is_err());
    }

    #[test]
    fn trial_balance_defaults_to_current_month() {
        let (engine, _, _) = engine();
        engine.post_entry("u1", rent(date(2024, 3, 10))).unwrap();
        let tb = engine.trial_balance("u1", None, None).unwrap();
        assert_eq!(tb.period, Period::new(2024, 3).unwrap());
        assert!(tb.is_balanced);
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let engine = LedgerEngine::new(
            Arc::new(ChartOfAccounts::default()),
            Arc::new(MemoryStore::new()),
        );
        assert!(matches!(engine.with_tolerance(-1.0), Err(LedgerError::Config(_))));
    }
}
