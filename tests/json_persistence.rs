mod common;

use std::{fs, path::Path, sync::Arc};

use common::{date, temp_home};
use ledger_engine::{
    chart::ChartOfAccounts,
    config::{ConfigManager, EngineConfig},
    gl::{JsonStore, LedgerStore},
    journal::EntryRequest,
    LedgerEngine, LedgerError,
};

fn open(home: &Path) -> (LedgerEngine, EngineConfig) {
    let config = ConfigManager::with_base_dir(home)
        .expect("config manager")
        .load()
        .expect("load config");
    let engine = LedgerEngine::from_config(&config).expect("engine from config");
    (engine, config)
}

#[test]
fn entries_and_balances_survive_reopen() {
    let home = temp_home();
    let posted = {
        let (engine, config) = open(&home);
        engine
            .post_entry(
                "u1",
                EntryRequest::new("opening balance")
                    .dated(date(2024, 1, 2))
                    .debit("1100", 5000.0)
                    .credit("3000", 5000.0),
            )
            .unwrap();
        let rent = engine
            .post_entry(
                "u1",
                EntryRequest::new("Office rent")
                    .dated(date(2024, 3, 10))
                    .reference("INV-0310")
                    .debit("5100", 800.0)
                    .credit("1100", 800.0),
            )
            .unwrap();
        assert!(config.ledger_path().exists());
        rent
    };

    let (engine, _) = open(&home);
    let reloaded = engine.get_entry("u1", posted.id).unwrap();
    assert_eq!(reloaded.reference, "INV-0310");
    assert_eq!(reloaded.lines, posted.lines);
    assert_eq!(engine.list_entries("u1", None).unwrap().len(), 2);
    assert_eq!(
        engine
            .account_balance("u1", "1100", Some(date(2024, 3, 31)))
            .unwrap(),
        4200.0
    );
    let tb = engine.trial_balance("u1", Some(2024), Some(3)).unwrap();
    assert!(tb.is_balanced);
    assert!(engine.verify("u1").unwrap().is_clean());
}

#[test]
fn reversal_is_persisted() {
    let home = temp_home();
    let id = {
        let (engine, _) = open(&home);
        let entry = engine
            .post_entry(
                "u1",
                EntryRequest::new("Office rent")
                    .dated(date(2024, 3, 10))
                    .debit("5100", 800.0)
                    .credit("1100", 800.0),
            )
            .unwrap();
        engine.reverse_entry("u1", entry.id).unwrap();
        entry.id
    };

    let (engine, _) = open(&home);
    assert!(engine.get_entry("u1", id).is_err());
    assert_eq!(
        engine
            .account_balance("u1", "5100", Some(date(2024, 3, 31)))
            .unwrap(),
        0.0
    );
}

#[test]
fn rebuild_writes_a_backup_first() {
    let home = temp_home();
    let (engine, config) = open(&home);
    engine
        .post_entry(
            "u1",
            EntryRequest::new("Office rent")
                .dated(date(2024, 3, 10))
                .debit("5100", 800.0)
                .credit("1100", 800.0),
        )
        .unwrap();

    let outcome = engine.rebuild("u1").unwrap();
    assert!(outcome.report.is_clean());
    assert_eq!(outcome.buckets_written, 2);
    let backup = outcome.backup.expect("json store keeps backups");
    assert!(backup.exists());
    assert!(backup.starts_with(config.data_dir()));
    let contents = fs::read_to_string(&backup).unwrap();
    assert!(contents.contains("Office rent"));
}

#[test]
fn saved_config_changes_engine_settings() {
    let home = temp_home();
    let manager = ConfigManager::with_base_dir(&home).unwrap();
    let config = EngineConfig {
        tolerance: 0.5,
        ..manager.load().unwrap()
    };
    manager.save(&config).unwrap();

    let (engine, loaded) = open(&home);
    assert_eq!(loaded.tolerance, 0.5);
    assert_eq!(engine.tolerance(), 0.5);
    engine
        .post_entry(
            "u1",
            EntryRequest::new("loose rounding")
                .dated(date(2024, 3, 10))
                .debit("5300", 100.4)
                .credit("1100", 100.0),
        )
        .unwrap();
}

#[test]
fn unwritable_ledger_file_rolls_the_post_back() {
    let home = temp_home();
    let path = home.join("ledger.json");
    let store = Arc::new(JsonStore::open(&path, None).unwrap());
    let engine = LedgerEngine::new(Arc::new(ChartOfAccounts::default()), store.clone());
    // A non-empty directory where the snapshot belongs makes every flush fail.
    fs::create_dir_all(path.join("blocker")).unwrap();

    let err = engine
        .post_entry(
            "u1",
            EntryRequest::new("Office rent")
                .dated(date(2024, 3, 10))
                .debit("5100", 800.0)
                .credit("1100", 800.0),
        )
        .unwrap_err();
    assert!(matches!(err, LedgerError::Storage(_)));
    assert!(store.list_entries("u1").unwrap().is_empty());
    assert_eq!(
        engine
            .account_balance("u1", "1100", Some(date(2024, 3, 31)))
            .unwrap(),
        0.0
    );
    assert!(engine.verify("u1").unwrap().is_clean());
}
