//! Fire-and-forget notifications for audit and stream consumers.

use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    EntryPosted {
        user_id: String,
        entry_id: Uuid,
        reference: String,
        date: NaiveDate,
        amount: f64,
    },
    EntryReversed {
        user_id: String,
        entry_id: Uuid,
        reference: String,
        date: NaiveDate,
        amount: f64,
    },
}

impl LedgerEvent {
    pub fn entry_id(&self) -> Uuid {
        match self {
            LedgerEvent::EntryPosted { entry_id, .. }
            | LedgerEvent::EntryReversed { entry_id, .. } => *entry_id,
        }
    }
}

/// Receives ledger events. Publishing must not fail the operation that emitted it.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: &LedgerEvent);
}

/// Writes every event to the tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::EntryPosted {
                user_id,
                entry_id,
                reference,
                amount,
                ..
            } => info!(target: "ledger_engine::audit", %user_id, %entry_id, %reference, amount, "entry posted"),
            LedgerEvent::EntryReversed {
                user_id,
                entry_id,
                reference,
                amount,
                ..
            } => info!(target: "ledger_engine::audit", %user_id, %entry_id, %reference, amount, "entry reversed"),
        }
    }
}

/// Keeps events in memory, for tests and embedding applications that drain them.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<LedgerEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<LedgerEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }
}

impl EventSink for CollectingSink {
    fn publish(&self, event: &LedgerEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
