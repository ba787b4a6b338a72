use thiserror::Error;
use uuid::Uuid;

/// Error type that captures ledger validation, lookup, and persistence failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Entry does not balance: debits {debits:.2} != credits {credits:.2}")]
    Balance { debits: f64, credits: f64 },
    #[error("Unknown account code: {0}")]
    Resolution(String),
    #[error("Journal entry not found: {0}")]
    EntryNotFound(Uuid),
    #[error("Invalid journal entry: {0}")]
    InvalidEntry(String),
    #[error("No posting rule for {kind} category `{category}`")]
    UnmappedTransaction { category: String, kind: String },
    #[error("Invalid chart of accounts: {0}")]
    InvalidChart(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Persistence error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

impl LedgerError {
    /// Returns true for errors the caller can fix by resubmitting a corrected entry.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            LedgerError::Balance { .. }
                | LedgerError::Resolution(_)
                | LedgerError::InvalidEntry(_)
                | LedgerError::UnmappedTransaction { .. }
        )
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balance_error_reports_both_sides() {
        let err = LedgerError::Balance {
            debits: 800.0,
            credits: 750.5,
        };
        let message = err.to_string();
        assert!(message.contains("800.00"), "unexpected message: {message}");
        assert!(message.contains("750.50"), "unexpected message: {message}");
        assert!(err.is_validation());
    }

    #[test]
    fn io_errors_map_to_storage() {
        let err: LedgerError = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert!(matches!(err, LedgerError::Storage(ref msg) if msg.contains("gone")));
        assert!(!err.is_validation());
    }
}
