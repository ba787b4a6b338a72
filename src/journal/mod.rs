//! Journal entries, their validation, and the transaction mapping table.

pub mod entry;
pub mod rules;
pub mod validator;

pub use entry::{generate_reference, EntryLine, EntryRequest, JournalEntry};
pub use rules::{PostingRule, PostingRules, TransactionInput, TransactionKind};
pub use validator::{line_deltas, EntryValidator, StagedPosting};
