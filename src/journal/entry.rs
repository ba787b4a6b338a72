use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One debit or credit leg of a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryLine {
    pub account_code: String,
    #[serde(default)]
    pub debit: f64,
    #[serde(default)]
    pub credit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntryLine {
    pub fn debit(account_code: impl Into<String>, amount: f64) -> Self {
        Self {
            account_code: account_code.into(),
            debit: amount,
            credit: 0.0,
            description: None,
        }
    }

    pub fn credit(account_code: impl Into<String>, amount: f64) -> Self {
        Self {
            account_code: account_code.into(),
            debit: 0.0,
            credit: amount,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Caller-supplied proposal for a journal entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EntryRequest {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    pub lines: Vec<EntryLine>,
}

impl EntryRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn line(mut self, line: EntryLine) -> Self {
        self.lines.push(line);
        self
    }

    pub fn debit(self, account_code: impl Into<String>, amount: f64) -> Self {
        self.line(EntryLine::debit(account_code, amount))
    }

    pub fn credit(self, account_code: impl Into<String>, amount: f64) -> Self {
        self.line(EntryLine::credit(account_code, amount))
    }
}

/// A balanced entry whose effect has been applied to the general ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JournalEntry {
    pub id: Uuid,
    pub user_id: String,
    pub date: NaiveDate,
    pub reference: String,
    pub description: String,
    pub lines: Vec<EntryLine>,
    pub total_debit: f64,
    pub total_credit: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Gross amount moved by the entry (the debit side).
    pub fn amount(&self) -> f64 {
        self.total_debit
    }

    pub fn touches(&self, account_code: &str) -> bool {
        self.lines
            .iter()
            .any(|line| line.account_code.trim() == account_code.trim())
    }
}

/// Builds the default `JE-YYYYMMDD-XXXXXXXX` reference for an entry.
pub fn generate_reference(date: NaiveDate, id: Uuid) -> String {
    let simple = id.simple().to_string();
    format!(
        "JE-{}-{}",
        date.format("%Y%m%d"),
        simple[..8].to_ascii_uppercase()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_collects_lines() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let request = EntryRequest::new("March rent")
            .dated(date)
            .debit("5100", 800.0)
            .credit("1100", 800.0);
        assert_eq!(request.lines.len(), 2);
        assert_eq!(request.lines[0].debit, 800.0);
        assert_eq!(request.lines[1].credit, 800.0);
        assert_eq!(request.date, Some(date));
    }

    #[test]
    fn generated_reference_embeds_date() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let reference = generate_reference(date, Uuid::new_v4());
        assert!(reference.starts_with("JE-20240310-"));
        assert_eq!(reference.len(), "JE-20240310-".len() + 8);
    }
}
