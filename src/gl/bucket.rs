use serde::{Deserialize, Serialize};

use crate::time::Period;

/// Identifies one general-ledger bucket: a user's account in one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BucketKey {
    pub user_id: String,
    pub account_code: String,
    pub period: Period,
}

impl BucketKey {
    pub fn new(user_id: impl Into<String>, account_code: impl Into<String>, period: Period) -> Self {
        Self {
            user_id: user_id.into(),
            account_code: account_code.into(),
            period,
        }
    }

    pub fn account_key(&self) -> AccountKey {
        AccountKey {
            user_id: self.user_id.clone(),
            account_code: self.account_code.clone(),
        }
    }
}

/// Identifies a user's account across all periods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountKey {
    pub user_id: String,
    pub account_code: String,
}

/// Per-period aggregate of posted activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub total_debits: f64,
    pub total_credits: f64,
    /// Signed by the account's normal balance.
    pub balance: f64,
}

impl Bucket {
    pub fn apply(&mut self, delta: &Delta) {
        self.total_debits += delta.debit;
        self.total_credits += delta.credit;
        self.balance += delta.balance;
    }

    pub fn add(&mut self, other: &Bucket) {
        self.total_debits += other.total_debits;
        self.total_credits += other.total_credits;
        self.balance += other.balance;
    }

    pub fn is_zero(&self) -> bool {
        self.total_debits == 0.0 && self.total_credits == 0.0 && self.balance == 0.0
    }
}

/// Running all-time balance for one account, maintained alongside the buckets.
pub type AccountTotal = Bucket;

/// Increment applied atomically to a bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub debit: f64,
    pub credit: f64,
    pub balance: f64,
}

impl Delta {
    pub fn negated(self) -> Self {
        Self {
            debit: -self.debit,
            credit: -self.credit,
            balance: -self.balance,
        }
    }
}

/// A delta bound to the bucket it targets.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketDelta {
    pub key: BucketKey,
    pub delta: Delta,
}

impl BucketDelta {
    pub fn negated(&self) -> Self {
        Self {
            key: self.key.clone(),
            delta: self.delta.negated(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applying_negated_delta_restores_bucket() {
        let mut bucket = Bucket::default();
        let delta = Delta {
            debit: 800.0,
            credit: 0.0,
            balance: 800.0,
        };
        bucket.apply(&delta);
        assert_eq!(bucket.balance, 800.0);
        bucket.apply(&delta.negated());
        assert!(bucket.is_zero());
    }
}
