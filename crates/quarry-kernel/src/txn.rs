//! Transaction manager.
//!
//! A stack of snapshots. Today only a single level is accepted (BEGIN while
//! active is an error); the stack representation leaves room for a nested
//! savepoint extension without changing the contract.

use quarry_store_core::Snapshot;
use quarry_types::{Error, Result};

/// Snapshot stack with single-level semantics.
#[derive(Debug, Default)]
pub struct TxnManager {
    stack: Vec<Snapshot>,
}

impl TxnManager {
    /// A manager with no transaction in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a transaction is active.
    pub fn active(&self) -> bool {
        !self.stack.is_empty()
    }

    /// Push the BEGIN snapshot. Fails while a transaction is active.
    pub fn begin(&mut self, snapshot: Snapshot) -> Result<()> {
        if self.active() {
            return Err(Error::Transaction("transaction already active".into()));
        }
        self.stack.push(snapshot);
        Ok(())
    }

    /// Pop and discard the snapshot. Fails while none is active.
    pub fn commit(&mut self) -> Result<()> {
        self.stack
            .pop()
            .map(|_| ())
            .ok_or_else(|| Error::Transaction("no active transaction".into()))
    }

    /// Pop and return the snapshot for the caller to restore.
    pub fn rollback(&mut self) -> Result<Snapshot> {
        self.stack
            .pop()
            .ok_or_else(|| Error::Transaction("no active transaction".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    fn snap() -> Snapshot {
        Snapshot { blobs: HashMap::new(), refs: BTreeMap::new() }
    }

    #[test]
    fn begin_twice_is_an_error() {
        let mut txn = TxnManager::new();
        txn.begin(snap()).unwrap();
        assert!(matches!(txn.begin(snap()), Err(Error::Transaction(_))));
    }

    #[test]
    fn commit_and_rollback_require_an_active_transaction() {
        let mut txn = TxnManager::new();
        assert!(matches!(txn.commit(), Err(Error::Transaction(_))));
        assert!(matches!(txn.rollback(), Err(Error::Transaction(_))));

        txn.begin(snap()).unwrap();
        txn.commit().unwrap();
        assert!(!txn.active());

        txn.begin(snap()).unwrap();
        let _ = txn.rollback().unwrap();
        assert!(!txn.active());
    }
}
