use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::types::LoanId;

/// One mutex per loan aggregate. Work on different loans runs in parallel;
/// work on the same loan is serialized. An entry lives only while some
/// caller holds or waits on it.
#[derive(Debug, Default)]
pub struct LoanLocks {
    locks: DashMap<LoanId, Arc<Mutex<()>>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, loan_id: LoanId) -> Arc<Mutex<()>> {
        // clone out so the shard guard is released before blocking on the loan
        self.locks.entry(loan_id).or_default().clone()
    }

    /// run `f` while holding the loan's lock
    pub fn with_loan<T>(&self, loan_id: LoanId, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(loan_id);
        let value = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        // the map's own handle is the last one: nobody else is queued
        self.locks
            .remove_if(&loan_id, |_, held| Arc::strong_count(held) == 1);
        value
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
