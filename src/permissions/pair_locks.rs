use crate::error::{ConsentResult, StorageError};
use crate::permissions::types::PartyPair;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Mutex, MutexGuard};

/// Serializes registry operations per (holder, requester) pair.
///
/// A fixed number of stripes bounds memory regardless of how many pairs
/// exist; unrelated pairs sharing a stripe only wait on each other. The
/// stripes guard no data, only the read-check-commit sequence.
pub struct PairLocks {
    stripes: Vec<Mutex<()>>,
}

impl PairLocks {
    pub fn new(stripes: usize) -> Self {
        let stripes = (0..stripes.max(1)).map(|_| Mutex::new(())).collect();
        Self { stripes }
    }

    pub fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    fn stripe_for(&self, pair: &PartyPair) -> usize {
        let mut hasher = DefaultHasher::new();
        pair.hash(&mut hasher);
        (hasher.finish() % self.stripes.len() as u64) as usize
    }

    /// Blocks until the pair's stripe is free.
    pub fn lock(&self, pair: &PartyPair) -> ConsentResult<MutexGuard<'_, ()>> {
        self.stripes[self.stripe_for(pair)]
            .lock()
            .map_err(|_| StorageError::LockPoisoned(format!("pair lock for {pair}")).into())
    }
}
