//! Thread-safe ledger handle
//!
//! Hosts that serve queries and transactions from several threads share one
//! [`StakingLedger`] behind a `parking_lot::RwLock`. Every mutation runs
//! inside a single write guard, so it commits or fails as a whole.

use crate::error::Result;
use crate::staking::StakingLedger;
use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use tracing::debug;

/// Cloneable handle to a shared ledger
#[derive(Debug, Clone)]
pub struct SharedStakingLedger {
    inner: Arc<RwLock<StakingLedger>>,
}

impl SharedStakingLedger {
    /// Wrap a ledger
    pub fn new(ledger: StakingLedger) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Read access for queries
    pub fn read(&self) -> RwLockReadGuard<'_, StakingLedger> {
        self.inner.read()
    }

    /// Run one mutation under the write lock
    ///
    /// Operations validate before writing, so a failed `op` leaves the
    /// ledger unchanged.
    pub fn transact<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut StakingLedger) -> Result<T>,
    {
        let mut ledger = self.inner.write();
        let result = op(&mut ledger);
        if let Err(ref e) = result {
            debug!("Ledger transaction rejected: {}", e);
        }
        result
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> StakingLedger {
        self.inner.read().clone()
    }
}
