use super::entitlement::EntitlementStore;
use super::history::PublicationLog;
use super::ledger::QuotaLedger;
use crate::prelude::*;
use crate::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Everything the quota engine remembers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuotaState {
    pub entitlements: EntitlementStore,
    pub ledger: QuotaLedger,
    pub publications: PublicationLog,
}

#[async_trait]
pub trait QuotaStore: Send + Sync + 'static {
    async fn load(&self) -> Result<QuotaState>;

    /// Moves the stored state from `before` to `after`. `before` is the state
    /// this store last loaded or saved, so only the difference needs to be
    /// written. Must be atomic: either all of it is written or nothing.
    async fn save(&self, before: &QuotaState, after: &QuotaState) -> Result;
}

/// Store that keeps the state in memory. Used in tests and when running
/// without a database.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<QuotaState>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    /// Makes every subsequent [`QuotaStore::load`] fail until toggled back.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent [`QuotaStore::save`] fail until toggled back.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> QuotaState {
        self.state.lock().clone()
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    async fn load(&self) -> Result<QuotaState> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(fatal!("Reads from the in-memory store are disabled"));
        }
        Ok(self.snapshot())
    }

    async fn save(&self, _before: &QuotaState, after: &QuotaState) -> Result {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(fatal!("Writes to the in-memory store are disabled"));
        }
        *self.state.lock() = after.clone();
        Ok(())
    }
}
