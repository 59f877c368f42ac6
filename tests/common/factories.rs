//! Test factories for wiring reconcilers and managers
//!
//! Every harness shares one fixed clock between the reconciler and the mock
//! signing service, so issued validity bounds line up with renewal checks.

use std::sync::Arc;

use leafcert_reconciler::db::MemoryStateStore;
use leafcert_reconciler::{CertificateManager, Reconciler, StateStore};

use super::fixtures::FixedClock;
use super::mocks::MockSigningService;

pub const TEST_SOURCE_TAG: &str = "leafcert test suite";

/// Reconciler bound to a mock signing service
pub struct Harness {
    pub clock: Arc<FixedClock>,
    pub signer: Arc<MockSigningService>,
    pub reconciler: Reconciler,
}

impl Harness {
    pub fn new() -> Self {
        let clock = Arc::new(FixedClock::default());
        let signer = Arc::new(MockSigningService::new(clock.clone()));
        let reconciler = Reconciler::new(signer.clone())
            .with_clock(clock.clone())
            .with_source_tag(TEST_SOURCE_TAG);

        Self {
            clock,
            signer,
            reconciler,
        }
    }

    /// Manager over an in-memory store
    pub fn manager(&self) -> (CertificateManager, Arc<MemoryStateStore>) {
        let store = Arc::new(MemoryStateStore::new());
        (self.manager_with_store(store.clone()), store)
    }

    pub fn manager_with_store(&self, store: Arc<dyn StateStore>) -> CertificateManager {
        CertificateManager::new(self.reconciler.clone(), store)
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
