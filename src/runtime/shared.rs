use std::sync::Arc;

use tokio::sync::Mutex;

use crate::action::ActionDescriptor;
use crate::policy::types::ApprovalRequirement;
use crate::runtime::dispatcher::{DispatchError, DispatchOutcome, GovernanceDispatcher, PolicyChangeRequest};
use crate::types::Address;

/// A dispatcher shared between async tasks.
///
/// Every call holds the lock for its full duration, so concurrent submitters
/// are serialized and readers never see a half-applied batch.
#[derive(Clone)]
pub struct SharedDispatcher {
    inner: Arc<Mutex<GovernanceDispatcher>>,
}

impl SharedDispatcher {
    pub fn new(dispatcher: GovernanceDispatcher) -> Self {
        Self {
            inner: Arc::new(Mutex::new(dispatcher)),
        }
    }

    pub async fn submit(
        &self,
        request: PolicyChangeRequest,
        proposer: Address,
        now_ms: u64,
    ) -> Result<DispatchOutcome, DispatchError> {
        let mut guard: tokio::sync::MutexGuard<GovernanceDispatcher> = self.inner.lock().await;
        guard.submit(request, proposer, now_ms)
    }

    pub async fn submit_batch(
        &self,
        requests: Vec<PolicyChangeRequest>,
        proposer: Address,
        now_ms: u64,
    ) -> Result<Vec<DispatchOutcome>, DispatchError> {
        let mut guard = self.inner.lock().await;
        guard.submit_batch(requests, proposer, now_ms)
    }

    pub async fn analyze(&self, actions: &[ActionDescriptor]) -> ApprovalRequirement {
        self.inner.lock().await.analyze(actions)
    }

    /// Copy of the current dispatcher state.
    pub async fn snapshot(&self) -> GovernanceDispatcher {
        self.inner.lock().await.clone()
    }
}
