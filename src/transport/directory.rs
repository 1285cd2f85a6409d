use crate::agent::AgentId;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A required capability had no provider after every lookup attempt
#[derive(Debug, Clone, PartialEq)]
pub struct LookupFailure {
    pub capability: String,
    pub attempts: u32,
}

impl fmt::Display for LookupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no agent offers '{}' after {} attempt(s)",
            self.capability, self.attempts
        )
    }
}

impl std::error::Error for LookupFailure {}

/// How long a caller keeps retrying a capability lookup
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookupPolicy {
    pub backoff: Duration,
    pub attempts: u32,
}

impl Default for LookupPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_millis(100),
            attempts: 50,
        }
    }
}

/// Directory of agents by offered capability (yellow pages).
#[derive(Clone, Default)]
pub struct Directory {
    /// capability -> providers in registration order
    entries: Arc<DashMap<String, Vec<AgentId>>>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    /// Returns false if `id` already offered `capability`.
    pub fn register_capability(&self, id: &AgentId, capability: &str) -> bool {
        let mut providers = self.entries.entry(capability.to_string()).or_default();
        if providers.contains(id) {
            return false;
        }
        providers.push(id.clone());
        true
    }

    pub fn deregister_capability(&self, id: &AgentId, capability: &str) -> bool {
        let Some(mut providers) = self.entries.get_mut(capability) else {
            return false;
        };
        let before = providers.len();
        providers.retain(|p| p != id);
        before != providers.len()
    }

    /// Withdraw every capability `id` offers.
    pub fn deregister_all(&self, id: &AgentId) {
        for mut providers in self.entries.iter_mut() {
            providers.retain(|p| p != id);
        }
    }

    pub fn lookup(&self, capability: &str) -> Vec<AgentId> {
        self.entries
            .get(capability)
            .map(|providers| providers.clone())
            .unwrap_or_default()
    }

    /// Look a capability up, retrying after a fixed `backoff` while nobody offers it.
    pub async fn lookup_with_retry(
        &self,
        capability: &str,
        backoff: Duration,
        attempts: u32,
    ) -> Result<Vec<AgentId>, LookupFailure> {
        let attempts = attempts.max(1);

        for attempt in 1..=attempts {
            let providers = self.lookup(capability);
            if !providers.is_empty() {
                return Ok(providers);
            }
            debug!(capability = %capability, attempt = attempt, "Capability not offered yet");
            if attempt < attempts {
                tokio::time::sleep(backoff).await;
            }
        }

        Err(LookupFailure {
            capability: capability.to_string(),
            attempts,
        })
    }

    pub async fn resolve(
        &self,
        capability: &str,
        policy: LookupPolicy,
    ) -> Result<Vec<AgentId>, LookupFailure> {
        self.lookup_with_retry(capability, policy.backoff, policy.attempts)
            .await
    }
}
