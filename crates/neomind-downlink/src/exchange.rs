//! In-flight exchange tracking.
//!
//! Each submitted request is recorded until its first completion; later
//! completions for the same exchange find nothing and are dropped.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Exchange identifier.
pub type ExchangeId = Uuid;

/// A request waiting for its response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingExchange {
    pub id: ExchangeId,
    pub endpoint: String,
    /// Request type name.
    pub kind: String,
    pub sent_at: DateTime<Utc>,
    pub timeout_ms: u64,
}

impl PendingExchange {
    pub fn elapsed(&self) -> Duration {
        Utc::now() - self.sent_at
    }
}

/// Exchanges submitted to the transport and not yet completed.
#[derive(Debug, Default)]
pub struct PendingExchanges {
    exchanges: DashMap<ExchangeId, PendingExchange>,
}

impl PendingExchanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, endpoint: &str, kind: &str, timeout_ms: u64) -> ExchangeId {
        let id = Uuid::new_v4();
        self.exchanges.insert(
            id,
            PendingExchange {
                id,
                endpoint: endpoint.to_string(),
                kind: kind.to_string(),
                sent_at: Utc::now(),
                timeout_ms,
            },
        );
        id
    }

    /// Remove the exchange. `None` means it already completed.
    pub fn complete(&self, id: &ExchangeId) -> Option<PendingExchange> {
        self.exchanges.remove(id).map(|(_, exchange)| exchange)
    }

    pub fn in_flight(&self) -> usize {
        self.exchanges.len()
    }
}
