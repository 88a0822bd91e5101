// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Pool Resync
//!
//! Background task that periodically reconciles the in-memory unit pool
//! against the indexer's view of the relay wallet. New funding appears as
//! Free units; units the network no longer reports are archived. This is
//! the only persistence the relay needs; the pool is rebuilt from the
//! network on every start.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::ledger::ResourceLedger;
use crate::network::NodeClient;

/// Background reconciliation of the unit pool against the indexer.
pub struct PoolResync {
    ledger: Arc<ResourceLedger>,
    node: Arc<dyn NodeClient>,
    relay_address: String,
    interval: Duration,
}

impl PoolResync {
    /// Create a resync task for the given relay address.
    pub fn new(
        ledger: Arc<ResourceLedger>,
        node: Arc<dyn NodeClient>,
        relay_address: String,
        interval: Duration,
    ) -> Self {
        Self {
            ledger,
            node,
            relay_address,
            interval,
        }
    }

    /// Run the resync loop until the cancellation token is triggered.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "pool resync starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("pool resync shutting down");
                return;
            }

            self.resync_step().await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("pool resync shutting down");
                    return;
                }
            }
        }
    }

    /// One reconciliation sweep. Indexer failures are logged and retried on
    /// the next tick; the pool keeps serving from its last known view.
    async fn resync_step(&self) {
        match self.node.owned_units(&self.relay_address).await {
            Ok(units) => {
                let summary = self.ledger.sync(units).await;
                if summary.added > 0 || summary.archived > 0 {
                    info!(
                        added = summary.added,
                        archived = summary.archived,
                        "pool resync applied"
                    );
                }
            }
            Err(e) => {
                warn!(error = %e, "pool resync failed; keeping last known view");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::OwnedUnit;
    use crate::models::{FinalizedTransaction, TokenType};
    use crate::network::NodeError;
    use async_trait::async_trait;

    struct OneUnitNode;

    #[async_trait]
    impl NodeClient for OneUnitNode {
        async fn submit_transaction(
            &self,
            _tx: &FinalizedTransaction,
        ) -> Result<String, NodeError> {
            Err(NodeError::Rejected("not used".to_string()))
        }

        async fn owned_units(&self, _address: &str) -> Result<Vec<OwnedUnit>, NodeError> {
            Ok(vec![OwnedUnit {
                unit_id: "funded".into(),
                value: 100,
                token_type: TokenType::native(),
            }])
        }
    }

    struct FailingNode;

    #[async_trait]
    impl NodeClient for FailingNode {
        async fn submit_transaction(
            &self,
            _tx: &FinalizedTransaction,
        ) -> Result<String, NodeError> {
            Err(NodeError::Rejected("not used".to_string()))
        }

        async fn owned_units(&self, _address: &str) -> Result<Vec<OwnedUnit>, NodeError> {
            Err(NodeError::Transient("indexer down".to_string()))
        }
    }

    #[tokio::test]
    async fn resync_step_populates_the_pool() {
        let ledger = Arc::new(ResourceLedger::new(60_000, 0));
        let resync = PoolResync::new(
            Arc::clone(&ledger),
            Arc::new(OneUnitNode),
            "relay-addr".to_string(),
            Duration::from_secs(30),
        );

        resync.resync_step().await;

        assert!(ledger.is_synced());
        assert_eq!(ledger.snapshot().await.free, 1);
    }

    #[tokio::test]
    async fn failed_resync_keeps_pool_unsynced() {
        let ledger = Arc::new(ResourceLedger::new(60_000, 0));
        let resync = PoolResync::new(
            Arc::clone(&ledger),
            Arc::new(FailingNode),
            "relay-addr".to_string(),
            Duration::from_secs(30),
        );

        resync.resync_step().await;

        assert!(!ledger.is_synced());
        assert_eq!(ledger.snapshot().await.free, 0);
    }
}
