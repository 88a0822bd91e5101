// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Submission Coordinator
//!
//! Final stage of the relay flow: validates that a finalized transaction
//! still holds its reservation, submits it to the network, and settles the
//! reservation: commit on success, release on permanent rejection.
//!
//! ## Idempotence
//!
//! Results are stored under the transaction's content hash. A resubmission
//! of a byte-identical transaction returns the stored result without
//! touching the network, and concurrent identical submissions serialize on
//! a per-identity gate so at most one network submission ever happens.
//!
//! ## Request lifecycle
//!
//! `Received → Balancing → AwaitingClientSignature → Submitting →
//! {Committed | Released}`. A transient network failure leaves the ticket
//! active so the client may resubmit; ticket TTL expiry reclaims anything
//! abandoned.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::ledger::{ResourceLedger, TicketState};
use crate::models::{FinalizedTransaction, SubmissionResult};
use crate::network::{NodeClient, NodeError};

/// How many settled submission results are retained for idempotent replays.
const RESULT_CACHE_CAPACITY: usize = 10_000;

// =============================================================================
// Retry Policy
// =============================================================================

/// Bounded exponential backoff for transient submission failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum submission attempts (first try included).
    pub attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after the given (1-based) failed attempt.
    fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// Submits finalized transactions and settles their reservations.
pub struct SubmissionCoordinator {
    ledger: Arc<ResourceLedger>,
    node: Arc<dyn NodeClient>,
    relay_address: String,
    retry: RetryPolicy,
    results: Mutex<LruCache<String, SubmissionResult>>,
    gates: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SubmissionCoordinator {
    /// Create a coordinator for the given ledger, node, and relay address.
    pub fn new(
        ledger: Arc<ResourceLedger>,
        node: Arc<dyn NodeClient>,
        relay_address: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            ledger,
            node,
            relay_address,
            retry,
            results: Mutex::new(LruCache::new(
                NonZeroUsize::new(RESULT_CACHE_CAPACITY).expect("capacity is non-zero"),
            )),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Submit a finalized transaction.
    ///
    /// Identical transactions (by content hash) return the stored result
    /// without a second network submission. Otherwise the embedded ticket is
    /// validated, the transaction submitted with bounded retries, and the
    /// ticket committed or released according to the outcome.
    pub async fn submit(
        &self,
        tx: FinalizedTransaction,
    ) -> Result<SubmissionResult, RelayError> {
        let identity = tx.content_hash();

        let gate = {
            let mut gates = self.gates.lock().await;
            Arc::clone(gates.entry(identity.clone()).or_default())
        };
        let _guard = gate.lock().await;

        if let Some(result) = self.results.lock().await.get(&identity) {
            info!(identity = %identity, tx_hash = %result.tx_hash, "replayed stored submission result");
            return Ok(result.clone());
        }

        let outcome = self.submit_fresh(&tx, &identity).await;

        // Drop the gate entry once no other submitter holds it.
        let mut gates = self.gates.lock().await;
        if Arc::strong_count(&gate) <= 2 {
            gates.remove(&identity);
        }
        outcome
    }

    async fn submit_fresh(
        &self,
        tx: &FinalizedTransaction,
        identity: &str,
    ) -> Result<SubmissionResult, RelayError> {
        self.validate_reservation(tx).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.node.submit_transaction(tx).await {
                Ok(tx_hash) => {
                    if let Err(err) = self.ledger.commit(tx.ticket_id).await {
                        // The ticket expired mid-submission: the transaction
                        // is on the network but its units went back to Free.
                        // Later double-spends are caught by the node.
                        warn!(
                            ticket_id = %tx.ticket_id,
                            error = %err,
                            "submitted transaction but could not commit its reservation"
                        );
                    }
                    let result = SubmissionResult {
                        tx_hash,
                        status: "submitted".to_string(),
                    };
                    self.results
                        .lock()
                        .await
                        .put(identity.to_string(), result.clone());
                    info!(
                        identity = %identity,
                        tx_hash = %result.tx_hash,
                        attempt,
                        "transaction submitted"
                    );
                    return Ok(result);
                }
                Err(NodeError::Rejected(reason)) => {
                    warn!(
                        ticket_id = %tx.ticket_id,
                        reason = %reason,
                        "network rejected transaction; releasing reservation"
                    );
                    self.ledger.release(tx.ticket_id).await;
                    return Err(RelayError::Submission(reason));
                }
                Err(NodeError::Transient(reason)) => {
                    if attempt >= self.retry.attempts {
                        // The ticket stays active: the client may resubmit
                        // until TTL expiry reclaims it.
                        return Err(RelayError::TransientNetwork {
                            attempts: attempt,
                            reason,
                        });
                    }
                    let delay = self.retry.delay_after(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "transient submission failure; backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// The embedded ticket must be active, unexpired, and hold exactly the
    /// units the transaction spends as relay inputs.
    async fn validate_reservation(&self, tx: &FinalizedTransaction) -> Result<(), RelayError> {
        let Some(ticket) = self.ledger.ticket(tx.ticket_id).await else {
            return Err(RelayError::validation(format!(
                "unknown reservation {}",
                tx.ticket_id
            )));
        };

        match ticket.state {
            TicketState::Active => {}
            TicketState::Committed => {
                return Err(RelayError::validation(
                    "reservation was already committed",
                ));
            }
            TicketState::Released => {
                return Err(RelayError::validation(
                    "reservation expired or was released",
                ));
            }
        }

        let mut held = ticket.unit_ids();
        held.sort();
        let mut spent: Vec<String> = tx
            .relay_inputs(&self.relay_address)
            .iter()
            .map(|input| input.unit_id.clone())
            .collect();
        spent.sort();

        if held != spent {
            // The client tampered with the relay inputs; free the units
            // rather than stranding them until TTL expiry.
            self.ledger.release(tx.ticket_id).await;
            return Err(RelayError::validation(
                "relay inputs do not match the reservation",
            ));
        }

        Ok(())
    }
}
