// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Transaction Balancer
//!
//! Turns a client's unbalanced transaction into one the network will
//! accept: validates its structure, fills missing proof artifacts, reserves
//! relay units covering the fee, appends relay inputs and a change output,
//! and signs the relay-controlled parts.
//!
//! Proof artifacts are fetched *before* units are reserved so the external
//! wait never overlaps a reservation; any failure after a successful
//! reservation releases it before surfacing.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::RelayError;
use crate::keys::KeyManager;
use crate::ledger::{ReservationTicket, ResourceLedger};
use crate::models::{
    BalancedTransaction, ProofHook, TokenType, TxInput, TxOutput, UnbalancedTransaction,
};
use crate::network::ProofProvider;

// =============================================================================
// Fee Policy
// =============================================================================

/// Deterministic fee schedule over transaction shape.
///
/// The estimate is a linear cost in the unbalanced transaction's inputs,
/// outputs, and proof obligations. It is intentionally simple and fully
/// documented so tests can assert exact fees: `base + inputs * per_input +
/// outputs * per_output + hooks * per_proof`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    /// Flat cost per transaction.
    pub base: u64,
    /// Cost per input.
    pub per_input: u64,
    /// Cost per output (the relay change output is not charged).
    pub per_output: u64,
    /// Cost per proof obligation.
    pub per_proof: u64,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self {
            base: 10,
            per_input: 5,
            per_output: 5,
            per_proof: 15,
        }
    }
}

impl FeePolicy {
    /// Fee estimate for an unbalanced transaction.
    pub fn estimate(&self, tx: &UnbalancedTransaction) -> u64 {
        self.base
            + tx.inputs.len() as u64 * self.per_input
            + tx.outputs.len() as u64 * self.per_output
            + tx.proof_hooks.len() as u64 * self.per_proof
    }
}

// =============================================================================
// Balancer
// =============================================================================

/// Balances and co-signs client transactions against the relay wallet.
pub struct TransactionBalancer {
    keys: Arc<KeyManager>,
    ledger: Arc<ResourceLedger>,
    proofs: Arc<dyn ProofProvider>,
    fee_policy: FeePolicy,
}

impl TransactionBalancer {
    /// Create a balancer over the given key manager, ledger, and proof
    /// provider.
    pub fn new(
        keys: Arc<KeyManager>,
        ledger: Arc<ResourceLedger>,
        proofs: Arc<dyn ProofProvider>,
        fee_policy: FeePolicy,
    ) -> Self {
        Self {
            keys,
            ledger,
            proofs,
            fee_policy,
        }
    }

    /// Balance an unbalanced transaction.
    ///
    /// Fails with `Validation` on structural problems, `ProofUnavailable`
    /// when the proof server cannot supply a required artifact, and
    /// `InsufficientFunds` when the relay pool cannot cover the fee.
    pub async fn balance(
        &self,
        tx: UnbalancedTransaction,
    ) -> Result<BalancedTransaction, RelayError> {
        validate_structure(&tx)?;

        let fee = self.fee_policy.estimate(&tx);
        debug!(
            fee,
            inputs = tx.inputs.len(),
            outputs = tx.outputs.len(),
            hooks = tx.proof_hooks.len(),
            "estimated fee"
        );

        // External wait happens before anything is reserved.
        let proof_hooks = self.fill_proof_hooks(tx.proof_hooks.clone()).await?;

        let ticket = self.ledger.reserve(fee, &TokenType::native()).await?;
        match self.assemble(&tx, proof_hooks, fee, &ticket) {
            Ok(balanced) => {
                info!(
                    ticket_id = %ticket.id,
                    fee,
                    relay_inputs = ticket.units.len(),
                    "balanced transaction"
                );
                Ok(balanced)
            }
            Err(err) => {
                self.ledger.release(ticket.id).await;
                Err(err)
            }
        }
    }

    /// Fetch artifacts for every hook that lacks one.
    async fn fill_proof_hooks(
        &self,
        mut hooks: Vec<ProofHook>,
    ) -> Result<Vec<ProofHook>, RelayError> {
        for hook in hooks.iter_mut().filter(|hook| hook.artifact.is_none()) {
            let artifact = self
                .proofs
                .prove(&hook.circuit)
                .await
                .map_err(|e| RelayError::ProofUnavailable(e.to_string()))?;
            hook.artifact = Some(artifact);
        }
        Ok(hooks)
    }

    /// Append relay inputs and change, and sign the relay-controlled parts.
    fn assemble(
        &self,
        tx: &UnbalancedTransaction,
        proof_hooks: Vec<ProofHook>,
        fee: u64,
        ticket: &ReservationTicket,
    ) -> Result<BalancedTransaction, RelayError> {
        let relay_address = self.keys.address().to_string();
        let binding = outputs_binding(&tx.outputs);

        let mut inputs = tx.inputs.clone();
        for unit in &ticket.units {
            let payload = spend_payload(&unit.unit_id, unit.value, &binding);
            inputs.push(TxInput {
                unit_id: unit.unit_id.clone(),
                value: unit.value,
                token_type: ticket.token_type.clone(),
                owner: relay_address.clone(),
                signature: Some(self.keys.sign(payload.as_bytes())),
            });
        }

        let mut outputs = tx.outputs.clone();
        let change = ticket.reserved_total.checked_sub(fee).ok_or_else(|| {
            RelayError::Internal("reservation does not cover the fee".to_string())
        })?;
        if change > 0 {
            outputs.push(TxOutput {
                value: change,
                token_type: ticket.token_type.clone(),
                receiver: relay_address,
            });
        }

        Ok(BalancedTransaction {
            inputs,
            outputs,
            proof_hooks,
            fee,
            ticket_id: ticket.id,
        })
    }
}

/// Digest binding relay spend signatures to the client's outputs.
fn outputs_binding(outputs: &[TxOutput]) -> String {
    let canonical = serde_json::to_vec(outputs).expect("outputs serialize to JSON");
    hex::encode(Sha256::digest(&canonical))
}

/// Payload a relay input signature covers.
fn spend_payload(unit_id: &str, value: u64, binding: &str) -> String {
    format!("{unit_id}:{value}:{binding}")
}

fn validate_structure(tx: &UnbalancedTransaction) -> Result<(), RelayError> {
    if tx.outputs.is_empty() {
        return Err(RelayError::validation("transaction has no outputs"));
    }
    if tx.outputs.iter().any(|output| output.value == 0) {
        return Err(RelayError::validation("output value must be non-zero"));
    }
    if tx.inputs.iter().any(|input| input.unit_id.is_empty()) {
        return Err(RelayError::validation("input is missing a unit id"));
    }
    if tx.proof_hooks.iter().any(|hook| hook.circuit.is_empty()) {
        return Err(RelayError::validation(
            "proof hook is missing a circuit name",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Seed;
    use crate::ledger::OwnedUnit;
    use crate::network::ProofError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct FixedProofs {
        fail: AtomicBool,
        calls: AtomicUsize,
    }

    impl FixedProofs {
        fn new() -> Self {
            Self {
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ProofProvider for FixedProofs {
        async fn prove(&self, circuit: &str) -> Result<String, ProofError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProofError("proof server down".to_string()));
            }
            Ok(hex::encode(format!("proof:{circuit}")))
        }
    }

    fn key_manager() -> Arc<KeyManager> {
        let seed = Seed::from_hex(&"11".repeat(64)).expect("valid seed");
        Arc::new(KeyManager::from_seed(&seed).expect("derives"))
    }

    async fn funded_ledger(values: &[(&str, u64)]) -> Arc<ResourceLedger> {
        let ledger = Arc::new(ResourceLedger::new(60_000, 0));
        let units = values
            .iter()
            .map(|(id, value)| OwnedUnit {
                unit_id: (*id).to_string(),
                value: *value,
                token_type: TokenType::native(),
            })
            .collect();
        ledger.sync(units).await;
        ledger
    }

    fn unbalanced(outputs: u64, hooks: usize) -> UnbalancedTransaction {
        UnbalancedTransaction {
            inputs: vec![TxInput {
                unit_id: "client-unit".into(),
                value: outputs,
                token_type: TokenType::native(),
                owner: "client-addr".into(),
                signature: None,
            }],
            outputs: vec![TxOutput {
                value: outputs,
                token_type: TokenType::native(),
                receiver: "recipient".into(),
            }],
            proof_hooks: (0..hooks)
                .map(|_| ProofHook {
                    circuit: "spend".into(),
                    artifact: None,
                })
                .collect(),
        }
    }

    fn balancer(
        ledger: Arc<ResourceLedger>,
        proofs: Arc<FixedProofs>,
    ) -> (TransactionBalancer, Arc<KeyManager>) {
        let keys = key_manager();
        (
            TransactionBalancer::new(
                Arc::clone(&keys),
                ledger,
                proofs,
                FeePolicy::default(),
            ),
            keys,
        )
    }

    #[test]
    fn fee_estimate_is_linear_in_shape() {
        let policy = FeePolicy::default();
        // 10 + 1 * 5 + 1 * 5 + 1 * 15
        assert_eq!(policy.estimate(&unbalanced(40, 1)), 35);
        // 10 + 1 * 5 + 1 * 5
        assert_eq!(policy.estimate(&unbalanced(40, 0)), 20);
    }

    #[tokio::test]
    async fn balances_with_relay_inputs_change_and_signatures() {
        let ledger = funded_ledger(&[("a", 100), ("b", 50), ("c", 10)]).await;
        let proofs = Arc::new(FixedProofs::new());
        let (balancer, keys) = balancer(Arc::clone(&ledger), Arc::clone(&proofs));

        // Fee: 10 + 5 + 5 + 15 = 35 → selection takes {50}, change 15.
        let balanced = balancer.balance(unbalanced(40, 1)).await.expect("balances");
        assert_eq!(balanced.fee, 35);

        let relay_inputs: Vec<&TxInput> = balanced
            .inputs
            .iter()
            .filter(|input| input.owner == keys.address())
            .collect();
        let relay_total: u64 = relay_inputs.iter().map(|input| input.value).sum();
        assert_eq!(relay_total, 50);
        assert!(relay_total >= balanced.fee);

        // Relay signatures verify against the documented payload.
        let binding = outputs_binding(&unbalanced(40, 1).outputs);
        for input in &relay_inputs {
            let payload = spend_payload(&input.unit_id, input.value, &binding);
            assert!(keys.verify(
                payload.as_bytes(),
                input.signature.as_deref().expect("relay input signed"),
            ));
        }

        let change = balanced
            .outputs
            .iter()
            .find(|output| output.receiver == keys.address())
            .expect("change output present");
        assert_eq!(change.value, 15);

        // Proof hook was filled.
        assert!(balanced.proof_hooks[0].artifact.is_some());
        assert_eq!(proofs.calls.load(Ordering::SeqCst), 1);

        // Ledger holds the reservation.
        assert_eq!(ledger.snapshot().await.reserved, 1);
    }

    #[tokio::test]
    async fn omits_change_output_when_reservation_is_exact() {
        // Fee without hooks: 10 + 5 + 5 = 20; single unit of 20 → no change.
        let ledger = funded_ledger(&[("a", 20)]).await;
        let proofs = Arc::new(FixedProofs::new());
        let (balancer, keys) = balancer(ledger, proofs);

        let balanced = balancer.balance(unbalanced(40, 0)).await.expect("balances");
        assert!(balanced
            .outputs
            .iter()
            .all(|output| output.receiver != keys.address()));
    }

    #[tokio::test]
    async fn rejects_structurally_invalid_transactions() {
        let ledger = funded_ledger(&[("a", 100)]).await;
        let proofs = Arc::new(FixedProofs::new());
        let (balancer, _) = balancer(Arc::clone(&ledger), proofs);

        let mut no_outputs = unbalanced(40, 0);
        no_outputs.outputs.clear();
        assert!(matches!(
            balancer.balance(no_outputs).await.unwrap_err(),
            RelayError::Validation(_)
        ));

        let mut zero_output = unbalanced(40, 0);
        zero_output.outputs[0].value = 0;
        assert!(matches!(
            balancer.balance(zero_output).await.unwrap_err(),
            RelayError::Validation(_)
        ));

        let mut unnamed_hook = unbalanced(40, 1);
        unnamed_hook.proof_hooks[0].circuit.clear();
        assert!(matches!(
            balancer.balance(unnamed_hook).await.unwrap_err(),
            RelayError::Validation(_)
        ));

        // Nothing was reserved along the way.
        assert_eq!(ledger.snapshot().await.reserved, 0);
    }

    #[tokio::test]
    async fn surfaces_proof_unavailable_before_reserving() {
        let ledger = funded_ledger(&[("a", 100)]).await;
        let proofs = Arc::new(FixedProofs::new());
        proofs.fail.store(true, Ordering::SeqCst);
        let (balancer, _) = balancer(Arc::clone(&ledger), proofs);

        let err = balancer.balance(unbalanced(40, 1)).await.unwrap_err();
        assert!(matches!(err, RelayError::ProofUnavailable(_)));
        assert_eq!(ledger.snapshot().await.reserved, 0);
    }

    #[tokio::test]
    async fn propagates_insufficient_funds() {
        let ledger = funded_ledger(&[("a", 5)]).await;
        let proofs = Arc::new(FixedProofs::new());
        let (balancer, _) = balancer(Arc::clone(&ledger), proofs);

        let err = balancer.balance(unbalanced(40, 0)).await.unwrap_err();
        assert!(matches!(err, RelayError::InsufficientFunds { .. }));
        assert_eq!(ledger.snapshot().await.free, 1);
    }

    #[tokio::test]
    async fn prefilled_artifacts_skip_the_proof_server() {
        let ledger = funded_ledger(&[("a", 100)]).await;
        let proofs = Arc::new(FixedProofs::new());
        let (balancer, _) = balancer(ledger, Arc::clone(&proofs));

        let mut tx = unbalanced(40, 1);
        tx.proof_hooks[0].artifact = Some("cafe".into());
        let balanced = balancer.balance(tx).await.expect("balances");

        assert_eq!(balanced.proof_hooks[0].artifact.as_deref(), Some("cafe"));
        assert_eq!(proofs.calls.load(Ordering::SeqCst), 0);
    }
}
