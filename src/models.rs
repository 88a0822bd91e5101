// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response structures for the relay API. All types derive
//! `Serialize`, `Deserialize`, and `ToSchema` for automatic JSON handling
//! and OpenAPI documentation.
//!
//! ## Transaction Shapes
//!
//! The relay sees a transaction in three stages:
//!
//! - [`UnbalancedTransaction`] - client inputs/outputs lacking fee coverage
//! - [`BalancedTransaction`] - relay inputs, change, and relay signatures
//!   added, tagged with the reservation that backs them
//! - [`FinalizedTransaction`] - fully signed by client and relay, ready for
//!   network submission

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use utoipa::ToSchema;
use uuid::Uuid;

// =============================================================================
// Token Type
// =============================================================================

/// Token type carried by an input, output, or spendable unit.
///
/// The fee token is `"native"`; bridged assets use their own identifiers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TokenType(pub String);

impl TokenType {
    /// The network's native fee token.
    pub fn native() -> Self {
        TokenType("native".to_string())
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenType {
    fn from(value: &str) -> Self {
        TokenType(value.to_string())
    }
}

impl From<String> for TokenType {
    fn from(value: String) -> Self {
        TokenType(value)
    }
}

// =============================================================================
// Transaction Pieces
// =============================================================================

/// A transaction input spending one unit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TxInput {
    /// Identifier of the unit being spent.
    pub unit_id: String,
    /// Value of the unit.
    pub value: u64,
    /// Token type of the unit.
    pub token_type: TokenType,
    /// Address that controls the unit.
    pub owner: String,
    /// Hex-encoded signature authorizing the spend. Absent until the
    /// controlling party has signed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A transaction output creating one unit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct TxOutput {
    /// Value of the new unit.
    pub value: u64,
    /// Token type of the new unit.
    pub token_type: TokenType,
    /// Address that will control the new unit.
    pub receiver: String,
}

/// A proof obligation attached to a transaction.
///
/// Each hook names the circuit whose artifact must accompany the transaction
/// for the network to accept it. The relay fills missing artifacts from the
/// proof server during balancing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct ProofHook {
    /// Circuit identifier (e.g., `"spend"`, `"output"`).
    pub circuit: String,
    /// Hex-encoded proof artifact, once produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
}

// =============================================================================
// Transaction Stages
// =============================================================================

/// A client transaction whose inputs do not yet cover outputs plus fee.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UnbalancedTransaction {
    /// Client-supplied inputs.
    pub inputs: Vec<TxInput>,
    /// Client-supplied outputs.
    pub outputs: Vec<TxOutput>,
    /// Proof obligations for this transaction.
    pub proof_hooks: Vec<ProofHook>,
}

/// A transaction the relay has balanced and co-signed.
///
/// Carries the reservation id that holds the relay units backing the added
/// inputs. The client must countersign its own inputs and submit the result
/// before the reservation expires.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct BalancedTransaction {
    /// All inputs: client inputs first, relay fee inputs appended.
    pub inputs: Vec<TxInput>,
    /// All outputs: client outputs first, relay change appended (if any).
    pub outputs: Vec<TxOutput>,
    /// Proof obligations, artifacts filled.
    pub proof_hooks: Vec<ProofHook>,
    /// Fee the relay computed and covered.
    pub fee: u64,
    /// Reservation backing the relay inputs.
    pub ticket_id: Uuid,
}

/// A fully signed transaction, ready for network submission.
///
/// Wire-compatible with [`BalancedTransaction`]: the client returns the same
/// shape with its own input signatures filled in.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct FinalizedTransaction {
    /// All inputs, each carrying a signature.
    pub inputs: Vec<TxInput>,
    /// All outputs.
    pub outputs: Vec<TxOutput>,
    /// Proof obligations with artifacts.
    pub proof_hooks: Vec<ProofHook>,
    /// Fee covered by the relay.
    pub fee: u64,
    /// Reservation backing the relay inputs.
    pub ticket_id: Uuid,
}

impl FinalizedTransaction {
    /// Stable identity of this transaction: SHA-256 over its canonical JSON
    /// encoding, hex-encoded.
    ///
    /// Byte-identical transactions always produce the same identity, which
    /// keys the submission idempotency cache.
    pub fn content_hash(&self) -> String {
        let canonical =
            serde_json::to_vec(self).expect("finalized transaction serializes to JSON");
        hex::encode(Sha256::digest(&canonical))
    }

    /// Inputs owned by the given relay address.
    pub fn relay_inputs(&self, relay_address: &str) -> Vec<&TxInput> {
        self.inputs
            .iter()
            .filter(|input| input.owner == relay_address)
            .collect()
    }
}

// =============================================================================
// Submission Result
// =============================================================================

/// Outcome of a network submission, keyed by transaction identity.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SubmissionResult {
    /// Network-assigned transaction hash.
    pub tx_hash: String,
    /// Submission status (`"submitted"`).
    pub status: String,
}
