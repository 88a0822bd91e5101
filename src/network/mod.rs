// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! External collaborators: the ledger node/indexer and the proof server.
//!
//! Both are reached over HTTP and sit behind trait seams so the core flows
//! can be exercised against in-memory doubles. Transport errors are
//! classified here as transient (retryable) or permanent rejection, and
//! the retry policy itself lives with the submission coordinator.

pub mod node;
pub mod proof;

use async_trait::async_trait;
use thiserror::Error;

use crate::ledger::OwnedUnit;
use crate::models::FinalizedTransaction;

pub use node::HttpNodeClient;
pub use proof::HttpProofProvider;

/// Failure submitting to or querying the network.
#[derive(Debug, Error)]
pub enum NodeError {
    /// Transport-level or server-side failure; safe to retry.
    #[error("transient network failure: {0}")]
    Transient(String),

    /// The network rejected the request permanently (bad signature,
    /// double-spend, already confirmed, ...). Not retryable.
    #[error("rejected by network: {0}")]
    Rejected(String),
}

/// Failure obtaining a proof artifact.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ProofError(pub String);

/// Port to the ledger node and indexer.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Submit a finalized transaction; returns the network tx hash.
    async fn submit_transaction(&self, tx: &FinalizedTransaction) -> Result<String, NodeError>;

    /// The units currently owned by `address`, per the indexer.
    async fn owned_units(&self, address: &str) -> Result<Vec<OwnedUnit>, NodeError>;
}

/// Port to the proof server.
#[async_trait]
pub trait ProofProvider: Send + Sync {
    /// Produce the artifact for the named circuit; returns it hex-encoded.
    async fn prove(&self, circuit: &str) -> Result<String, ProofError>;
}
