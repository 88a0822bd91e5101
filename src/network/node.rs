// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the ledger node and indexer.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{NodeClient, NodeError};
use crate::ledger::OwnedUnit;
use crate::models::FinalizedTransaction;

/// Node/indexer client over JSON HTTP.
pub struct HttpNodeClient {
    http: reqwest::Client,
    node_url: Url,
    indexer_url: Url,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct UnitsResponse {
    units: Vec<OwnedUnit>,
}

#[derive(Debug, Deserialize)]
struct NodeErrorBody {
    error: String,
}

impl HttpNodeClient {
    /// Create a client against the given node and indexer endpoints.
    ///
    /// The `reqwest::Client` is expected to carry the configured request
    /// timeout; retry policy belongs to the caller.
    pub fn new(http: reqwest::Client, node_url: Url, indexer_url: Url) -> Self {
        Self {
            http,
            node_url,
            indexer_url,
        }
    }

    fn endpoint(base: &Url, path: &str) -> Result<Url, NodeError> {
        base.join(path)
            .map_err(|e| NodeError::Transient(format!("invalid endpoint {path}: {e}")))
    }
}

/// Map a non-success response to a [`NodeError`].
///
/// 4xx means the network evaluated and refused the request, so it is permanent.
/// Everything else (5xx, transport failures) is transient.
async fn classify_response(response: reqwest::Response) -> NodeError {
    let status = response.status();
    let reason = match response.json::<NodeErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    };

    if status.is_client_error() {
        NodeError::Rejected(reason)
    } else {
        NodeError::Transient(format!("{status}: {reason}"))
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn submit_transaction(&self, tx: &FinalizedTransaction) -> Result<String, NodeError> {
        let url = Self::endpoint(&self.node_url, "tx")?;
        debug!(%url, "submitting transaction to node");

        let response = self
            .http
            .post(url)
            .json(tx)
            .send()
            .await
            .map_err(|e| NodeError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(classify_response(response).await);
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| NodeError::Transient(format!("malformed node response: {e}")))?;
        Ok(body.tx_hash)
    }

    async fn owned_units(&self, address: &str) -> Result<Vec<OwnedUnit>, NodeError> {
        let url = Self::endpoint(&self.indexer_url, &format!("wallet/{address}/units"))?;
        debug!(%url, "querying owned units from indexer");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| NodeError::Transient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(classify_response(response).await);
        }

        let body: UnitsResponse = response
            .json()
            .await
            .map_err(|e| NodeError::Transient(format!("malformed indexer response: {e}")))?;
        Ok(body.units)
    }
}
