// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTP client for the external proof server.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{ProofError, ProofProvider};

/// Proof server client over JSON HTTP.
pub struct HttpProofProvider {
    http: reqwest::Client,
    base_url: Url,
}

#[derive(Debug, Serialize)]
struct ProveRequest<'a> {
    circuit: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProveResponse {
    artifact: String,
}

impl HttpProofProvider {
    /// Create a client against the given proof server endpoint.
    pub fn new(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }
}

#[async_trait]
impl ProofProvider for HttpProofProvider {
    async fn prove(&self, circuit: &str) -> Result<String, ProofError> {
        let url = self
            .base_url
            .join("prove")
            .map_err(|e| ProofError(format!("invalid proof server URL: {e}")))?;
        debug!(%url, circuit, "requesting proof artifact");

        let response = self
            .http
            .post(url)
            .json(&ProveRequest { circuit })
            .send()
            .await
            .map_err(|e| ProofError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProofError(format!(
                "proof server returned {}",
                response.status()
            )));
        }

        let body: ProveResponse = response
            .json()
            .await
            .map_err(|e| ProofError(format!("malformed proof server response: {e}")))?;
        Ok(body.artifact)
    }
}
