// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay error taxonomy.
//!
//! Every fallible relay operation surfaces a [`RelayError`]. The HTTP layer
//! converts it into a JSON body carrying both a human-readable message and a
//! stable `error_code` so clients can distinguish their own mistakes
//! (`validation_error`) from relay/network conditions (`insufficient_funds`,
//! `submission_error`, ...).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the balance and submit flows.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Malformed client input. Non-retryable.
    #[error("{0}")]
    Validation(String),

    /// The relay wallet cannot cover the requested fee amount.
    #[error("insufficient relay funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount (including buffer) the selection needed to cover.
        required: u64,
        /// Total value of Free units of the requested token type.
        available: u64,
    },

    /// The proof server could not supply a required artifact. The whole
    /// balance flow is safe to retry.
    #[error("proof server unavailable: {0}")]
    ProofUnavailable(String),

    /// Network submission kept failing transiently after bounded retries.
    #[error("network unreachable after {attempts} attempts: {reason}")]
    TransientNetwork {
        /// How many submission attempts were made.
        attempts: u32,
        /// Last transport-level failure observed.
        reason: String,
    },

    /// The network permanently rejected the transaction. Terminal for this
    /// transaction; its reservation has been released.
    #[error("transaction rejected by network: {0}")]
    Submission(String),

    /// Seed or key material is unusable. Fatal at startup; the process must
    /// not begin serving.
    #[error("invalid key material: {0}")]
    Key(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    error_code: String,
}

impl RelayError {
    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            RelayError::Validation(_) => "validation_error",
            RelayError::InsufficientFunds { .. } => "insufficient_funds",
            RelayError::ProofUnavailable(_) => "proof_unavailable",
            RelayError::TransientNetwork { .. } => "transient_network_error",
            RelayError::Submission(_) => "submission_error",
            RelayError::Key(_) => "key_error",
            RelayError::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error.
    ///
    /// `Key` never reaches the HTTP layer (startup is aborted before the
    /// router exists); it maps to 500 for completeness.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation(_) => StatusCode::BAD_REQUEST,
            RelayError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
            RelayError::ProofUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RelayError::TransientNetwork { .. } => StatusCode::GATEWAY_TIMEOUT,
            RelayError::Submission(_) => StatusCode::BAD_GATEWAY,
            RelayError::Key(_) | RelayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        RelayError::Validation(message.into())
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}

/// Result alias used across the relay core.
pub type Result<T> = std::result::Result<T, RelayError>;
