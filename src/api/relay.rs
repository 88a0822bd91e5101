// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Balance and submit endpoints.

use axum::{extract::State, Json};
use tracing::debug;

use crate::error::RelayError;
use crate::models::{
    BalancedTransaction, FinalizedTransaction, SubmissionResult, UnbalancedTransaction,
};
use crate::state::AppState;

/// Balance an unbalanced transaction against the relay wallet.
///
/// The response carries the relay inputs, change output, relay signatures,
/// and the reservation id the client must submit against before it expires.
#[utoipa::path(
    post,
    path = "/balance-tx",
    request_body = UnbalancedTransaction,
    tag = "Relay",
    responses(
        (status = 200, description = "Balanced and relay-signed transaction", body = BalancedTransaction),
        (status = 400, description = "Malformed transaction"),
        (status = 402, description = "Relay funds exhausted"),
        (status = 503, description = "Proof server unavailable")
    )
)]
pub async fn balance_tx(
    State(state): State<AppState>,
    Json(request): Json<UnbalancedTransaction>,
) -> Result<Json<BalancedTransaction>, RelayError> {
    debug!(
        inputs = request.inputs.len(),
        outputs = request.outputs.len(),
        "balance requested"
    );
    let balanced = state.balancer.balance(request).await?;
    Ok(Json(balanced))
}

/// Submit a finalized transaction to the network.
///
/// Identical transactions return the stored result without a second network
/// submission.
#[utoipa::path(
    post,
    path = "/submit-tx",
    request_body = FinalizedTransaction,
    tag = "Relay",
    responses(
        (status = 200, description = "Transaction accepted by the network", body = SubmissionResult),
        (status = 400, description = "Malformed transaction or invalid reservation"),
        (status = 502, description = "Network rejected the transaction"),
        (status = 504, description = "Network unreachable after retries")
    )
)]
pub async fn submit_tx(
    State(state): State<AppState>,
    Json(request): Json<FinalizedTransaction>,
) -> Result<Json<SubmissionResult>, RelayError> {
    debug!(ticket_id = %request.ticket_id, "submission requested");
    let result = state.coordinator.submit(request).await?;
    Ok(Json(result))
}
