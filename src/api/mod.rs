// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    models::{
        BalancedTransaction, FinalizedTransaction, ProofHook, SubmissionResult, TokenType,
        TxInput, TxOutput, UnbalancedTransaction,
    },
    state::AppState,
};

pub mod health;
pub mod relay;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/balance-tx", post(relay::balance_tx))
        .route("/submit-tx", post(relay::submit_tx))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        relay::balance_tx,
        relay::submit_tx,
        health::health,
        health::liveness,
        health::readiness
    ),
    components(
        schemas(
            UnbalancedTransaction,
            BalancedTransaction,
            FinalizedTransaction,
            SubmissionResult,
            TxInput,
            TxOutput,
            ProofHook,
            TokenType,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Relay", description = "Transaction balancing and submission"),
        (name = "Health", description = "Service health probes")
    )
)]
struct ApiDoc;
