// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::balancer::TransactionBalancer;
use crate::coordinator::SubmissionCoordinator;
use crate::ledger::ResourceLedger;

/// Shared handles the HTTP handlers operate on.
#[derive(Clone)]
pub struct AppState {
    pub balancer: Arc<TransactionBalancer>,
    pub coordinator: Arc<SubmissionCoordinator>,
    pub ledger: Arc<ResourceLedger>,
    /// Hex-encoded relay address, reported by health checks.
    pub relay_address: String,
}

impl AppState {
    pub fn new(
        balancer: Arc<TransactionBalancer>,
        coordinator: Arc<SubmissionCoordinator>,
        ledger: Arc<ResourceLedger>,
        relay_address: String,
    ) -> Self {
        Self {
            balancer,
            coordinator,
            ledger,
            relay_address,
        }
    }
}
