// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Reservation Reclaimer
//!
//! Background task that sweeps the ledger for reservations past their TTL
//! and returns their units to the pool. Expiry is also applied lazily on
//! every ledger access; the sweep bounds how long an abandoned reservation
//! can sit idle between accesses.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown, the
//! same pattern as the pool resync task.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::ledger::ResourceLedger;

/// Background sweep releasing expired reservations.
pub struct TicketReclaimer {
    ledger: Arc<ResourceLedger>,
    sweep_interval: Duration,
}

impl TicketReclaimer {
    /// Create a reclaimer sweeping at a quarter of the ticket TTL (at least
    /// once per second).
    pub fn new(ledger: Arc<ResourceLedger>, ticket_ttl: Duration) -> Self {
        let sweep_interval = (ticket_ttl / 4).max(Duration::from_secs(1));
        Self {
            ledger,
            sweep_interval,
        }
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// Should be spawned as a background task:
    /// ```rust,ignore
    /// tokio::spawn(reclaimer.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            "reservation reclaimer starting"
        );

        loop {
            if shutdown.is_cancelled() {
                info!("reservation reclaimer shutting down");
                return;
            }

            let reclaimed = self.ledger.release_expired().await;
            if reclaimed > 0 {
                info!(reclaimed, "reclaimer released expired reservations");
            }

            tokio::select! {
                _ = tokio::time::sleep(self.sweep_interval) => {},
                _ = shutdown.cancelled() => {
                    info!("reservation reclaimer shutting down");
                    return;
                }
            }
        }
    }
}
