// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Resource Ledger
//!
//! In-memory pool of the relay wallet's spendable fee/dust units and their
//! reservation state. This is the single shared mutable resource of the
//! service: `reserve`, `release`, `commit`, and `sync` serialize behind one
//! mutex guarding only selection and state transitions, never external I/O.
//!
//! ## Unit Lifecycle
//!
//! Units enter the pool `Free` when a resync observes relay funding, move
//! `Free → Reserved` under a ticket, and `Reserved → Spent` on commit. Spent
//! units are archived (dropped) once the network stops reporting them.
//!
//! ## Reservations
//!
//! Every ticket carries a TTL. An uncommitted ticket past its TTL is
//! released automatically, lazily on the next ledger access and eagerly by
//! the background reclaimer, returning its units to `Free`. This bounds
//! pool starvation from abandoned client flows. Time is read through an
//! injectable clock so tests can advance it deterministically.

mod selection;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RelayError;
use crate::models::TokenType;
use selection::{select_covering, Candidate};

/// Milliseconds since the Unix epoch, injectable for tests.
pub type ClockFn = Box<dyn Fn() -> u64 + Send + Sync>;

fn system_clock() -> u64 {
    Utc::now().timestamp_millis() as u64
}

// =============================================================================
// Domain Types
// =============================================================================

/// Reservation state of a spendable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Available for reservation.
    Free,
    /// Held by exactly one active ticket.
    Reserved,
    /// Consumed by a committed ticket; awaiting archival.
    Spent,
}

/// One spendable unit of the relay wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendableUnit {
    /// Network-assigned unit identifier.
    pub id: String,
    /// Denomination.
    pub value: u64,
    /// Token type.
    pub token_type: TokenType,
    /// Current reservation state.
    pub state: UnitState,
}

/// A unit as reported by the indexer during resync.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnedUnit {
    /// Network-assigned unit identifier.
    pub unit_id: String,
    /// Denomination.
    pub value: u64,
    /// Token type.
    pub token_type: TokenType,
}

/// Terminal and live states of a reservation ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    /// Units are held; the ticket may be committed or released.
    Active,
    /// Units were spent; the ticket is inert.
    Committed,
    /// Units returned to the pool; the ticket is inert.
    Released,
}

/// A unit held under a ticket: id and denomination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedUnit {
    /// Network-assigned unit identifier.
    pub unit_id: String,
    /// Denomination.
    pub value: u64,
}

/// A temporary exclusive claim on specific spendable units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservationTicket {
    /// Ticket identifier, referenced by balanced transactions.
    pub id: Uuid,
    /// Units held under this ticket.
    pub units: Vec<ReservedUnit>,
    /// Token type of the held units.
    pub token_type: TokenType,
    /// Total value held.
    pub reserved_total: u64,
    /// Expiry, milliseconds since the Unix epoch.
    pub expires_at_ms: u64,
    /// Current ticket state.
    pub state: TicketState,
}

impl ReservationTicket {
    /// Ids of the units held under this ticket.
    pub fn unit_ids(&self) -> Vec<String> {
        self.units.iter().map(|unit| unit.unit_id.clone()).collect()
    }
}

/// Counts reported by [`ResourceLedger::snapshot`] for health reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Units available for reservation.
    pub free: usize,
    /// Units held by active tickets.
    pub reserved: usize,
    /// Units committed and awaiting archival.
    pub spent: usize,
    /// Total free value of the native fee token.
    pub free_native_value: u64,
}

/// Outcome of a pool resync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    /// Newly observed units added as Free.
    pub added: usize,
    /// Units dropped because the network no longer reports them.
    pub archived: usize,
}

struct PoolState {
    units: HashMap<String, SpendableUnit>,
    tickets: HashMap<Uuid, ReservationTicket>,
}

// =============================================================================
// Ledger
// =============================================================================

/// The relay's unit pool and reservation book.
pub struct ResourceLedger {
    state: Mutex<PoolState>,
    ttl_ms: u64,
    reserve_buffer: u64,
    clock: ClockFn,
    synced: AtomicBool,
}

impl ResourceLedger {
    /// Create an empty ledger.
    ///
    /// `ttl_ms` bounds how long an uncommitted reservation may hold units;
    /// `reserve_buffer` is added to every reservation amount to absorb fee
    /// estimation error.
    pub fn new(ttl_ms: u64, reserve_buffer: u64) -> Self {
        Self {
            state: Mutex::new(PoolState {
                units: HashMap::new(),
                tickets: HashMap::new(),
            }),
            ttl_ms,
            reserve_buffer,
            clock: Box::new(system_clock),
            synced: AtomicBool::new(false),
        }
    }

    /// Replace the clock (for tests).
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        self.clock = Box::new(clock);
        self
    }

    /// Whether an initial resync has populated the pool.
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }

    /// Reserve units covering `amount` (plus the configured buffer) of the
    /// given token type.
    ///
    /// Fails with [`RelayError::InsufficientFunds`] when no covering set of
    /// Free units exists; failure leaves the pool untouched.
    pub async fn reserve(
        &self,
        amount: u64,
        token_type: &TokenType,
    ) -> Result<ReservationTicket, RelayError> {
        let mut state = self.state.lock().await;
        let now = (self.clock)();
        Self::release_expired_locked(&mut state, now);

        let target = amount + self.reserve_buffer;
        let candidates: Vec<Candidate> = state
            .units
            .values()
            .filter(|unit| unit.state == UnitState::Free && &unit.token_type == token_type)
            .map(|unit| Candidate {
                id: unit.id.clone(),
                value: unit.value,
            })
            .collect();

        let available: u64 = candidates.iter().map(|c| c.value).sum();
        let Some(selected) = select_covering(&candidates, target) else {
            debug!(
                required = target,
                available,
                token = %token_type,
                "reservation failed: pool cannot cover amount"
            );
            return Err(RelayError::InsufficientFunds {
                required: target,
                available,
            });
        };

        let mut reserved_total = 0;
        let mut units = Vec::with_capacity(selected.len());
        for unit_id in &selected {
            let unit = state
                .units
                .get_mut(unit_id)
                .expect("selected unit exists in pool");
            unit.state = UnitState::Reserved;
            reserved_total += unit.value;
            units.push(ReservedUnit {
                unit_id: unit.id.clone(),
                value: unit.value,
            });
        }

        let ticket = ReservationTicket {
            id: Uuid::new_v4(),
            units,
            token_type: token_type.clone(),
            reserved_total,
            expires_at_ms: now + self.ttl_ms,
            state: TicketState::Active,
        };
        state.tickets.insert(ticket.id, ticket.clone());

        info!(
            ticket_id = %ticket.id,
            units = ticket.units.len(),
            reserved_total,
            expires_at_ms = ticket.expires_at_ms,
            "reserved units"
        );
        Ok(ticket)
    }

    /// Release a ticket, returning its units to Free.
    ///
    /// Idempotent: releasing an already-released, committed, or unknown
    /// ticket is a no-op.
    pub async fn release(&self, ticket_id: Uuid) {
        let mut state = self.state.lock().await;
        let now = (self.clock)();
        Self::release_expired_locked(&mut state, now);
        Self::release_locked(&mut state, ticket_id);
    }

    /// Commit a ticket, marking all its units Spent.
    ///
    /// The ticket becomes inert afterward: it can be neither released (a
    /// no-op) nor committed again. Committing an expired, released, or
    /// unknown ticket fails without touching the pool.
    pub async fn commit(&self, ticket_id: Uuid) -> Result<(), RelayError> {
        let mut state = self.state.lock().await;
        let now = (self.clock)();
        Self::release_expired_locked(&mut state, now);

        let ticket = state.tickets.get_mut(&ticket_id).ok_or_else(|| {
            RelayError::validation(format!("unknown reservation {ticket_id}"))
        })?;

        match ticket.state {
            TicketState::Active => {}
            TicketState::Committed => {
                return Err(RelayError::validation(format!(
                    "reservation {ticket_id} already committed"
                )));
            }
            TicketState::Released => {
                return Err(RelayError::validation(format!(
                    "reservation {ticket_id} expired or was released"
                )));
            }
        }

        ticket.state = TicketState::Committed;
        let unit_ids = ticket.unit_ids();
        for unit_id in &unit_ids {
            if let Some(unit) = state.units.get_mut(unit_id) {
                unit.state = UnitState::Spent;
            }
        }

        info!(ticket_id = %ticket_id, units = unit_ids.len(), "committed reservation");
        Ok(())
    }

    /// Look up a ticket's current view, after lazy expiry.
    pub async fn ticket(&self, ticket_id: Uuid) -> Option<ReservationTicket> {
        let mut state = self.state.lock().await;
        let now = (self.clock)();
        Self::release_expired_locked(&mut state, now);
        state.tickets.get(&ticket_id).cloned()
    }

    /// Release every active ticket past its TTL; returns how many.
    pub async fn release_expired(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = (self.clock)();
        Self::release_expired_locked(&mut state, now)
    }

    /// Reconcile the pool against the network's view of the relay wallet.
    ///
    /// Newly reported units join as Free. Units the network no longer
    /// reports are archived (dropped) unless they are Reserved by an active
    /// ticket; in-flight reservations are never disturbed by a resync.
    pub async fn sync(&self, network_units: Vec<OwnedUnit>) -> SyncSummary {
        let mut state = self.state.lock().await;
        let now = (self.clock)();
        Self::release_expired_locked(&mut state, now);

        let mut added = 0;
        let reported: HashMap<&str, &OwnedUnit> = network_units
            .iter()
            .map(|unit| (unit.unit_id.as_str(), unit))
            .collect();

        for unit in &network_units {
            if !state.units.contains_key(&unit.unit_id) {
                state.units.insert(
                    unit.unit_id.clone(),
                    SpendableUnit {
                        id: unit.unit_id.clone(),
                        value: unit.value,
                        token_type: unit.token_type.clone(),
                        state: UnitState::Free,
                    },
                );
                added += 1;
            }
        }

        let stale: Vec<String> = state
            .units
            .values()
            .filter(|unit| {
                unit.state != UnitState::Reserved && !reported.contains_key(unit.id.as_str())
            })
            .map(|unit| unit.id.clone())
            .collect();
        let archived = stale.len();
        for unit_id in stale {
            state.units.remove(&unit_id);
        }

        self.synced.store(true, Ordering::Relaxed);
        if added > 0 || archived > 0 {
            info!(added, archived, "pool resynced");
        }
        SyncSummary { added, archived }
    }

    /// Counts for health reporting.
    pub async fn snapshot(&self) -> PoolSnapshot {
        let state = self.state.lock().await;
        let native = TokenType::native();
        let mut snapshot = PoolSnapshot {
            free: 0,
            reserved: 0,
            spent: 0,
            free_native_value: 0,
        };
        for unit in state.units.values() {
            match unit.state {
                UnitState::Free => {
                    snapshot.free += 1;
                    if unit.token_type == native {
                        snapshot.free_native_value += unit.value;
                    }
                }
                UnitState::Reserved => snapshot.reserved += 1,
                UnitState::Spent => snapshot.spent += 1,
            }
        }
        snapshot
    }

    fn release_locked(state: &mut PoolState, ticket_id: Uuid) {
        let Some(ticket) = state.tickets.get_mut(&ticket_id) else {
            return;
        };
        if ticket.state != TicketState::Active {
            return;
        }
        ticket.state = TicketState::Released;
        let unit_ids = ticket.unit_ids();
        for unit_id in &unit_ids {
            if let Some(unit) = state.units.get_mut(unit_id) {
                unit.state = UnitState::Free;
            }
        }
        debug!(ticket_id = %ticket_id, units = unit_ids.len(), "released reservation");
    }

    fn release_expired_locked(state: &mut PoolState, now: u64) -> usize {
        let expired: Vec<Uuid> = state
            .tickets
            .values()
            .filter(|ticket| ticket.state == TicketState::Active && now >= ticket.expires_at_ms)
            .map(|ticket| ticket.id)
            .collect();

        let count = expired.len();
        for ticket_id in expired {
            Self::release_locked(state, ticket_id);
        }
        if count > 0 {
            warn!(count, "reclaimed expired reservations");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    fn native_units(values: &[(&str, u64)]) -> Vec<OwnedUnit> {
        values
            .iter()
            .map(|(id, value)| OwnedUnit {
                unit_id: (*id).to_string(),
                value: *value,
                token_type: TokenType::native(),
            })
            .collect()
    }

    async fn funded_ledger(ttl_ms: u64, values: &[(&str, u64)]) -> ResourceLedger {
        let ledger = ResourceLedger::new(ttl_ms, 0);
        ledger.sync(native_units(values)).await;
        ledger
    }

    #[tokio::test]
    async fn reserve_commit_scenario() {
        // Pool [100, 50, 10]: a fee of 60 takes {50, 10}, commit leaves
        // {100} free, and a following 150 request cannot be covered.
        let ledger = funded_ledger(60_000, &[("a", 100), ("b", 50), ("c", 10)]).await;

        let ticket = ledger.reserve(60, &TokenType::native()).await.expect("covered");
        assert_eq!(ticket.reserved_total, 60);
        let mut held = ticket.unit_ids();
        held.sort();
        assert_eq!(held, vec!["b", "c"]);

        ledger.commit(ticket.id).await.expect("commits");
        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.free, 1);
        assert_eq!(snapshot.free_native_value, 100);
        assert_eq!(snapshot.spent, 2);

        let err = ledger.reserve(150, &TokenType::native()).await.unwrap_err();
        match err {
            RelayError::InsufficientFunds {
                required,
                available,
            } => {
                assert_eq!(required, 150);
                assert_eq!(available, 100);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_reserve_has_no_side_effect() {
        let ledger = funded_ledger(60_000, &[("a", 100)]).await;
        let before = ledger.snapshot().await;

        ledger
            .reserve(500, &TokenType::native())
            .await
            .expect_err("cannot cover");

        assert_eq!(ledger.snapshot().await, before);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let ledger = funded_ledger(60_000, &[("a", 100)]).await;
        let ticket = ledger.reserve(80, &TokenType::native()).await.expect("covered");

        ledger.release(ticket.id).await;
        let after_first = ledger.snapshot().await;
        assert_eq!(after_first.free, 1);

        ledger.release(ticket.id).await;
        assert_eq!(ledger.snapshot().await, after_first);

        // Unknown ticket is also a no-op.
        ledger.release(Uuid::new_v4()).await;
        assert_eq!(ledger.snapshot().await, after_first);
    }

    #[tokio::test]
    async fn committed_ticket_is_inert() {
        let ledger = funded_ledger(60_000, &[("a", 100)]).await;
        let ticket = ledger.reserve(80, &TokenType::native()).await.expect("covered");

        ledger.commit(ticket.id).await.expect("commits");
        assert!(ledger.commit(ticket.id).await.is_err());

        // Release after commit is a no-op; units stay Spent.
        ledger.release(ticket.id).await;
        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.spent, 1);
        assert_eq!(snapshot.free, 0);
    }

    #[tokio::test]
    async fn ttl_expiry_returns_units_to_free() {
        let now = Arc::new(AtomicU64::new(1_000));
        let clock = Arc::clone(&now);
        let ledger = ResourceLedger::new(5_000, 0)
            .with_clock(move || clock.load(Ordering::Relaxed));
        ledger.sync(native_units(&[("a", 100)])).await;

        let ticket = ledger.reserve(80, &TokenType::native()).await.expect("covered");
        assert_eq!(ledger.snapshot().await.reserved, 1);

        // Advance past the TTL; the sweep reclaims the ticket.
        now.store(6_001, Ordering::Relaxed);
        assert_eq!(ledger.release_expired().await, 1);
        assert_eq!(ledger.snapshot().await.free, 1);

        // The expired ticket can no longer be committed.
        assert!(ledger.commit(ticket.id).await.is_err());
        assert_eq!(
            ledger.ticket(ticket.id).await.expect("ticket exists").state,
            TicketState::Released
        );
    }

    #[tokio::test]
    async fn expiry_is_applied_lazily_on_access() {
        let now = Arc::new(AtomicU64::new(0));
        let clock = Arc::clone(&now);
        let ledger = ResourceLedger::new(1_000, 0)
            .with_clock(move || clock.load(Ordering::Relaxed));
        ledger.sync(native_units(&[("a", 100)])).await;

        let stale = ledger.reserve(100, &TokenType::native()).await.expect("covered");
        now.store(2_000, Ordering::Relaxed);

        // No explicit sweep: the next reserve sees the reclaimed unit.
        let fresh = ledger.reserve(100, &TokenType::native()).await.expect("covered");
        assert_ne!(stale.id, fresh.id);
        assert_eq!(fresh.unit_ids(), vec!["a"]);
    }

    #[tokio::test]
    async fn concurrent_reservations_never_share_units() {
        let values: Vec<(String, u64)> = (0..16).map(|i| (format!("u{i}"), 10)).collect();
        let borrowed: Vec<(&str, u64)> =
            values.iter().map(|(id, v)| (id.as_str(), *v)).collect();
        let ledger = Arc::new(funded_ledger(60_000, &borrowed).await);

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.reserve(10, &TokenType::native()).await
            }));
        }

        let mut seen = std::collections::HashSet::new();
        let mut granted = 0;
        for handle in handles {
            if let Ok(ticket) = handle.await.expect("task completes") {
                granted += 1;
                for unit_id in ticket.unit_ids() {
                    assert!(seen.insert(unit_id), "unit reserved twice");
                }
            }
        }
        assert_eq!(granted, 16);
    }

    #[tokio::test]
    async fn reserve_buffer_is_added_to_target() {
        let ledger = ResourceLedger::new(60_000, 15);
        ledger.sync(native_units(&[("a", 50), ("b", 10)])).await;

        // 50 + buffer 15 = 65 > 60 available.
        let err = ledger.reserve(50, &TokenType::native()).await.unwrap_err();
        assert!(matches!(
            err,
            RelayError::InsufficientFunds { required: 65, .. }
        ));

        // 40 + 15 = 55 needs both units.
        let ticket = ledger.reserve(40, &TokenType::native()).await.expect("covered");
        assert_eq!(ticket.reserved_total, 60);
    }

    #[tokio::test]
    async fn sync_adds_and_archives_but_keeps_reserved() {
        let ledger = funded_ledger(60_000, &[("a", 100), ("b", 50)]).await;
        let ticket = ledger.reserve(100, &TokenType::native()).await.expect("covered");
        assert_eq!(ticket.unit_ids(), vec!["a"]);

        // Network now reports only a fresh unit "c": "b" is archived, the
        // reserved "a" survives.
        let summary = ledger.sync(native_units(&[("c", 25)])).await;
        assert_eq!(summary.added, 1);
        assert_eq!(summary.archived, 1);

        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.reserved, 1);
        assert_eq!(snapshot.free, 1);
        assert_eq!(snapshot.free_native_value, 25);
    }

    #[tokio::test]
    async fn sync_archives_spent_units_once_network_drops_them() {
        let ledger = funded_ledger(60_000, &[("a", 100)]).await;
        let ticket = ledger.reserve(100, &TokenType::native()).await.expect("covered");
        ledger.commit(ticket.id).await.expect("commits");
        assert_eq!(ledger.snapshot().await.spent, 1);

        ledger.sync(Vec::new()).await;
        let snapshot = ledger.snapshot().await;
        assert_eq!(snapshot.spent, 0);
        assert_eq!(snapshot.free, 0);
    }

    #[tokio::test]
    async fn token_types_are_segregated() {
        let ledger = ResourceLedger::new(60_000, 0);
        ledger
            .sync(vec![
                OwnedUnit {
                    unit_id: "n1".into(),
                    value: 100,
                    token_type: TokenType::native(),
                },
                OwnedUnit {
                    unit_id: "t1".into(),
                    value: 100,
                    token_type: "bridged-usdc".into(),
                },
            ])
            .await;

        let err = ledger
            .reserve(150, &TokenType::native())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RelayError::InsufficientFunds { available: 100, .. }
        ));
    }
}
