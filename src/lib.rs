// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Midday Fee Relay - Custodial Transaction Fee-Relay Service
//!
//! This crate lets fee-less clients submit ledger transactions: a funded
//! relay wallet supplies the missing fee inputs, co-signs them, and forwards
//! the finished transaction to the network, coordinating with an external
//! proof server.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `keys` - Seed custody and relay signing
//! - `ledger` - Spendable unit pool and reservations
//! - `balancer` - Fee estimation, unit reservation, relay signing
//! - `coordinator` - Idempotent network submission
//! - `network` - Node/indexer and proof server clients

pub mod api;
pub mod balancer;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod logging;
pub mod models;
pub mod network;
pub mod reclaimer;
pub mod resync;
pub mod state;
