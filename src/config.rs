// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `MNEMONIC` | 24-word BIP-39 relay wallet mnemonic | Required unless `SEED` set |
//! | `SEED` | Raw hex 64-byte wallet seed (overrides `MNEMONIC`) | - |
//! | `NETWORK` | Network preset: `local`, `preview`, `preprod` | `preview` |
//! | `NODE_URL` | Ledger node endpoint override | per network |
//! | `INDEXER_URL` | Indexer endpoint override | per network |
//! | `PROOF_SERVER` | Proof server endpoint override | `http://localhost:6300` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `3002` |
//! | `TICKET_TTL_SECS` | Reservation time-to-live | `120` |
//! | `RESERVE_BUFFER` | Extra units reserved to absorb fee estimation error | `0` |
//! | `SUBMIT_RETRY_ATTEMPTS` | Max network submission attempts | `3` |
//! | `SUBMIT_RETRY_BASE_MS` | Backoff before the second attempt | `250` |
//! | `RESYNC_INTERVAL_SECS` | Pool reconciliation interval | `30` |
//! | `REQUEST_TIMEOUT_SECS` | Timeout for node/indexer/proof requests | `30` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info` |

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::coordinator::RetryPolicy;
use crate::error::RelayError;
use crate::keys::Seed;

/// Known network presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkName {
    /// Dockerized devnet on localhost.
    Local,
    /// Public preview network.
    Preview,
    /// Pre-production network.
    Preprod,
}

impl NetworkName {
    fn default_node_url(&self) -> &'static str {
        match self {
            NetworkName::Local => "http://localhost:9944/",
            NetworkName::Preview => "https://rpc.preview.midday.network/",
            NetworkName::Preprod => "https://rpc.preprod.midday.network/",
        }
    }

    fn default_indexer_url(&self) -> &'static str {
        match self {
            NetworkName::Local => "http://localhost:8088/",
            NetworkName::Preview => "https://indexer.preview.midday.network/",
            NetworkName::Preprod => "https://indexer.preprod.midday.network/",
        }
    }
}

impl FromStr for NetworkName {
    type Err = RelayError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(NetworkName::Local),
            "preview" => Ok(NetworkName::Preview),
            "preprod" => Ok(NetworkName::Preprod),
            other => Err(RelayError::Internal(format!(
                "unknown network \"{other}\" (available: local, preview, preprod)"
            ))),
        }
    }
}

impl std::fmt::Display for NetworkName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkName::Local => write!(f, "local"),
            NetworkName::Preview => write!(f, "preview"),
            NetworkName::Preprod => write!(f, "preprod"),
        }
    }
}

/// Resolved relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Selected network preset.
    pub network: NetworkName,
    /// Ledger node endpoint.
    pub node_url: Url,
    /// Indexer endpoint.
    pub indexer_url: Url,
    /// Proof server endpoint.
    pub proof_server_url: Url,
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Reservation time-to-live.
    pub ticket_ttl: Duration,
    /// Extra units reserved beyond the fee estimate.
    pub reserve_buffer: u64,
    /// Submission retry policy.
    pub retry: RetryPolicy,
    /// Pool reconciliation interval.
    pub resync_interval: Duration,
    /// Timeout applied to every outbound HTTP request.
    pub request_timeout: Duration,
}

impl RelayConfig {
    /// Load configuration and the wallet seed from process environment.
    pub fn from_env() -> Result<(Self, Seed), RelayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup (for tests).
    pub fn from_lookup<F>(lookup: F) -> Result<(Self, Seed), RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let seed = match lookup("SEED") {
            Some(hex_seed) => Seed::from_hex(&hex_seed)?,
            None => {
                let mnemonic = lookup("MNEMONIC").ok_or_else(|| {
                    RelayError::Key("MNEMONIC (or SEED) environment variable is required".into())
                })?;
                Seed::from_mnemonic(&mnemonic)?
            }
        };

        let network: NetworkName = lookup("NETWORK")
            .as_deref()
            .unwrap_or("preview")
            .parse()?;

        let node_url = parse_url(
            "NODE_URL",
            lookup("NODE_URL").as_deref().unwrap_or(network.default_node_url()),
        )?;
        let indexer_url = parse_url(
            "INDEXER_URL",
            lookup("INDEXER_URL")
                .as_deref()
                .unwrap_or(network.default_indexer_url()),
        )?;
        let proof_server_url = parse_url(
            "PROOF_SERVER",
            lookup("PROOF_SERVER")
                .as_deref()
                .unwrap_or("http://localhost:6300/"),
        )?;

        let config = RelayConfig {
            network,
            node_url,
            indexer_url,
            proof_server_url,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_number(&lookup, "PORT", 3002)?,
            ticket_ttl: Duration::from_secs(parse_number(&lookup, "TICKET_TTL_SECS", 120)?),
            reserve_buffer: parse_number(&lookup, "RESERVE_BUFFER", 0)?,
            retry: RetryPolicy {
                attempts: parse_number(&lookup, "SUBMIT_RETRY_ATTEMPTS", 3)?,
                base_delay: Duration::from_millis(parse_number(
                    &lookup,
                    "SUBMIT_RETRY_BASE_MS",
                    250,
                )?),
            },
            resync_interval: Duration::from_secs(parse_number(
                &lookup,
                "RESYNC_INTERVAL_SECS",
                30,
            )?),
            request_timeout: Duration::from_secs(parse_number(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                30,
            )?),
        };

        Ok((config, seed))
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, RelayError> {
    value
        .parse()
        .map_err(|e| RelayError::Internal(format!("{name} is not a valid URL: {e}")))
}

fn parse_number<F, N>(lookup: &F, name: &str, default: N) -> Result<N, RelayError>
where
    F: Fn(&str) -> Option<String>,
    N: FromStr,
    N::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| RelayError::Internal(format!("{name} is not a valid number: {e}"))),
        None => Ok(default),
    }
}
