// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Relay key custody.
//!
//! The relay signs its fee inputs with a single ECDSA key derived from a
//! master seed at startup. The seed enters the process through configuration
//! (24-word BIP-39 mnemonic or raw hex), is expanded into the signing key
//! once, and is wiped from memory on every exit path. Nothing here is ever
//! logged or serialized.

use hmac::{Hmac, Mac};
use k256::ecdsa::signature::{Signer, Verifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha2::Sha512;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::RelayError;

/// Domain separator for signing-key expansion.
const SIGNING_KEY_DOMAIN: &[u8] = b"fee-relay/signing-key/v1";

/// Number of words required in the relay mnemonic.
const MNEMONIC_WORDS: usize = 24;

// =============================================================================
// Seed
// =============================================================================

/// Master wallet seed (64 bytes), zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; 64]);

impl Seed {
    /// Parse a 24-word BIP-39 mnemonic into a seed.
    pub fn from_mnemonic(phrase: &str) -> Result<Self, RelayError> {
        let mnemonic = bip39::Mnemonic::parse_normalized(phrase.trim())
            .map_err(|e| RelayError::Key(format!("invalid mnemonic phrase: {e}")))?;

        if mnemonic.word_count() != MNEMONIC_WORDS {
            return Err(RelayError::Key(format!(
                "mnemonic must have {MNEMONIC_WORDS} words, got {}",
                mnemonic.word_count()
            )));
        }

        Ok(Seed(mnemonic.to_seed("")))
    }

    /// Parse a raw hex-encoded 64-byte seed.
    pub fn from_hex(hex_seed: &str) -> Result<Self, RelayError> {
        let bytes = hex::decode(hex_seed.trim())
            .map_err(|e| RelayError::Key(format!("seed is not valid hex: {e}")))?;

        let mut inner = [0u8; 64];
        if bytes.len() != inner.len() {
            return Err(RelayError::Key(format!(
                "seed must be {} bytes, got {}",
                inner.len(),
                bytes.len()
            )));
        }
        inner.copy_from_slice(&bytes);
        Ok(Seed(inner))
    }

    fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Seed(***)")
    }
}

// =============================================================================
// Key Manager
// =============================================================================

/// Holds the relay signing key for the process lifetime.
pub struct KeyManager {
    signing_key: SigningKey,
    address: String,
}

impl KeyManager {
    /// Derive the signing key from the seed.
    ///
    /// Expansion is HMAC-SHA512 over the seed under a fixed domain separator;
    /// the first 32 bytes of output become the ECDSA scalar. The rare
    /// out-of-range candidate is retried with an incremented counter, so
    /// derivation is deterministic for a given seed.
    pub fn from_seed(seed: &Seed) -> Result<Self, RelayError> {
        for counter in 0u8..=255 {
            let mut mac = Hmac::<Sha512>::new_from_slice(SIGNING_KEY_DOMAIN)
                .map_err(|e| RelayError::Key(format!("HMAC init failed: {e}")))?;
            mac.update(seed.as_bytes());
            mac.update(&[counter]);

            let mut okm = [0u8; 64];
            okm.copy_from_slice(&mac.finalize().into_bytes());
            let candidate = SigningKey::from_slice(&okm[..32]);
            okm.zeroize();

            if let Ok(signing_key) = candidate {
                let address = encode_address(signing_key.verifying_key());
                return Ok(Self {
                    signing_key,
                    address,
                });
            }
        }

        // 256 consecutive out-of-range scalars cannot happen for any seed.
        Err(RelayError::Key("signing key derivation failed".to_string()))
    }

    /// Sign a payload; returns the hex-encoded 64-byte signature.
    pub fn sign(&self, payload: &[u8]) -> String {
        let signature: Signature = self.signing_key.sign(payload);
        hex::encode(signature.to_bytes())
    }

    /// The relay's address: hex-encoded compressed public key.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Verify a hex-encoded signature produced by [`sign`](Self::sign).
    pub fn verify(&self, payload: &[u8], signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(signature) = Signature::from_slice(&bytes) else {
            return false;
        };
        self.signing_key
            .verifying_key()
            .verify(payload, &signature)
            .is_ok()
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

fn encode_address(verifying_key: &VerifyingKey) -> String {
    hex::encode(verifying_key.to_encoded_point(true).as_bytes())
}
