//! Genesis manifest loading
//!
//! The manifest is a JSON document:
//!
//! ```json
//! {
//!   "genesis_timestamp": "2024-01-01T00:00:00Z",
//!   "genesis_allocations": [
//!     { "address": "0xabc...", "amount": "1000000", "description": "treasury" }
//!   ]
//! }
//! ```
//!
//! Bad allocations are skipped with a warning; a missing or malformed file
//! yields an empty genesis block. Loading never fails the node.

use crate::{
    amount::{self, AmountInput},
    types::{now, Block, Transaction},
    Result,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// One initial credit from the system
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenesisAllocation {
    /// Receiving address (trimmed before use)
    #[serde(default)]
    pub address: String,
    /// Display amount or base units
    #[serde(default = "zero_amount")]
    pub amount: AmountInput,
    /// Free-form label, logged only
    #[serde(default)]
    pub description: String,
}

fn zero_amount() -> AmountInput {
    AmountInput::Integer(0)
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    genesis_timestamp: Option<String>,
    #[serde(default)]
    genesis_allocations: Vec<serde_json::Value>,
}

/// Parsed genesis manifest
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenesisManifest {
    /// Fixed timestamp for block 0
    pub genesis_timestamp: Option<DateTime<Utc>>,
    /// Allocations in file order
    pub allocations: Vec<GenesisAllocation>,
}

impl GenesisManifest {
    /// Parse manifest JSON.
    ///
    /// Only a malformed document is an error. Individual allocations that
    /// do not decode and unreadable timestamps are dropped with a warning.
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(text)?;

        let genesis_timestamp = raw.genesis_timestamp.as_deref().and_then(|ts| {
            let parsed = parse_timestamp(ts);
            if parsed.is_none() {
                warn!(timestamp = ts, "Ignoring unreadable genesis timestamp");
            }
            parsed
        });

        let allocations = raw
            .genesis_allocations
            .into_iter()
            .filter_map(|value| match serde_json::from_value::<GenesisAllocation>(value) {
                Ok(allocation) => Some(allocation),
                Err(e) => {
                    warn!(error = %e, "Skipping undecodable genesis allocation");
                    None
                }
            })
            .collect();

        Ok(Self {
            genesis_timestamp,
            allocations,
        })
    }

    /// Load a manifest file. Absent or malformed files yield `None`.
    pub fn load(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Genesis manifest not found, using empty genesis block");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read genesis manifest");
                return None;
            }
        };

        match Self::from_json(&text) {
            Ok(manifest) => {
                info!(
                    path = %path.display(),
                    allocations = manifest.allocations.len(),
                    "Genesis manifest loaded"
                );
                Some(manifest)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Malformed genesis manifest, using empty genesis block");
                None
            }
        }
    }

    /// System transfers for every usable allocation
    pub fn transactions(&self) -> Vec<Transaction> {
        let mut transactions = Vec::new();

        for allocation in &self.allocations {
            let address = allocation.address.trim();
            if address.is_empty() {
                warn!("Skipping genesis allocation with empty address");
                continue;
            }

            let base_units = match amount::parse_amount(allocation.amount.clone()) {
                Ok(v) => v,
                Err(e) => {
                    warn!(
                        address,
                        amount = %allocation.amount,
                        error = %e,
                        "Skipping genesis allocation with unparsable amount"
                    );
                    continue;
                }
            };

            if base_units <= 0 {
                warn!(address, base_units = %base_units, "Skipping genesis allocation with non-positive amount");
                continue;
            }

            info!(
                address,
                amount = %amount::format(base_units),
                description = %allocation.description,
                "Genesis allocation"
            );
            transactions.push(Transaction::system(address, base_units as u128));
        }

        if !transactions.is_empty() {
            let total: i128 = transactions.iter().map(Transaction::signed_amount).sum();
            info!(
                count = transactions.len(),
                total = %amount::format(total),
                "Genesis allocations applied"
            );
        }

        transactions
    }
}

/// Block 0 from an optional manifest
pub fn genesis_block(manifest: Option<&GenesisManifest>) -> Block {
    match manifest {
        Some(manifest) => Block::genesis(
            manifest.transactions(),
            manifest.genesis_timestamp.unwrap_or_else(now),
        ),
        None => Block::genesis(Vec::new(), now()),
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::BASE_UNITS_PER_TOKEN;
    use crate::types::{format_timestamp, GENESIS_PREVIOUS_HASH};
    use std::io::Write;

    #[test]
    fn test_allocations_become_system_transfers() {
        let manifest = GenesisManifest::from_json(
            r#"{
                "genesis_allocations": [
                    {"address": " alice ", "amount": "1000", "description": "treasury"},
                    {"address": "bob", "amount": 2.5}
                ]
            }"#,
        )
        .unwrap();

        let txs = manifest.transactions();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].recipient, "alice");
        assert_eq!(txs[0].amount, 1000 * BASE_UNITS_PER_TOKEN as u128);
        assert!(txs[0].is_system());
        assert_eq!(txs[1].amount, 2_500_000_000_000_000_000);
    }

    #[test]
    fn test_numeric_base_unit_allocations_pass_through() {
        let manifest = GenesisManifest::from_json(
            r#"{
                "genesis_allocations": [
                    {"address": "whale", "amount": 250000000000000000000000},
                    {"address": "small", "amount": 50000000000}
                ]
            }"#,
        )
        .unwrap();

        let txs = manifest.transactions();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].amount, 250_000 * BASE_UNITS_PER_TOKEN as u128);
        assert_eq!(txs[1].amount, 50_000_000_000);
    }

    #[test]
    fn test_bad_allocations_skipped() {
        let manifest = GenesisManifest::from_json(
            r#"{
                "genesis_allocations": [
                    {"address": "", "amount": "10"},
                    {"address": "a", "amount": "ten"},
                    {"address": "b", "amount": "0"},
                    {"address": "c", "amount": "-5"},
                    {"address": "d"},
                    {"address": "e", "amount": {"nested": true}},
                    {"address": "f", "amount": "1"}
                ]
            }"#,
        )
        .unwrap();

        let txs = manifest.transactions();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].recipient, "f");
    }

    #[test]
    fn test_fixed_timestamp_applied() {
        let manifest = GenesisManifest::from_json(
            r#"{"genesis_timestamp": "2024-01-01T00:00:00", "genesis_allocations": []}"#,
        )
        .unwrap();

        let block = genesis_block(Some(&manifest));
        assert_eq!(format_timestamp(&block.timestamp), "2024-01-01T00:00:00.000000Z");
        assert_eq!(block.index, 0);
        assert_eq!(block.previous_hash, GENESIS_PREVIOUS_HASH);
        assert!(block.has_valid_hash());
    }

    #[test]
    fn test_fixed_timestamp_gives_reproducible_hash() {
        let text = r#"{"genesis_timestamp": "2024-06-01T12:00:00Z"}"#;
        let a = genesis_block(Some(&GenesisManifest::from_json(text).unwrap()));
        let b = genesis_block(Some(&GenesisManifest::from_json(text).unwrap()));
        assert_eq!(a.hash, b.hash);
    }

    #[test]
    fn test_malformed_manifest_is_error() {
        assert!(GenesisManifest::from_json("{not json").is_err());
    }

    #[test]
    fn test_load_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(GenesisManifest::load(dir.path().join("missing.json")).is_none());

        let path = dir.path().join("genesis.json");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"[1, 2").unwrap();
        assert!(GenesisManifest::load(&path).is_none());

        std::fs::write(&path, r#"{"genesis_allocations": [{"address": "x", "amount": 3}]}"#).unwrap();
        let manifest = GenesisManifest::load(&path).unwrap();
        assert_eq!(manifest.transactions().len(), 1);
    }

    #[test]
    fn test_absent_manifest_gives_empty_genesis() {
        let block = genesis_block(None);
        assert!(block.transactions.is_empty());
        assert!(block.has_valid_hash());
    }
}
