//! Serializable image of the whole token state

use crate::controller::ClaimStatistics;
use dmt_common::{Address, Amount, Result, Timestamp};
use dmt_ledger::TokenMetadata;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current snapshot format
pub const SNAPSHOT_VERSION: u32 = 1;

/// Complete token state. Maps are ordered so equal states encode identically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSnapshot {
    pub version: u32,

    pub metadata: TokenMetadata,

    pub total_supply: Amount,

    pub owner: Address,

    pub pool_address: Address,

    pub faucet_amount: Amount,

    pub cooldown_secs: u64,

    pub balances: BTreeMap<Address, Amount>,

    /// owner -> spender -> amount
    #[serde(default)]
    pub allowances: BTreeMap<Address, BTreeMap<Address, Amount>>,

    /// account -> last successful claim
    #[serde(default)]
    pub last_claims: BTreeMap<Address, Timestamp>,

    #[serde(default)]
    pub statistics: ClaimStatistics,
}

impl TokenSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: TokenSnapshot = serde_json::from_str(json)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(dmt_common::LedgerError::Serialization(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    /// Flattened (owner, spender, amount) rows.
    pub fn allowance_rows(&self) -> impl Iterator<Item = (Address, Address, Amount)> + '_ {
        self.allowances.iter().flat_map(|(owner, spenders)| {
            spenders
                .iter()
                .map(move |(spender, amount)| (*owner, *spender, amount.clone()))
        })
    }
}
