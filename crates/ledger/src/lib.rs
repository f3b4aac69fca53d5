//! Fungible balance accounting for the DMT token.
//!
//! - [`TokenLedger`]: total supply, balances, allowances and the two transfer paths
//! - [`Ownable`]: the single-owner guard used by administrative operations

pub mod access;
pub mod ledger;

pub use access::Ownable;
pub use ledger::{TokenLedger, TokenMetadata};
