//! Shared types for the DMT token ledger: account identifiers, fixed-point
//! amounts, the error type and logging/config helpers.

pub mod error;
pub mod types;
pub mod utils;

pub use error::{LedgerError, Result};
pub use types::{format_units, parse_units, Address, Amount, Timestamp, DECIMALS};
