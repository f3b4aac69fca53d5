use crate::types::{Address, Amount};
use thiserror::Error;

/// Errors returned by ledger and faucet operations.
///
/// The first five variants are precondition failures of the public operations;
/// a call that returns one of them has left every balance, allowance and
/// claim timestamp untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance: {account} holds {available}, needs {required}")]
    InsufficientBalance {
        account: Address,
        available: Amount,
        required: Amount,
    },

    #[error("Insufficient allowance: {spender} may spend {available} for {owner}, needs {required}")]
    InsufficientAllowance {
        owner: Address,
        spender: Address,
        available: Amount,
        required: Amount,
    },

    #[error("Only owner can call this function (caller {0})")]
    Unauthorized(Address),

    #[error("Cooldown period not passed yet: {remaining_secs}s remaining")]
    CooldownNotElapsed { remaining_secs: u64 },

    #[error("Faucet is empty: pool holds {available}, claim needs {required}")]
    FaucetEmpty { available: Amount, required: Amount },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    /// Whether the error is one of the operation preconditions rather than an
    /// environment problem.
    pub fn is_precondition(&self) -> bool {
        !matches!(self, LedgerError::Config(_) | LedgerError::Serialization(_))
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, LedgerError>;

impl From<serde_json::Error> for LedgerError {
    fn from(err: serde_json::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
