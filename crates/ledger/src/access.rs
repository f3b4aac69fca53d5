//! Single-owner access control

use dmt_common::{Address, LedgerError, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Holds the one account allowed to run administrative operations.
/// Fixed at creation; there is no transfer of ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        *caller == self.owner
    }

    /// Guard for owner-only operations.
    pub fn ensure_owner(&self, caller: &Address) -> Result<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            warn!("Rejected owner-only call from {}", caller);
            Err(LedgerError::Unauthorized(*caller))
        }
    }
}
