//! Faucet issuance policy
//!
//! Claims move a fixed amount from the pool account to the caller, at most
//! once per cooldown window per account. The pool is an ordinary row of the
//! ledger's balance table; this module only decides when value may leave it.
//!
//! Per-account eligibility is derived, never stored:
//!
//! ```text
//! Eligible --claim--> Cooling --(cooldown elapses)--> Eligible
//! ```

use dmt_common::{Address, Amount, LedgerError, Result, Timestamp};
use dmt_ledger::{Ownable, TokenLedger};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Claim eligibility of one account at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    /// Never claimed, or cooldown elapsed
    Eligible,
    /// Claimed recently
    Cooling { remaining_secs: u64 },
}

/// Running totals over successful claims
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimStatistics {
    pub total_claims: u64,
    pub total_dispensed: Amount,
}

/// Faucet controller
#[derive(Debug, Clone)]
pub struct FaucetController {
    access: Ownable,

    /// Ledger account holding the pool
    pool: Address,

    /// Amount granted per claim (base units)
    faucet_amount: Amount,

    /// Seconds required between two claims of one account
    cooldown_secs: u64,

    /// Timestamp of each account's last successful claim; absent = never claimed
    last_claim: HashMap<Address, Timestamp>,

    stats: ClaimStatistics,
}

impl FaucetController {
    pub fn new(access: Ownable, pool: Address, faucet_amount: Amount, cooldown_secs: u64) -> Self {
        Self {
            access,
            pool,
            faucet_amount,
            cooldown_secs,
            last_claim: HashMap::new(),
            stats: ClaimStatistics::default(),
        }
    }

    /// Rebuild a controller with previously recorded claims.
    pub fn restore(
        access: Ownable,
        pool: Address,
        faucet_amount: Amount,
        cooldown_secs: u64,
        last_claims: impl IntoIterator<Item = (Address, Timestamp)>,
        stats: ClaimStatistics,
    ) -> Self {
        Self {
            access,
            pool,
            faucet_amount,
            cooldown_secs,
            last_claim: last_claims.into_iter().collect(),
            stats,
        }
    }

    pub fn access(&self) -> &Ownable {
        &self.access
    }

    pub fn pool(&self) -> Address {
        self.pool
    }

    pub fn faucet_amount(&self) -> &Amount {
        &self.faucet_amount
    }

    pub fn cooldown_time(&self) -> u64 {
        self.cooldown_secs
    }

    pub fn statistics(&self) -> &ClaimStatistics {
        &self.stats
    }

    pub fn last_claim(&self, account: &Address) -> Option<Timestamp> {
        self.last_claim.get(account).copied()
    }

    pub fn last_claims(&self) -> impl Iterator<Item = (&Address, &Timestamp)> {
        self.last_claim.iter()
    }

    /// Number of distinct accounts that have claimed at least once.
    pub fn unique_claimants(&self) -> usize {
        self.last_claim.len()
    }

    /// Pool balance, i.e. `balance_of(pool)`.
    pub fn faucet_balance(&self, ledger: &TokenLedger) -> Amount {
        ledger.balance_of(&self.pool)
    }

    pub fn claim_state(&self, account: &Address, now: Timestamp) -> ClaimState {
        match self.last_claim.get(account) {
            None => ClaimState::Eligible,
            Some(&last) => {
                // A clock behind the last claim counts as no time elapsed.
                let elapsed = now.saturating_sub(last);
                if elapsed >= self.cooldown_secs {
                    ClaimState::Eligible
                } else {
                    ClaimState::Cooling {
                        remaining_secs: self.cooldown_secs - elapsed,
                    }
                }
            }
        }
    }

    pub fn can_claim(&self, account: &Address, now: Timestamp) -> bool {
        self.claim_state(account, now) == ClaimState::Eligible
    }

    pub fn time_until_next_claim(&self, account: &Address, now: Timestamp) -> u64 {
        match self.claim_state(account, now) {
            ClaimState::Eligible => 0,
            ClaimState::Cooling { remaining_secs } => remaining_secs,
        }
    }

    /// Pay `faucet_amount` from the pool to `caller` and start its cooldown.
    ///
    /// Checks cooldown first, then pool balance. The timestamp is recorded
    /// only after the ledger transfer has succeeded.
    pub fn claim(&mut self, ledger: &mut TokenLedger, caller: &Address, now: Timestamp) -> Result<Amount> {
        if let ClaimState::Cooling { remaining_secs } = self.claim_state(caller, now) {
            warn!("Claim by {} rejected: {}s of cooldown left", caller, remaining_secs);
            return Err(LedgerError::CooldownNotElapsed { remaining_secs });
        }

        let available = self.faucet_balance(ledger);
        if available < self.faucet_amount {
            warn!(
                "Claim by {} rejected: pool holds {}, claim needs {}",
                caller, available, self.faucet_amount
            );
            return Err(LedgerError::FaucetEmpty {
                available,
                required: self.faucet_amount.clone(),
            });
        }

        ledger.transfer(&self.pool, caller, &self.faucet_amount)?;

        self.last_claim.insert(*caller, now);
        self.stats.total_claims += 1;
        self.stats.total_dispensed += &self.faucet_amount;

        info!("{} claimed {} at {}", caller, self.faucet_amount, now);
        Ok(self.faucet_amount.clone())
    }

    pub fn set_faucet_amount(&mut self, caller: &Address, new_amount: Amount) -> Result<()> {
        self.access.ensure_owner(caller)?;
        info!("Faucet amount changed from {} to {}", self.faucet_amount, new_amount);
        self.faucet_amount = new_amount;
        Ok(())
    }

    /// Accounts already cooling are measured against the new value.
    pub fn set_cooldown_time(&mut self, caller: &Address, new_secs: u64) -> Result<()> {
        self.access.ensure_owner(caller)?;
        info!("Cooldown changed from {}s to {}s", self.cooldown_secs, new_secs);
        self.cooldown_secs = new_secs;
        Ok(())
    }

    /// Move `amount` from the owner's own balance into the pool.
    pub fn refill_faucet(&mut self, ledger: &mut TokenLedger, caller: &Address, amount: &Amount) -> Result<()> {
        self.access.ensure_owner(caller)?;
        ledger.transfer(caller, &self.pool, amount)?;
        info!("Pool refilled with {} by {}", amount, caller);
        Ok(())
    }

    /// Move `amount` out of the pool to the owner.
    pub fn withdraw_from_faucet(
        &mut self,
        ledger: &mut TokenLedger,
        caller: &Address,
        amount: &Amount,
    ) -> Result<()> {
        self.access.ensure_owner(caller)?;
        ledger.transfer(&self.pool, caller, amount)?;
        info!("{} withdrawn from pool by {}", amount, caller);
        debug!("Pool balance now {}", self.faucet_balance(ledger));
        Ok(())
    }
}
