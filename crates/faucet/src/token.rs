//! Token facade
//!
//! [`DmtToken`] is the contract surface callers use. It pairs the ledger with
//! the faucet controller behind one lock:
//!
//! - every mutating call holds the write lock from first check to last write
//! - every read takes the read lock and sees no half-applied mutation
//!
//! Callers are identified by the `caller` argument; authenticating it is the
//! job of whatever hosts the token.

use crate::clock::Clock;
use crate::config::TokenParams;
use crate::controller::{ClaimState, FaucetController};
use crate::snapshot::{TokenSnapshot, SNAPSHOT_VERSION};
use dmt_common::{Address, Amount, LedgerError, Result, Timestamp};
use dmt_ledger::{Ownable, TokenLedger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

struct TokenState {
    ledger: TokenLedger,
    faucet: FaucetController,
}

/// Faucet status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaucetStatus {
    pub pool_address: Address,
    pub pool_balance: Amount,
    pub faucet_amount: Amount,
    pub cooldown_secs: u64,
    pub total_claims: u64,
    pub unique_claimants: usize,
    pub total_dispensed: Amount,
}

/// Token ledger with rate-limited public issuance
pub struct DmtToken {
    state: RwLock<TokenState>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for DmtToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("DmtToken")
            .field("symbol", &state.ledger.symbol())
            .field("owner", &state.faucet.access().owner())
            .field("pool", &state.faucet.pool())
            .finish()
    }
}

impl DmtToken {
    /// Create the token with its entire supply held by the pool.
    pub fn new(params: TokenParams, clock: Arc<dyn Clock>) -> Result<Self> {
        params.validate()?;

        let ledger = TokenLedger::new(params.metadata, params.pool, params.initial_supply);
        let faucet = FaucetController::new(
            Ownable::new(params.owner),
            params.pool,
            params.faucet_amount,
            params.cooldown_secs,
        );

        info!(
            "Token {} created: supply {}, owner {}, pool {}",
            ledger.symbol(),
            ledger.total_supply(),
            params.owner,
            params.pool
        );

        Ok(Self {
            state: RwLock::new(TokenState { ledger, faucet }),
            clock,
        })
    }

    /// Rebuild from a snapshot, verifying the supply invariant.
    pub fn from_snapshot(snapshot: TokenSnapshot, clock: Arc<dyn Clock>) -> Result<Self> {
        if snapshot.owner == snapshot.pool_address {
            return Err(LedgerError::Serialization(
                "snapshot owner equals pool account".to_string(),
            ));
        }

        let allowances: Vec<_> = snapshot.allowance_rows().collect();
        let ledger = TokenLedger::from_parts(
            snapshot.metadata,
            snapshot.total_supply,
            snapshot.balances,
            allowances,
        )?;
        let faucet = FaucetController::restore(
            Ownable::new(snapshot.owner),
            snapshot.pool_address,
            snapshot.faucet_amount,
            snapshot.cooldown_secs,
            snapshot.last_claims,
            snapshot.statistics,
        );

        debug!("Restored {} from snapshot", ledger.symbol());
        Ok(Self {
            state: RwLock::new(TokenState { ledger, faucet }),
            clock,
        })
    }

    // A panic can only happen between checks, before any write, so a
    // poisoned lock still guards consistent state.
    fn read(&self) -> RwLockReadGuard<'_, TokenState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, TokenState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // --- Metadata ---

    pub fn name(&self) -> String {
        self.read().ledger.name().to_string()
    }

    pub fn symbol(&self) -> String {
        self.read().ledger.symbol().to_string()
    }

    pub fn decimals(&self) -> u8 {
        self.read().ledger.decimals()
    }

    pub fn total_supply(&self) -> Amount {
        self.read().ledger.total_supply().clone()
    }

    pub fn owner(&self) -> Address {
        self.read().faucet.access().owner()
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        self.read().faucet.access().is_owner(caller)
    }

    pub fn pool_address(&self) -> Address {
        self.read().faucet.pool()
    }

    // --- Ledger ---

    pub fn balance_of(&self, account: &Address) -> Amount {
        self.read().ledger.balance_of(account)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.read().ledger.allowance(owner, spender)
    }

    pub fn transfer(&self, caller: &Address, to: &Address, amount: &Amount) -> Result<()> {
        let mut state = self.write();
        ensure_not_pool(&state, caller)?;
        state.ledger.transfer(caller, to, amount)
    }

    pub fn approve(&self, caller: &Address, spender: &Address, amount: &Amount) -> Result<()> {
        let mut state = self.write();
        ensure_not_pool(&state, caller)?;
        state.ledger.approve(caller, spender, amount);
        Ok(())
    }

    pub fn transfer_from(
        &self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: &Amount,
    ) -> Result<()> {
        let mut state = self.write();
        ensure_not_pool(&state, caller)?;
        state.ledger.transfer_from(caller, from, to, amount)
    }

    // --- Faucet ---

    pub fn claim_state(&self, account: &Address) -> ClaimState {
        let now = self.clock.now();
        self.read().faucet.claim_state(account, now)
    }

    pub fn can_claim(&self, account: &Address) -> bool {
        let now = self.clock.now();
        self.read().faucet.can_claim(account, now)
    }

    pub fn time_until_next_claim(&self, account: &Address) -> u64 {
        let now = self.clock.now();
        self.read().faucet.time_until_next_claim(account, now)
    }

    pub fn last_claim(&self, account: &Address) -> Option<Timestamp> {
        self.read().faucet.last_claim(account)
    }

    /// Claim `faucet_amount` from the pool. Returns the amount paid.
    pub fn claim(&self, caller: &Address) -> Result<Amount> {
        let mut guard = self.write();
        ensure_not_pool(&guard, caller)?;
        // Read the clock under the lock so claims are timestamped in lock order.
        let now = self.clock.now();
        let state = &mut *guard;
        state.faucet.claim(&mut state.ledger, caller, now)
    }

    pub fn faucet_balance(&self) -> Amount {
        let state = self.read();
        state.faucet.faucet_balance(&state.ledger)
    }

    pub fn faucet_amount(&self) -> Amount {
        self.read().faucet.faucet_amount().clone()
    }

    pub fn cooldown_time(&self) -> u64 {
        self.read().faucet.cooldown_time()
    }

    pub fn set_faucet_amount(&self, caller: &Address, new_amount: Amount) -> Result<()> {
        self.write().faucet.set_faucet_amount(caller, new_amount)
    }

    pub fn set_cooldown_time(&self, caller: &Address, new_secs: u64) -> Result<()> {
        self.write().faucet.set_cooldown_time(caller, new_secs)
    }

    pub fn refill_faucet(&self, caller: &Address, amount: &Amount) -> Result<()> {
        let mut guard = self.write();
        let state = &mut *guard;
        state.faucet.refill_faucet(&mut state.ledger, caller, amount)
    }

    pub fn withdraw_from_faucet(&self, caller: &Address, amount: &Amount) -> Result<()> {
        let mut guard = self.write();
        let state = &mut *guard;
        state.faucet.withdraw_from_faucet(&mut state.ledger, caller, amount)
    }

    // --- Reporting ---

    pub fn status(&self) -> FaucetStatus {
        let state = self.read();
        let stats = state.faucet.statistics();
        FaucetStatus {
            pool_address: state.faucet.pool(),
            pool_balance: state.faucet.faucet_balance(&state.ledger),
            faucet_amount: state.faucet.faucet_amount().clone(),
            cooldown_secs: state.faucet.cooldown_time(),
            total_claims: stats.total_claims,
            unique_claimants: state.faucet.unique_claimants(),
            total_dispensed: stats.total_dispensed.clone(),
        }
    }

    /// Capture the complete state under one read lock.
    pub fn snapshot(&self) -> TokenSnapshot {
        let state = self.read();

        let balances: BTreeMap<Address, Amount> = state
            .ledger
            .balances()
            .map(|(account, amount)| (*account, amount.clone()))
            .collect();

        let mut allowances: BTreeMap<Address, BTreeMap<Address, Amount>> = BTreeMap::new();
        for (owner, spender, amount) in state.ledger.allowances() {
            allowances
                .entry(*owner)
                .or_default()
                .insert(*spender, amount.clone());
        }

        TokenSnapshot {
            version: SNAPSHOT_VERSION,
            metadata: state.ledger.metadata().clone(),
            total_supply: state.ledger.total_supply().clone(),
            owner: state.faucet.access().owner(),
            pool_address: state.faucet.pool(),
            faucet_amount: state.faucet.faucet_amount().clone(),
            cooldown_secs: state.faucet.cooldown_time(),
            balances,
            allowances,
            last_claims: state
                .faucet
                .last_claims()
                .map(|(account, ts)| (*account, *ts))
                .collect(),
            statistics: state.faucet.statistics().clone(),
        }
    }
}

/// Only the ledger itself moves pool funds.
fn ensure_not_pool(state: &TokenState, caller: &Address) -> Result<()> {
    if *caller == state.faucet.pool() {
        warn!("Rejected call with the pool account as caller");
        return Err(LedgerError::Unauthorized(*caller));
    }
    Ok(())
}
