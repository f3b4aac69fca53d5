//! Balance and allowance accounting
//!
//! The ledger has no notion of callers being authenticated: whoever calls
//! [`TokenLedger::transfer`] names the account being debited. Identity checks
//! live one layer up, in the token facade that owns the ledger.
//!
//! # Invariants
//!
//! - Σ balances == total supply, at all times
//! - A failed operation leaves balances and allowances untouched

use dmt_common::{Address, Amount, LedgerError, Result, DECIMALS};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Token metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    /// Display name
    pub name: String,

    /// Ticker symbol
    pub symbol: String,

    /// Fractional digits of the base unit
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: DECIMALS,
        }
    }
}

/// Fixed-supply fungible token ledger
#[derive(Debug, Clone)]
pub struct TokenLedger {
    metadata: TokenMetadata,

    total_supply: Amount,

    /// Accounts with a non-zero balance
    balances: HashMap<Address, Amount>,

    /// (owner, spender) -> remaining allowance, non-zero entries only
    allowances: HashMap<(Address, Address), Amount>,
}

impl TokenLedger {
    /// Create a ledger whose entire supply is credited to `holder`.
    pub fn new(metadata: TokenMetadata, holder: Address, initial_supply: Amount) -> Self {
        let mut balances = HashMap::new();
        if !initial_supply.is_zero() {
            balances.insert(holder, initial_supply.clone());
        }

        debug!(
            "Created {} ledger with supply {} held by {}",
            metadata.symbol, initial_supply, holder
        );

        Self {
            metadata,
            total_supply: initial_supply,
            balances,
            allowances: HashMap::new(),
        }
    }

    /// Rebuild a ledger from stored tables, checking the supply invariant.
    pub fn from_parts(
        metadata: TokenMetadata,
        total_supply: Amount,
        balances: impl IntoIterator<Item = (Address, Amount)>,
        allowances: impl IntoIterator<Item = (Address, Address, Amount)>,
    ) -> Result<Self> {
        let balances: HashMap<Address, Amount> = balances
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .collect();
        let allowances: HashMap<(Address, Address), Amount> = allowances
            .into_iter()
            .filter(|(_, _, amount)| !amount.is_zero())
            .map(|(owner, spender, amount)| ((owner, spender), amount))
            .collect();

        let sum: Amount = balances.values().sum();
        if sum != total_supply {
            return Err(LedgerError::Serialization(format!(
                "balances sum to {} but total supply is {}",
                sum, total_supply
            )));
        }

        Ok(Self {
            metadata,
            total_supply,
            balances,
            allowances,
        })
    }

    pub fn metadata(&self) -> &TokenMetadata {
        &self.metadata
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn symbol(&self) -> &str {
        &self.metadata.symbol
    }

    pub fn decimals(&self) -> u8 {
        self.metadata.decimals
    }

    pub fn total_supply(&self) -> &Amount {
        &self.total_supply
    }

    /// Zero for accounts never credited.
    pub fn balance_of(&self, account: &Address) -> Amount {
        self.balances.get(account).cloned().unwrap_or_default()
    }

    /// Zero if never approved.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(*owner, *spender))
            .cloned()
            .unwrap_or_default()
    }

    /// Move `amount` from `caller` to `to`.
    pub fn transfer(&mut self, caller: &Address, to: &Address, amount: &Amount) -> Result<()> {
        let remaining = self.debit_amount(caller, amount)?;
        self.apply_transfer(caller, remaining, to, amount);
        Ok(())
    }

    /// Set the allowance of `spender` over `caller`'s balance. Overwrites, never adds.
    pub fn approve(&mut self, caller: &Address, spender: &Address, amount: &Amount) {
        self.set_allowance(caller, spender, amount.clone());
        debug!("{} approved {} to spend {}", caller, spender, amount);
    }

    /// Move `amount` from `from` to `to` on behalf of `caller`, consuming allowance.
    ///
    /// The allowance is checked before the balance, so a spender without
    /// enough allowance learns nothing about the owner's balance.
    pub fn transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: &Amount,
    ) -> Result<()> {
        let available = self.allowance(from, caller);
        let remaining_allowance = match available.checked_sub(amount) {
            Some(rest) => rest,
            None => {
                warn!(
                    "transferFrom by {} over {}: allowance {} < {}",
                    caller, from, available, amount
                );
                return Err(LedgerError::InsufficientAllowance {
                    owner: *from,
                    spender: *caller,
                    available,
                    required: amount.clone(),
                });
            }
        };
        let remaining_balance = self.debit_amount(from, amount)?;

        // All checks passed, nothing below can fail.
        self.set_allowance(from, caller, remaining_allowance);
        self.apply_transfer(from, remaining_balance, to, amount);
        Ok(())
    }

    pub fn balances(&self) -> impl Iterator<Item = (&Address, &Amount)> {
        self.balances.iter()
    }

    pub fn allowances(&self) -> impl Iterator<Item = (&Address, &Address, &Amount)> {
        self.allowances
            .iter()
            .map(|((owner, spender), amount)| (owner, spender, amount))
    }

    /// Number of accounts holding a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    /// Balance of `account` after removing `amount`, or the failure.
    fn debit_amount(&self, account: &Address, amount: &Amount) -> Result<Amount> {
        let available = self.balance_of(account);
        available.checked_sub(amount).ok_or_else(|| {
            warn!("{} holds {}, cannot move {}", account, available, amount);
            LedgerError::InsufficientBalance {
                account: *account,
                available,
                required: amount.clone(),
            }
        })
    }

    fn set_allowance(&mut self, owner: &Address, spender: &Address, amount: Amount) {
        let key = (*owner, *spender);
        if amount.is_zero() {
            self.allowances.remove(&key);
        } else {
            self.allowances.insert(key, amount);
        }
    }

    fn set_balance(&mut self, account: &Address, balance: Amount) {
        if balance.is_zero() {
            self.balances.remove(account);
        } else {
            self.balances.insert(*account, balance);
        }
    }

    /// Write a pre-validated debit, then credit. Credit reads after the debit
    /// so a self-transfer is a no-op.
    fn apply_transfer(&mut self, from: &Address, from_remaining: Amount, to: &Address, amount: &Amount) {
        self.set_balance(from, from_remaining);
        let credited = &self.balance_of(to) + amount;
        self.set_balance(to, credited);
        debug!("Transferred {} from {} to {}", amount, from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from([b; 20])
    }

    fn ledger_with(holder: Address, supply: u64) -> TokenLedger {
        TokenLedger::new(TokenMetadata::new("Test Token", "TST"), holder, Amount::from(supply))
    }

    fn sum_of_balances(ledger: &TokenLedger) -> Amount {
        ledger.balances().map(|(_, amount)| amount).sum()
    }

    #[test]
    fn test_initial_supply_to_holder() {
        let ledger = ledger_with(addr(1), 1000);
        assert_eq!(ledger.total_supply(), &Amount::from(1000u64));
        assert_eq!(ledger.balance_of(&addr(1)), Amount::from(1000u64));
        assert_eq!(ledger.balance_of(&addr(2)), Amount::zero());
        assert_eq!(ledger.decimals(), 18);
        assert_eq!(ledger.symbol(), "TST");
    }

    #[test]
    fn test_transfer() {
        let mut ledger = ledger_with(addr(1), 1000);
        ledger.transfer(&addr(1), &addr(2), &Amount::from(300u64)).unwrap();

        assert_eq!(ledger.balance_of(&addr(1)), Amount::from(700u64));
        assert_eq!(ledger.balance_of(&addr(2)), Amount::from(300u64));
        assert_eq!(&sum_of_balances(&ledger), ledger.total_supply());
    }

    #[test]
    fn test_transfer_insufficient_balance() {
        let mut ledger = ledger_with(addr(1), 1000);
        let err = ledger
            .transfer(&addr(2), &addr(1), &Amount::from(1u64))
            .unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.balance_of(&addr(1)), Amount::from(1000u64));
        assert_eq!(ledger.balance_of(&addr(2)), Amount::zero());
    }

    #[test]
    fn test_transfer_entire_balance_and_to_self() {
        let mut ledger = ledger_with(addr(1), 1000);
        ledger.transfer(&addr(1), &addr(1), &Amount::from(1000u64)).unwrap();
        assert_eq!(ledger.balance_of(&addr(1)), Amount::from(1000u64));

        ledger.transfer(&addr(1), &addr(2), &Amount::from(1000u64)).unwrap();
        assert_eq!(ledger.balance_of(&addr(1)), Amount::zero());
        assert_eq!(ledger.holder_count(), 1);
    }

    #[test]
    fn test_zero_transfer_succeeds() {
        let mut ledger = ledger_with(addr(1), 1000);
        ledger.transfer(&addr(3), &addr(2), &Amount::zero()).unwrap();
        assert_eq!(ledger.balance_of(&addr(2)), Amount::zero());
        assert_eq!(ledger.holder_count(), 1);
    }

    #[test]
    fn test_approve_overwrites() {
        let mut ledger = ledger_with(addr(1), 1000);
        ledger.approve(&addr(1), &addr(2), &Amount::from(500u64));
        ledger.approve(&addr(1), &addr(2), &Amount::from(200u64));
        assert_eq!(ledger.allowance(&addr(1), &addr(2)), Amount::from(200u64));

        ledger.approve(&addr(1), &addr(2), &Amount::zero());
        assert_eq!(ledger.allowance(&addr(1), &addr(2)), Amount::zero());
        assert_eq!(ledger.allowances().count(), 0);
    }

    #[test]
    fn test_transfer_from() {
        let mut ledger = ledger_with(addr(1), 1000);
        ledger.approve(&addr(1), &addr(2), &Amount::from(500u64));
        ledger
            .transfer_from(&addr(2), &addr(1), &addr(3), &Amount::from(300u64))
            .unwrap();

        assert_eq!(ledger.balance_of(&addr(3)), Amount::from(300u64));
        assert_eq!(ledger.balance_of(&addr(1)), Amount::from(700u64));
        assert_eq!(ledger.allowance(&addr(1), &addr(2)), Amount::from(200u64));
    }

    #[test]
    fn test_transfer_from_insufficient_allowance() {
        let mut ledger = ledger_with(addr(1), 1000);
        ledger.approve(&addr(1), &addr(2), &Amount::from(100u64));

        let err = ledger
            .transfer_from(&addr(2), &addr(1), &addr(3), &Amount::from(101u64))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { .. }));
        assert_eq!(ledger.allowance(&addr(1), &addr(2)), Amount::from(100u64));
        assert_eq!(ledger.balance_of(&addr(1)), Amount::from(1000u64));
    }

    #[test]
    fn test_transfer_from_insufficient_balance_keeps_allowance() {
        let mut ledger = ledger_with(addr(1), 1000);
        ledger.approve(&addr(4), &addr(2), &Amount::from(100u64));

        let err = ledger
            .transfer_from(&addr(2), &addr(4), &addr(3), &Amount::from(50u64))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.allowance(&addr(4), &addr(2)), Amount::from(100u64));
    }

    #[test]
    fn test_from_parts_checks_supply() {
        let metadata = TokenMetadata::new("Test Token", "TST");
        let ok = TokenLedger::from_parts(
            metadata.clone(),
            Amount::from(10u64),
            vec![(addr(1), Amount::from(4u64)), (addr(2), Amount::from(6u64))],
            vec![(addr(1), addr(2), Amount::from(3u64))],
        )
        .unwrap();
        assert_eq!(ok.allowance(&addr(1), &addr(2)), Amount::from(3u64));

        let err = TokenLedger::from_parts(
            metadata,
            Amount::from(10u64),
            vec![(addr(1), Amount::from(4u64))],
            Vec::new(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::Serialization(_)));
    }
}
