//! DMT token with a public faucet
//!
//! Any account may claim a fixed amount from the pool once per cooldown
//! window; the owner tunes the amount and cooldown and moves funds in and
//! out of the pool.
//!
//! ```
//! use dmt_common::{Address, Amount};
//! use dmt_faucet::{DmtToken, ManualClock, TokenParams};
//! use std::sync::Arc;
//!
//! let owner = Address::from([1u8; 20]);
//! let alice = Address::from([2u8; 20]);
//! let clock = Arc::new(ManualClock::new(0));
//! let token = DmtToken::new(TokenParams::with_owner(owner), clock.clone()).unwrap();
//!
//! token.claim(&alice).unwrap();
//! assert_eq!(token.balance_of(&alice), Amount::from_tokens(100));
//! assert!(!token.can_claim(&alice));
//! ```

pub mod clock;
pub mod config;
pub mod controller;
pub mod snapshot;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FaucetConfig, TokenParams};
pub use controller::{ClaimState, ClaimStatistics, FaucetController};
pub use snapshot::TokenSnapshot;
pub use token::{DmtToken, FaucetStatus};
