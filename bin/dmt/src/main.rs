mod cli;
mod config_loader;
mod state_file;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use dmt_common::utils::logging::init_logging;
use dmt_common::{format_units, Amount, LedgerError};
use dmt_faucet::{ClaimState, Clock, DmtToken, SystemClock};
use serde_json::json;
use state_file::StateLock;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one command, as text for people and JSON for scripts.
#[derive(Debug)]
struct Outcome {
    message: String,
    data: serde_json::Value,
}

impl Outcome {
    fn new(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }
}

fn main() -> Result<()> {
    // 1. Parse CLI
    let args = Cli::parse();

    // 2. Load config and set up logging
    let config = config_loader::load_faucet_config(args.config.as_deref(), args.debug)?;
    init_logging(&config.logging).map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // 3. Create a fresh ledger, or run one command against the existing one
    let outcome = match &args.command {
        Commands::Init { owner, force } => {
            let mut params = config.to_params().context("Invalid token configuration")?;
            if let Some(owner) = owner {
                params.owner = *owner;
            }

            let token = DmtToken::new(params, clock)?;
            let _lock = StateLock::acquire(&args.state)?;
            state_file::create(&args.state, &token.snapshot(), *force)?;
            info!("Initialized ledger at {:?}", args.state);
            token_info(&token)
        }
        command => run(&args.state, command, clock)?,
    };

    print_outcome(&outcome, args.json)
}

/// Load the state file, apply `command` and write the state back if it
/// succeeded and changed something. The state lock is held throughout.
fn run(state: &Path, command: &Commands, clock: Arc<dyn Clock>) -> Result<Outcome> {
    let _lock = StateLock::acquire(state)?;

    let token = DmtToken::from_snapshot(state_file::load(state)?, clock)?;

    let outcome = execute(&token, command).map_err(|err| {
        if let Some(rejected) = err.downcast_ref::<LedgerError>().filter(|e| e.is_precondition()) {
            warn!("Operation rejected, state file left untouched: {}", rejected);
        }
        err
    })?;

    if command.is_mutating() {
        state_file::save(state, &token.snapshot())?;
    } else {
        debug!("Read-only command, state file left untouched");
    }

    Ok(outcome)
}

fn execute(token: &DmtToken, command: &Commands) -> Result<Outcome> {
    let symbol = token.symbol();
    let units = |amount: &Amount| format!("{} {}", format_units(amount), symbol);

    let outcome = match command {
        Commands::Init { .. } => bail!("`init` cannot run against an existing state file"),

        Commands::Info => token_info(token),

        Commands::Status => {
            let status = token.status();
            Outcome::new(
                format!(
                    "Pool {} holds {}\n{} claims by {} accounts, {} dispensed",
                    status.pool_address,
                    units(&status.pool_balance),
                    status.total_claims,
                    status.unique_claimants,
                    units(&status.total_dispensed),
                ),
                serde_json::to_value(&status)?,
            )
        }

        Commands::Balance { account } => {
            let balance = token.balance_of(account);
            Outcome::new(
                format!("{}: {}", account, units(&balance)),
                json!({ "account": account, "balance": balance }),
            )
        }

        Commands::Allowance { owner, spender } => {
            let allowance = token.allowance(owner, spender);
            Outcome::new(
                format!("{} may spend {} for {}", spender, units(&allowance), owner),
                json!({ "owner": owner, "spender": spender, "allowance": allowance }),
            )
        }

        Commands::Transfer { caller, to, amount } => {
            token.transfer(caller, to, amount)?;
            Outcome::new(
                format!("Transferred {} from {} to {}", units(amount), caller, to),
                json!({ "from": caller, "to": to, "amount": amount }),
            )
        }

        Commands::Approve { caller, spender, amount } => {
            token.approve(caller, spender, amount)?;
            Outcome::new(
                format!("{} may now spend {} for {}", spender, units(amount), caller),
                json!({ "owner": caller, "spender": spender, "allowance": amount }),
            )
        }

        Commands::TransferFrom { caller, from, to, amount } => {
            token.transfer_from(caller, from, to, amount)?;
            let remaining = token.allowance(from, caller);
            Outcome::new(
                format!(
                    "Transferred {} from {} to {} ({} allowance left)",
                    units(amount),
                    from,
                    to,
                    units(&remaining)
                ),
                json!({
                    "spender": caller,
                    "from": from,
                    "to": to,
                    "amount": amount,
                    "remaining_allowance": remaining,
                }),
            )
        }

        Commands::Claim { account } => {
            let paid = token.claim(account)?;
            let next = token.time_until_next_claim(account);
            Outcome::new(
                format!("{} claimed {}; next claim in {}s", account, units(&paid), next),
                json!({ "account": account, "amount": paid, "next_claim_in_secs": next }),
            )
        }

        Commands::CanClaim { account } => {
            let state = token.claim_state(account);
            let message = match state {
                ClaimState::Eligible => format!("{} can claim now", account),
                ClaimState::Cooling { remaining_secs } => {
                    format!("{} can claim again in {}s", account, remaining_secs)
                }
            };
            Outcome::new(
                message,
                json!({
                    "account": account,
                    "can_claim": state == ClaimState::Eligible,
                    "time_until_next_claim": token.time_until_next_claim(account),
                    "last_claim": token.last_claim(account),
                }),
            )
        }

        Commands::SetFaucetAmount { caller, amount } => {
            token.set_faucet_amount(caller, amount.clone())?;
            Outcome::new(
                format!("Faucet amount set to {}", units(amount)),
                json!({ "faucet_amount": amount }),
            )
        }

        Commands::SetCooldown { caller, secs } => {
            token.set_cooldown_time(caller, *secs)?;
            Outcome::new(
                format!("Cooldown set to {}s", secs),
                json!({ "cooldown_secs": secs }),
            )
        }

        Commands::Refill { caller, amount } => {
            token.refill_faucet(caller, amount)?;
            let pool = token.faucet_balance();
            Outcome::new(
                format!("Pool refilled with {}, now holds {}", units(amount), units(&pool)),
                json!({ "amount": amount, "pool_balance": pool }),
            )
        }

        Commands::Withdraw { caller, amount } => {
            token.withdraw_from_faucet(caller, amount)?;
            let pool = token.faucet_balance();
            Outcome::new(
                format!("Withdrew {} from the pool, {} left", units(amount), units(&pool)),
                json!({ "amount": amount, "pool_balance": pool }),
            )
        }
    };

    Ok(outcome)
}

fn token_info(token: &DmtToken) -> Outcome {
    let symbol = token.symbol();
    let total_supply = token.total_supply();
    let faucet_amount = token.faucet_amount();

    Outcome::new(
        format!(
            "{} ({}), {} decimals\nTotal supply: {} {}\nOwner: {}\nPool: {} ({} {})\nFaucet: {} {} every {}s",
            token.name(),
            symbol,
            token.decimals(),
            format_units(&total_supply),
            symbol,
            token.owner(),
            token.pool_address(),
            format_units(&token.faucet_balance()),
            symbol,
            format_units(&faucet_amount),
            symbol,
            token.cooldown_time(),
        ),
        json!({
            "name": token.name(),
            "symbol": symbol,
            "decimals": token.decimals(),
            "total_supply": total_supply,
            "owner": token.owner(),
            "pool_address": token.pool_address(),
            "faucet_balance": token.faucet_balance(),
            "faucet_amount": faucet_amount,
            "cooldown_secs": token.cooldown_time(),
        }),
    )
}

fn print_outcome(outcome: &Outcome, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome.data)?);
    } else {
        println!("{}", outcome.message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dmt_common::Address;
    use dmt_faucet::{ManualClock, TokenParams, TokenSnapshot};
    use std::fs;
    use std::path::PathBuf;

    const DAY: u64 = 24 * 60 * 60;

    fn addr(b: u8) -> Address {
        Address::from([b; 20])
    }

    fn init_state(dir: &Path) -> (PathBuf, Arc<ManualClock>) {
        let path = dir.join("state.json");
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let token = DmtToken::new(TokenParams::with_owner(addr(1)), clock.clone()).unwrap();
        state_file::create(&path, &token.snapshot(), false).unwrap();
        (path, clock)
    }

    fn reload(path: &Path) -> TokenSnapshot {
        state_file::load(path).unwrap()
    }

    fn ledger_error(err: &anyhow::Error) -> &LedgerError {
        err.downcast_ref::<LedgerError>().unwrap()
    }

    #[test]
    fn test_claim_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let (path, clock) = init_state(dir.path());

        let outcome = run(&path, &Commands::Claim { account: addr(2) }, clock.clone()).unwrap();
        assert_eq!(outcome.data["next_claim_in_secs"], DAY);

        let snapshot = reload(&path);
        assert_eq!(snapshot.balances[&addr(2)], Amount::from_tokens(100));
        assert_eq!(snapshot.last_claims[&addr(2)], 1_700_000_000);
        assert_eq!(snapshot.statistics.total_claims, 1);
    }

    #[test]
    fn test_rejected_claim_leaves_state_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let (path, clock) = init_state(dir.path());

        run(&path, &Commands::Claim { account: addr(2) }, clock.clone()).unwrap();
        let before = fs::read(&path).unwrap();

        clock.advance(60);
        let err = run(&path, &Commands::Claim { account: addr(2) }, clock.clone()).unwrap_err();
        assert!(matches!(ledger_error(&err), LedgerError::CooldownNotElapsed { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_non_owner_withdraw_leaves_state_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let (path, clock) = init_state(dir.path());
        let before = fs::read(&path).unwrap();

        let command = Commands::Withdraw {
            caller: addr(9),
            amount: Amount::from_tokens(10),
        };
        let err = run(&path, &command, clock).unwrap_err();
        assert_eq!(ledger_error(&err), &LedgerError::Unauthorized(addr(9)));
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_owner_commands_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let (path, clock) = init_state(dir.path());
        let owner = addr(1);

        let withdraw = Commands::Withdraw {
            caller: owner,
            amount: Amount::from_tokens(1_000),
        };
        run(&path, &withdraw, clock.clone()).unwrap();

        let approve = Commands::Approve {
            caller: owner,
            spender: addr(2),
            amount: Amount::from_tokens(500),
        };
        run(&path, &approve, clock.clone()).unwrap();

        let transfer_from = Commands::TransferFrom {
            caller: addr(2),
            from: owner,
            to: addr(3),
            amount: Amount::from_tokens(300),
        };
        let outcome = run(&path, &transfer_from, clock.clone()).unwrap();
        assert_eq!(outcome.data["remaining_allowance"], Amount::from_tokens(200).to_string());

        run(&path, &Commands::SetCooldown { caller: owner, secs: 60 }, clock.clone()).unwrap();

        let snapshot = reload(&path);
        assert_eq!(snapshot.balances[&addr(3)], Amount::from_tokens(300));
        assert_eq!(snapshot.balances[&owner], Amount::from_tokens(700));
        assert_eq!(snapshot.allowances[&owner][&addr(2)], Amount::from_tokens(200));
        assert_eq!(snapshot.cooldown_secs, 60);
    }

    #[test]
    fn test_read_only_commands_do_not_write() {
        let dir = tempfile::tempdir().unwrap();
        let (path, clock) = init_state(dir.path());
        let before = fs::metadata(&path).unwrap().modified().unwrap();

        let outcome = run(&path, &Commands::Balance { account: addr(2) }, clock.clone()).unwrap();
        assert_eq!(outcome.data["balance"], "0");
        let outcome = run(&path, &Commands::CanClaim { account: addr(2) }, clock).unwrap();
        assert_eq!(outcome.data["can_claim"], true);

        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_init_command_is_rejected_by_execute() {
        let clock = Arc::new(ManualClock::new(0));
        let token = DmtToken::new(TokenParams::with_owner(addr(1)), clock).unwrap();
        let command = Commands::Init { owner: None, force: false };
        assert!(execute(&token, &command).is_err());
    }

    #[test]
    fn test_concurrent_runs_keep_every_claim() {
        let dir = tempfile::tempdir().unwrap();
        let (path, clock) = init_state(dir.path());

        let results: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0u8..16)
                .map(|i| {
                    let (path, clock) = (&path, clock.clone());
                    s.spawn(move || run(path, &Commands::Claim { account: addr(100 + i) }, clock).is_ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.iter().all(|ok| *ok));
        let snapshot = reload(&path);
        assert_eq!(snapshot.statistics.total_claims, 16);
        assert_eq!(snapshot.last_claims.len(), 16);
        assert_eq!(
            snapshot.balances[&snapshot.pool_address],
            Amount::from_tokens(1_000_000 - 16 * 100)
        );
    }

    #[test]
    fn test_concurrent_runs_same_account_claim_once() {
        let dir = tempfile::tempdir().unwrap();
        let (path, clock) = init_state(dir.path());
        let account = addr(2);

        let successes = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let (path, clock) = (&path, clock.clone());
                    s.spawn(move || run(path, &Commands::Claim { account }, clock).is_ok())
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(successes, 1);
        let snapshot = reload(&path);
        assert_eq!(snapshot.balances[&account], Amount::from_tokens(100));
        assert_eq!(snapshot.statistics.total_claims, 1);
    }
}
