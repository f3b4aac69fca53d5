use clap::{Parser, Subcommand};
use dmt_common::{parse_units, Address, Amount};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dmt")]
#[command(about = "DMT token ledger and faucet", long_about = None)]
pub struct Cli {
    /// Path to the ledger state file
    #[arg(short, long, value_name = "FILE", default_value = "dmt-state.json", env = "DMT_STATE")]
    pub state: PathBuf,

    /// Path to the configuration file (used by `init` and for logging)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new ledger with the whole supply in the pool
    Init {
        /// Owner account, overriding the configuration
        #[arg(long)]
        owner: Option<Address>,

        /// Replace an existing state file
        #[arg(long)]
        force: bool,
    },

    /// Show token metadata and faucet parameters
    Info,

    /// Show faucet pool and claim statistics
    Status,

    /// Balance of an account
    Balance { account: Address },

    /// Remaining allowance of SPENDER over OWNER's balance
    Allowance { owner: Address, spender: Address },

    /// Transfer tokens from the caller
    Transfer {
        #[arg(long = "from")]
        caller: Address,
        to: Address,
        #[arg(value_parser = parse_token_amount)]
        amount: Amount,
    },

    /// Set a spender's allowance over the caller's balance
    Approve {
        #[arg(long = "from")]
        caller: Address,
        spender: Address,
        #[arg(value_parser = parse_token_amount)]
        amount: Amount,
    },

    /// Spend an allowance: move tokens from FROM to TO as the spender
    TransferFrom {
        #[arg(long = "spender")]
        caller: Address,
        from: Address,
        to: Address,
        #[arg(value_parser = parse_token_amount)]
        amount: Amount,
    },

    /// Claim the faucet amount
    Claim { account: Address },

    /// Whether an account may claim now, and if not, when
    CanClaim { account: Address },

    /// Change the amount paid per claim (owner only)
    SetFaucetAmount {
        #[arg(long)]
        caller: Address,
        #[arg(value_parser = parse_token_amount)]
        amount: Amount,
    },

    /// Change the claim cooldown in seconds (owner only)
    SetCooldown {
        #[arg(long)]
        caller: Address,
        secs: u64,
    },

    /// Move tokens from the owner into the pool (owner only)
    Refill {
        #[arg(long)]
        caller: Address,
        #[arg(value_parser = parse_token_amount)]
        amount: Amount,
    },

    /// Move tokens from the pool to the owner (owner only)
    Withdraw {
        #[arg(long)]
        caller: Address,
        #[arg(value_parser = parse_token_amount)]
        amount: Amount,
    },
}

impl Commands {
    /// Whether the command changes ledger state and must be written back.
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            Commands::Transfer { .. }
                | Commands::Approve { .. }
                | Commands::TransferFrom { .. }
                | Commands::Claim { .. }
                | Commands::SetFaucetAmount { .. }
                | Commands::SetCooldown { .. }
                | Commands::Refill { .. }
                | Commands::Withdraw { .. }
        )
    }
}

/// Token amounts on the command line are in whole tokens, e.g. `12.5`.
fn parse_token_amount(s: &str) -> Result<Amount, String> {
    parse_units(s)
}
