//! Token and faucet configuration

use dmt_common::utils::logging::LoggingConfig;
use dmt_common::{parse_units, Address, Amount, LedgerError, Result};
use dmt_ledger::TokenMetadata;
use serde::{Deserialize, Serialize};

/// Seed for the default pool account
pub const DEFAULT_POOL_SEED: &[u8] = b"dmt:pool";

/// Seed for the placeholder owner account
pub const DEFAULT_OWNER_SEED: &[u8] = b"dmt:owner";

/// Construction-time configuration, in human units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaucetConfig {
    /// Token display name
    pub name: String,

    /// Token symbol
    pub symbol: String,

    /// Total supply in tokens, credited to the pool at creation
    pub initial_supply: String,

    /// Owner account (hex)
    pub owner: String,

    /// Pool account (hex); derived from a fixed seed when absent
    pub pool_address: Option<String>,

    /// Amount granted per claim, in tokens
    pub faucet_amount: String,

    /// Cooldown period between claims of one account (seconds)
    pub cooldown_secs: u64,

    /// Logging
    pub logging: LoggingConfig,
}

impl Default for FaucetConfig {
    fn default() -> Self {
        Self {
            name: "Davi Mota Token".to_string(),
            symbol: "DMT".to_string(),
            initial_supply: "1000000".to_string(),
            owner: Address::derive(DEFAULT_OWNER_SEED).to_hex(),
            pool_address: None,
            faucet_amount: "100".to_string(),
            cooldown_secs: 86400, // 24 hours
            logging: LoggingConfig::default(),
        }
    }
}

impl FaucetConfig {
    /// Load from environment variables with defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overlay `DMT_*` environment variables onto this configuration.
    pub fn apply_env(&mut self) {
        if let Ok(name) = std::env::var("DMT_NAME") {
            self.name = name;
        }

        if let Ok(symbol) = std::env::var("DMT_SYMBOL") {
            self.symbol = symbol;
        }

        if let Ok(supply) = std::env::var("DMT_INITIAL_SUPPLY") {
            self.initial_supply = supply;
        }

        if let Ok(owner) = std::env::var("DMT_OWNER") {
            self.owner = owner;
        }

        if let Ok(pool) = std::env::var("DMT_POOL_ADDRESS") {
            self.pool_address = Some(pool);
        }

        if let Ok(amount) = std::env::var("DMT_FAUCET_AMOUNT") {
            self.faucet_amount = amount;
        }

        if let Ok(cooldown) = std::env::var("DMT_COOLDOWN_SECS") {
            self.cooldown_secs = cooldown.parse().unwrap_or(self.cooldown_secs);
        }

        if let Ok(level) = std::env::var("DMT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Validate and convert into typed construction parameters.
    pub fn to_params(&self) -> Result<TokenParams> {
        let owner = parse_address("owner", &self.owner)?;
        let pool = match &self.pool_address {
            Some(hex) => parse_address("pool_address", hex)?,
            None => Address::derive(DEFAULT_POOL_SEED),
        };

        let params = TokenParams {
            metadata: TokenMetadata::new(self.name.clone(), self.symbol.clone()),
            initial_supply: parse_amount("initial_supply", &self.initial_supply)?,
            owner,
            pool,
            faucet_amount: parse_amount("faucet_amount", &self.faucet_amount)?,
            cooldown_secs: self.cooldown_secs,
        };
        params.validate()?;
        Ok(params)
    }
}

/// Typed construction parameters, amounts in base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParams {
    pub metadata: TokenMetadata,
    pub initial_supply: Amount,
    pub owner: Address,
    pub pool: Address,
    pub faucet_amount: Amount,
    pub cooldown_secs: u64,
}

impl TokenParams {
    /// Parameters matching the default deployment: 1,000,000 supply,
    /// 100 per claim, 24 hour cooldown.
    pub fn with_owner(owner: Address) -> Self {
        Self {
            metadata: TokenMetadata::new("Davi Mota Token", "DMT"),
            initial_supply: Amount::from_tokens(1_000_000),
            owner,
            pool: Address::derive(DEFAULT_POOL_SEED),
            faucet_amount: Amount::from_tokens(100),
            cooldown_secs: 86400,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner == self.pool {
            return Err(LedgerError::Config(
                "owner and pool must be different accounts".to_string(),
            ));
        }
        if self.metadata.symbol.is_empty() {
            return Err(LedgerError::Config("symbol must not be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_address(field: &str, value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|e| LedgerError::Config(format!("{}: {}", field, e)))
}

fn parse_amount(field: &str, value: &str) -> Result<Amount> {
    parse_units(value).map_err(|e| LedgerError::Config(format!("{}: {}", field, e)))
}
