use anyhow::Result;
use dmt_common::utils::config::load_config_with_env;
use dmt_faucet::FaucetConfig;
use std::path::Path;

/// File configuration with `DMT_*` overrides, or defaults plus environment
/// when no file is given.
pub fn load_faucet_config(path: Option<&Path>, debug: bool) -> Result<FaucetConfig> {
    let mut config = match path {
        Some(path) => load_config_with_env(path, "DMT")?,
        None => FaucetConfig::from_env(),
    };

    if debug {
        config.logging.level = "debug".to_string();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_config_with_debug_flag() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "symbol = \"TST\"\nfaucet_amount = \"5\"").unwrap();

        let config = load_faucet_config(Some(file.path()), true).unwrap();
        assert_eq!(config.symbol, "TST");
        assert_eq!(config.faucet_amount, "5");
        assert_eq!(config.logging.level, "debug");
    }
}
