use std::path::Path;

use alloy::primitives::{address, Address};
use serde::Deserialize;

use crate::{
    args::{apply_override, parse_override, Args},
    errors::InitError,
};

/// Default unlocked sender, the first anvil dev account.
const DEFAULT_SENDER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub chain: ChainConfig,
    #[serde(default)]
    pub rollup: RollupConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    pub ws_url: String,

    /// Unlocked account transactions are sent from.
    #[serde(default = "default_sender")]
    pub sender: Address,

    /// Consensus contract; bootstrapped through the factories when absent.
    pub consensus: Option<Address>,

    /// Application contract the claims are for; bootstrapped when absent.
    pub app: Option<Address>,

    /// Factory addresses used only by the devnet bootstrap.
    pub authority_factory: Option<Address>,
    pub application_factory: Option<Address>,

    #[serde(default = "default_epoch_length")]
    pub epoch_length: u64,

    #[serde(default = "default_resubscribe_backoff_ms")]
    pub resubscribe_backoff_ms: u64,

    #[serde(default = "default_max_catch_up")]
    pub max_catch_up: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RollupConfig {
    /// Interval between inspect completion polls.
    #[serde(default = "default_inspect_poll_ms")]
    pub inspect_poll_ms: u64,

    /// Runs the built-in echo application against the model.
    #[serde(default)]
    pub echo_app: bool,
}

impl Default for RollupConfig {
    fn default() -> Self {
        Self {
            inspect_poll_ms: default_inspect_poll_ms(),
            echo_app: false,
        }
    }
}

fn default_sender() -> Address {
    DEFAULT_SENDER
}

fn default_epoch_length() -> u64 {
    10
}

fn default_resubscribe_backoff_ms() -> u64 {
    1_000
}

fn default_max_catch_up() -> u64 {
    128
}

fn default_inspect_poll_ms() -> u64 {
    33
}

/// Loads the config file and applies the arg overrides on the raw toml
/// before deserializing.
pub fn load_config(path: &Path, args: &Args) -> Result<Config, InitError> {
    let raw = std::fs::read_to_string(path)?;
    let mut table: toml::value::Table = toml::from_str(&raw)?;

    for override_str in args.get_overrides()? {
        let (key, value) = parse_override(&override_str)?;
        apply_override(&key, value, &mut table)?;
    }

    let mut config: Config = toml::Value::Table(table).try_into()?;
    // Switch, not an override path, so absent [rollup] tables still work.
    config.rollup.echo_app |= args.echo_app;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            config: "unused.toml".into(),
            ws_url: None,
            epoch_length: None,
            consensus: None,
            app: None,
            echo_app: false,
            overrides: vec![],
        }
    }

    fn parse(raw: &str, args: &Args) -> Config {
        let mut table: toml::value::Table = toml::from_str(raw).unwrap();
        for override_str in args.get_overrides().unwrap() {
            let (key, value) = parse_override(&override_str).unwrap();
            apply_override(&key, value, &mut table).unwrap();
        }
        toml::Value::Table(table).try_into().unwrap()
    }

    const MINIMAL: &str = r#"
        [chain]
        ws_url = "ws://127.0.0.1:8545"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL, &base_args());
        assert_eq!(config.chain.epoch_length, 10);
        assert_eq!(config.chain.sender, DEFAULT_SENDER);
        assert_eq!(config.rollup.inspect_poll_ms, 33);
        assert!(!config.rollup.echo_app);
        assert!(config.chain.consensus.is_none());
    }

    #[test]
    fn args_override_file_values() {
        let mut args = base_args();
        args.epoch_length = Some(20);
        args.consensus = Some("0x5050F233F2312B1636eb7CF6c7876D9cC6ac4785".to_string());

        let config = parse(MINIMAL, &args);
        assert_eq!(config.chain.epoch_length, 20);
        assert_eq!(
            config.chain.consensus,
            Some(address!("5050F233F2312B1636eb7CF6c7876D9cC6ac4785"))
        );
    }
}
