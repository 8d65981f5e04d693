use std::path::PathBuf;

use argh::FromArgs;
use toml::value::Table;

use crate::errors::{ConfigError, InitError};

#[derive(Debug, Clone, FromArgs)]
#[argh(description = "Claro dev node")]
pub struct Args {
    // Config non-overriding args
    #[argh(option, short = 'c', description = "path to configuration")]
    pub config: PathBuf,

    // Config overriding args
    /// Websocket RPC url that will override the url in the config toml.
    #[argh(option, description = "chain websocket rpc url")]
    pub ws_url: Option<String>,

    /// Epoch length in blocks that will override the config toml.
    #[argh(option, description = "epoch length in blocks")]
    pub epoch_length: Option<u64>,

    /// Consensus contract address that will override the config toml.
    #[argh(option, description = "consensus contract address")]
    pub consensus: Option<String>,

    /// Application contract address that will override the config toml.
    #[argh(option, description = "application contract address")]
    pub app: Option<String>,

    /// Run the built-in echo application.
    #[argh(switch, description = "run the built-in echo application")]
    pub echo_app: bool,

    /// Other generic overrides to the config toml.
    /// Will be used, for example, as `-o chain.sender=0x... -o rollup.inspect_poll_ms=50`
    #[argh(option, short = 'o', description = "generic config overrides")]
    pub overrides: Vec<String>,
}

impl Args {
    /// Get strings of overrides gathered from args.
    pub fn get_overrides(&self) -> Result<Vec<String>, InitError> {
        let mut overrides = self.overrides.clone();
        overrides.extend_from_slice(&self.get_direct_overrides());
        Ok(overrides)
    }

    /// Overrides passed directly as args and not as overrides.
    fn get_direct_overrides(&self) -> Vec<String> {
        let mut overrides = Vec::new();
        if let Some(ws_url) = &self.ws_url {
            overrides.push(format!("chain.ws_url={ws_url}"));
        }
        if let Some(epoch_length) = &self.epoch_length {
            overrides.push(format!("chain.epoch_length={epoch_length}"));
        }
        if let Some(consensus) = &self.consensus {
            overrides.push(format!("chain.consensus={consensus}"));
        }
        if let Some(app) = &self.app {
            overrides.push(format!("chain.app={app}"));
        }
        overrides
    }
}

type Override = (String, toml::Value);

/// Parses an override. This first splits the string by '=' to get key and value and then splits
/// the key by '.' which is the update path.
pub fn parse_override(override_str: &str) -> Result<Override, ConfigError> {
    let (key, value_str) = override_str
        .split_once("=")
        .ok_or(ConfigError::InvalidOverride(override_str.to_string()))?;
    Ok((key.to_string(), parse_value(value_str)))
}

/// Apply override to config.
pub fn apply_override(
    path: &str,
    value: toml::Value,
    table: &mut Table,
) -> Result<(), ConfigError> {
    match path.split_once(".") {
        None => {
            table.insert(path.to_string(), value);
            Ok(())
        }
        Some((key, rest)) => {
            if let Some(t) = table.get_mut(key).and_then(|v| v.as_table_mut()) {
                apply_override(rest, value, t)
            } else if table.contains_key(key) {
                Err(ConfigError::TraverseNonTableAt(key.to_string()))
            } else {
                Err(ConfigError::MissingKey(key.to_string()))
            }
        }
    }
}

/// Parses a string into a toml value. First tries as `i64`, then as `bool` and then defaults to
/// `String`.
fn parse_value(str_value: &str) -> toml::Value {
    str_value
        .parse::<i64>()
        .map(toml::Value::Integer)
        .or_else(|_| str_value.parse::<bool>().map(toml::Value::Boolean))
        .unwrap_or_else(|_| toml::Value::String(str_value.to_string()))
}
