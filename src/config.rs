//! Configuration module for the marketplace client
//!
//! This module handles configuration loading from TOML files, `.env` files
//! and `MARKET_*` environment variables. Defaults point at the public
//! deployment of the marketplace program.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use thiserror::Error;

use crate::state::DiscriminatorPolicy;

pub const DEFAULT_PROGRAM_ID: &str = "C48to8F9VJSrsAjNQrefoF5ZhP54CdKA4xxYy1QTzNTe";
pub const DEFAULT_TOKEN_MINT: &str = "8EoML7gaBJsgJtepm25wq3GuUCqLYHBoqd3HP1JxtyBx";

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "MARKET_";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("Invalid commitment level: {0}")]
    InvalidCommitment(String),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Main client configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub program: ProgramConfig,

    #[serde(default)]
    pub decoder: DecoderConfig,

    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// processed, confirmed or finalized
    #[serde(default = "default_commitment")]
    pub commitment: String,

    /// Request timeout in seconds
    #[serde(default = "default_rpc_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    #[serde(default = "default_program_id")]
    pub program_id: String,

    /// Marketplace fungible token used when `by_token` is set
    #[serde(default = "default_token_mint")]
    pub token_mint: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecoderConfig {
    #[serde(default)]
    pub discriminator_policy: DiscriminatorPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
}

// Default value functions
fn default_rpc_url() -> String { "https://api.mainnet-beta.solana.com".to_string() }
fn default_commitment() -> String { "confirmed".to_string() }
fn default_rpc_timeout() -> u64 { 30 }
fn default_program_id() -> String { DEFAULT_PROGRAM_ID.to_string() }
fn default_token_mint() -> String { DEFAULT_TOKEN_MINT.to_string() }
fn default_true() -> bool { true }

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            commitment: default_commitment(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            program_id: default_program_id(),
            token_mint: default_token_mint(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: default_true(),
        }
    }
}

fn parse_address(field: &'static str, value: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(value.trim()).map_err(|_| ConfigError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

impl MarketConfig {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: MarketConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with `.env` and environment variable overrides
    ///
    /// A missing file falls back to defaults; overrides apply either way.
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = if std::path::Path::new(path).exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content)?
        } else {
            tracing::debug!(path = %path, "Config file not found, using defaults");
            MarketConfig::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MARKET_*` overrides from an arbitrary lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(url) = var("RPC_URL") {
            self.rpc.rpc_url = url;
        }
        if let Some(commitment) = var("COMMITMENT") {
            self.rpc.commitment = commitment;
        }
        if let Some(timeout) = var("TIMEOUT_SECS") {
            self.rpc.timeout_secs = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                field: "timeout_secs",
                value: timeout.clone(),
            })?;
        }
        if let Some(program_id) = var("PROGRAM_ID") {
            self.program.program_id = program_id;
        }
        if let Some(mint) = var("TOKEN_MINT") {
            self.program.token_mint = mint;
        }
        if let Some(policy) = var("DISCRIMINATOR_POLICY") {
            self.decoder.discriminator_policy = match policy.to_lowercase().as_str() {
                "skip" => DiscriminatorPolicy::Skip,
                "verify" => DiscriminatorPolicy::Verify,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        field: "discriminator_policy",
                        value: policy,
                    })
                }
            };
        }
        if let Some(flag) = var("ENABLE_METRICS") {
            self.monitoring.enable_metrics =
                flag.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "enable_metrics",
                    value: flag.clone(),
                })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.program_id()?;
        self.token_mint()?;
        self.commitment()?;
        if self.rpc.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_secs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn program_id(&self) -> Result<Pubkey, ConfigError> {
        parse_address("program_id", &self.program.program_id)
    }

    pub fn token_mint(&self) -> Result<Pubkey, ConfigError> {
        parse_address("token_mint", &self.program.token_mint)
    }

    pub fn commitment(&self) -> Result<CommitmentConfig, ConfigError> {
        CommitmentConfig::from_str(&self.rpc.commitment)
            .map_err(|_| ConfigError::InvalidCommitment(self.rpc.commitment.clone()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_secs)
    }

    pub fn discriminator_policy(&self) -> DiscriminatorPolicy {
        self.decoder.discriminator_policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = MarketConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.program_id().unwrap().to_string(), DEFAULT_PROGRAM_ID);
        assert_eq!(config.token_mint().unwrap().to_string(), DEFAULT_TOKEN_MINT);
        assert_eq!(config.discriminator_policy(), DiscriminatorPolicy::Skip);
        assert_eq!(config.commitment().unwrap(), CommitmentConfig::confirmed());
    }

    #[test]
    fn test_from_file_partial_sections() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[rpc]
rpc_url = "http://localhost:8899"
timeout_secs = 5

[decoder]
discriminator_policy = "verify"
"#
        )
        .unwrap();

        let config = MarketConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.rpc.rpc_url, "http://localhost:8899");
        assert_eq!(config.rpc.timeout_secs, 5);
        assert_eq!(config.rpc.commitment, "confirmed");
        assert_eq!(config.discriminator_policy(), DiscriminatorPolicy::Verify);
        assert_eq!(config.program.program_id, DEFAULT_PROGRAM_ID);
    }

    #[test]
    fn test_from_file_rejects_malformed_address() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[program]\nprogram_id = \"not-a-key\"").unwrap();
        assert!(MarketConfig::from_file(file.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("MARKET_RPC_URL", "http://override:8899"),
            ("MARKET_COMMITMENT", "finalized"),
            ("MARKET_DISCRIMINATOR_POLICY", "Verify"),
            ("MARKET_ENABLE_METRICS", "false"),
        ]);
        let mut config = MarketConfig::default();
        config
            .apply_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.rpc.rpc_url, "http://override:8899");
        assert_eq!(config.commitment().unwrap(), CommitmentConfig::finalized());
        assert_eq!(config.discriminator_policy(), DiscriminatorPolicy::Verify);
        assert!(!config.monitoring.enable_metrics);
    }

    #[test]
    fn test_env_override_bad_values() {
        let mut config = MarketConfig::default();
        let err = config
            .apply_overrides(|key| (key == "MARKET_TIMEOUT_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                field: "timeout_secs",
                value: "soon".to_string()
            }
        );

        config.program.token_mint = "xyz".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAddress { field: "token_mint", .. })
        ));
    }

    #[test]
    fn test_bad_commitment() {
        let mut config = MarketConfig::default();
        config.rpc.commitment = "eventually".to_string();
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidCommitment("eventually".to_string()))
        );
    }
}
