//! Indexer configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Index program deployed on devnet
pub const INDEX_PROGRAM_ID: &str = "CxqWzWVdHG9YffvaRUaMnbbeyb7XoHNtxzLNaUpkoyyx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Devnet,
    Localnet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster the endpoints point at
    pub cluster: Cluster,

    /// RPC URL for Solana cluster
    pub rpc_url: String,

    /// WebSocket URL for oracle account subscriptions
    pub ws_url: String,

    /// Index program ID
    #[serde(with = "pubkey_str")]
    pub index_program: Pubkey,

    /// Wallet keypair path (fee payer and signer)
    pub keypair_path: String,

    /// Storage account keypair path, created on `init` if missing
    pub storage_keypair_path: String,

    /// Seconds between monitoring cycles
    pub cycle_interval_secs: u64,

    /// Matching samples per basket account for a complete cycle
    pub samples_per_account: usize,

    /// Completed cycles of samples retained before trimming
    pub retention_multiplier: usize,
}

impl Config {
    /// Load configuration from TOML file
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("INDEXER_CONFIG")
            .unwrap_or_else(|_| "indexer-config.toml".to_string());

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &str) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&config_str).context("Failed to parse config TOML")?;
        config.validate()?;

        Ok(config)
    }

    /// Reject values that would make a monitoring cycle meaningless
    pub fn validate(&self) -> Result<()> {
        if self.cycle_interval_secs == 0 {
            anyhow::bail!("cycle_interval_secs must be positive");
        }
        if self.samples_per_account == 0 {
            anyhow::bail!("samples_per_account must be positive");
        }
        if self.retention_multiplier == 0 {
            anyhow::bail!("retention_multiplier must be positive");
        }
        Ok(())
    }

    /// Create default configuration
    pub fn default_devnet() -> Self {
        Self {
            cluster: Cluster::Devnet,
            rpc_url: "https://api.devnet.solana.com".to_string(),
            ws_url: "wss://api.devnet.solana.com".to_string(),
            index_program: Pubkey::from_str(INDEX_PROGRAM_ID).unwrap_or_default(),
            keypair_path: "~/.config/solana/id.json".to_string(),
            storage_keypair_path: "~/.config/pyth-indexer/storage.json".to_string(),
            cycle_interval_secs: 30,
            samples_per_account: 2,
            retention_multiplier: 2,
        }
    }

    /// Local test validator endpoints, same program and cadence
    pub fn default_localnet() -> Self {
        Self {
            cluster: Cluster::Localnet,
            rpc_url: "http://127.0.0.1:8899".to_string(),
            ws_url: "ws://127.0.0.1:8900".to_string(),
            ..Self::default_devnet()
        }
    }

    /// Write default config to file
    pub fn write_default(path: &str, cluster: Cluster) -> Result<()> {
        let config = match cluster {
            Cluster::Devnet => Self::default_devnet(),
            Cluster::Localnet => Self::default_localnet(),
        };
        let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

        std::fs::write(path, toml_str).context(format!("Failed to write config to {}", path))?;

        log::info!("Created default config at {}", path);
        Ok(())
    }
}

/// Pubkeys as base58 strings in the TOML file
mod pubkey_str {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(D::Error::custom)
    }
}
