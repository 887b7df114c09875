//! Index registry client
//!
//! Wraps the index program's instructions. The local basket cache is only
//! ever replaced by re-fetching the storage account after a confirmed
//! mutation; a failed call leaves it untouched. Nothing here retries.

use crate::config::Config;
use crate::error::{IndexerError, Result};
use crate::storage::{self, Basket};
use crate::tx_builder;
use crate::wallet;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
};

pub struct IndexRegistry {
    client: RpcClient,
    program_id: Pubkey,
    payer: Keypair,
    storage: Keypair,
    cache: Vec<Basket>,
}

impl IndexRegistry {
    pub fn new(client: RpcClient, program_id: Pubkey, payer: Keypair, storage: Keypair) -> Self {
        Self {
            client,
            program_id,
            payer,
            storage,
            cache: Vec::new(),
        }
    }

    /// Connect using the configured wallet and an existing storage keypair
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = wallet::load_keypair(&config.storage_keypair_path)?;
        Self::connect(config, storage)
    }

    /// Connect for initialization, generating the storage keypair on first use
    pub fn for_init(config: &Config) -> Result<Self> {
        let (storage, _created) = wallet::load_or_create_keypair(&config.storage_keypair_path)?;
        Self::connect(config, storage)
    }

    fn connect(config: &Config, storage: Keypair) -> Result<Self> {
        let payer = wallet::load_keypair(&config.keypair_path)?;
        let client =
            RpcClient::new_with_commitment(config.rpc_url.clone(), CommitmentConfig::confirmed());

        log::info!("Wallet: {}", payer.pubkey());
        log::info!("Storage account: {}", storage.pubkey());

        Ok(Self::new(client, config.index_program, payer, storage))
    }

    pub fn storage_account(&self) -> Pubkey {
        self.storage.pubkey()
    }

    pub fn wallet(&self) -> Pubkey {
        self.payer.pubkey()
    }

    /// Baskets as of the last successful fetch
    pub fn cached(&self) -> &[Basket] {
        &self.cache
    }

    pub fn find_cached(&self, name: &str) -> Option<&Basket> {
        self.cache.iter().find(|b| b.name == name)
    }

    /// Create the storage account owned by the index program
    pub async fn initialize_storage(&mut self) -> Result<Signature> {
        let ix = tx_builder::build_init_storage_instruction(
            &self.program_id,
            &self.storage.pubkey(),
            &self.payer.pubkey(),
        );

        let signature = self.submit(&[ix], &[&self.storage]).await?;
        log::info!("Storage account initialized: {}", signature);

        self.refresh_after_mutation().await;
        Ok(signature)
    }

    /// Store a named basket of price accounts
    pub async fn save_basket(&mut self, name: &str, account_ids: &[Pubkey]) -> Result<Signature> {
        if name.trim().is_empty() {
            return Err(IndexerError::config("basket name must not be empty"));
        }
        if account_ids.is_empty() {
            return Err(IndexerError::config("basket must contain at least one asset"));
        }

        // Measure against what is stored now, not the possibly stale cache
        let stored = self.fetch_baskets().await?;
        let basket = Basket::new(name, account_ids.to_vec());
        storage::check_capacity(&stored, &basket)?;

        let ix = tx_builder::build_save_basket_instruction(
            &self.program_id,
            &self.storage.pubkey(),
            name,
            account_ids,
        )?;

        let signature = self.submit(&[ix], &[]).await?;
        log::info!("Basket '{}' saved: {}", name, signature);

        self.refresh_after_mutation().await;
        Ok(signature)
    }

    /// Delete a basket by name. The program rejects unknown names.
    pub async fn delete_basket(&mut self, name: &str) -> Result<Signature> {
        let ix = tx_builder::build_delete_basket_instruction(
            &self.program_id,
            &self.storage.pubkey(),
            name,
        )?;

        let signature = self.submit(&[ix], &[]).await?;
        log::info!("Basket '{}' deleted: {}", name, signature);

        self.refresh_after_mutation().await;
        Ok(signature)
    }

    /// Read the baskets currently stored on-chain
    pub async fn fetch_baskets(&self) -> Result<Vec<Basket>> {
        let data = self.client.get_account_data(&self.storage.pubkey()).await?;
        storage::decode_storage(&data)
    }

    /// Replace the cache with a fresh fetch
    pub async fn refresh(&mut self) -> Result<&[Basket]> {
        self.cache = self.fetch_baskets().await?;
        Ok(&self.cache)
    }

    async fn refresh_after_mutation(&mut self) {
        if let Err(e) = self.refresh().await {
            log::warn!("Transaction confirmed but refreshing baskets failed: {}", e);
        }
    }

    async fn submit(&self, instructions: &[Instruction], extra_signers: &[&Keypair]) -> Result<Signature> {
        let recent_blockhash = self.client.get_latest_blockhash().await?;
        let transaction = tx_builder::build_transaction(
            instructions,
            &self.payer,
            extra_signers,
            recent_blockhash,
        );

        let signature = self.client.send_and_confirm_transaction(&transaction).await?;
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_registry() -> IndexRegistry {
        let client = RpcClient::new("http://127.0.0.1:1".to_string());
        IndexRegistry::new(client, Pubkey::new_unique(), Keypair::new(), Keypair::new())
    }

    fn write_keypair(path: &std::path::Path) {
        let keypair = Keypair::new();
        std::fs::write(path, serde_json::to_string(&keypair.to_bytes().to_vec()).unwrap()).unwrap();
    }

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default_localnet();
        config.keypair_path = dir.join("id.json").to_string_lossy().into_owned();
        config.storage_keypair_path = dir.join("storage.json").to_string_lossy().into_owned();
        config
    }

    #[test]
    fn test_from_config_without_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_keypair(&dir.path().join("storage.json"));

        let err = IndexRegistry::from_config(&config).err().unwrap();
        assert!(matches!(err, IndexerError::WalletUnavailable { .. }));
    }

    #[test]
    fn test_only_init_creates_storage_keypair() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        write_keypair(&dir.path().join("id.json"));
        let storage_path = dir.path().join("storage.json");

        let err = IndexRegistry::from_config(&config).err().unwrap();
        assert!(matches!(err, IndexerError::WalletUnavailable { .. }));
        assert!(!storage_path.exists());

        let registry = IndexRegistry::for_init(&config).unwrap();
        assert!(storage_path.exists());

        let reopened = IndexRegistry::from_config(&config).unwrap();
        assert_eq!(reopened.storage_account(), registry.storage_account());
    }

    #[tokio::test]
    async fn test_save_rejects_empty_input_before_rpc() {
        let mut registry = offline_registry();

        let err = registry.save_basket("", &[Pubkey::new_unique()]).await.unwrap_err();
        assert!(matches!(err, IndexerError::Configuration(_)));

        let err = registry.save_basket("majors", &[]).await.unwrap_err();
        assert!(matches!(err, IndexerError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_failed_call_leaves_cache_unchanged() {
        let mut registry = offline_registry();
        assert!(registry.cached().is_empty());

        let err = registry
            .save_basket("majors", &[Pubkey::new_unique()])
            .await
            .unwrap_err();

        // Fails reading current storage, before any transaction is sent
        assert!(matches!(err, IndexerError::RemoteCall(_)));
        assert!(registry.cached().is_empty());
        assert!(registry.find_cached("majors").is_none());
    }
}
