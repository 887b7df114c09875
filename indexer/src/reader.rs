//! One-shot oracle reads over RPC
//!
//! Fetches a single price account, or walks a Pyth mapping account's linked
//! list and resolves every product it lists.

use crate::config::Config;
use crate::error::Result;
use crate::oracle::{self, PriceUpdate, ProductListing};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{commitment_config::CommitmentConfig, pubkey::Pubkey};
use std::collections::HashSet;

/// Accounts per `getMultipleAccounts` request
const MAX_MULTIPLE_ACCOUNTS: usize = 100;

pub struct OracleReader {
    client: RpcClient,
}

impl OracleReader {
    pub fn new(client: RpcClient) -> Self {
        Self { client }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(RpcClient::new_with_commitment(
            config.rpc_url.clone(),
            CommitmentConfig::confirmed(),
        ))
    }

    /// Current price of one price account, with the product symbol when
    /// the product account can be read
    pub async fn fetch_price(&self, account_id: Pubkey) -> Result<PriceUpdate> {
        let data = self.client.get_account_data(&account_id).await?;
        let mut update = oracle::parse_price_account(account_id, &data)?;

        let product_account = update.product.product_account;
        if product_account != Pubkey::default() {
            match self.fetch_product(product_account).await {
                Ok(listing) if listing.product.symbol.is_some() => {
                    update.product.symbol = listing.product.symbol;
                }
                Ok(_) => {}
                Err(e) => log::debug!("Product lookup for {} failed: {}", account_id, e),
            }
        }

        Ok(update)
    }

    pub async fn fetch_product(&self, product_account: Pubkey) -> Result<ProductListing> {
        let data = self.client.get_account_data(&product_account).await?;
        oracle::parse_product_account(product_account, &data)
    }

    /// Every product reachable from `mapping_account`, in listing order.
    /// Unreadable product accounts are logged and skipped.
    pub async fn fetch_products(&self, mapping_account: Pubkey) -> Result<Vec<ProductListing>> {
        let mut listings = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(mapping_account);

        while let Some(account) = next {
            if !visited.insert(account) {
                log::warn!("Mapping list loops back to {}, stopping", account);
                break;
            }

            let data = self.client.get_account_data(&account).await?;
            let page = oracle::parse_mapping_account(account, &data)?;
            log::debug!("Mapping {} lists {} products", account, page.products.len());

            for chunk in page.products.chunks(MAX_MULTIPLE_ACCOUNTS) {
                let accounts = self.client.get_multiple_accounts(chunk).await?;
                for (key, account) in chunk.iter().zip(accounts) {
                    let Some(account) = account else {
                        log::warn!("Product account {} not found", key);
                        continue;
                    };
                    match oracle::parse_product_account(*key, &account.data) {
                        Ok(listing) => listings.push(listing),
                        Err(e) => log::warn!("{}", e),
                    }
                }
            }

            next = page.next;
        }

        Ok(listings)
    }
}
