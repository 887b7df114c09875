//! Index storage account layout
//!
//! ```text
//! IndexStorageAccount (1000 bytes allocated):
//!   discriminator: [u8; 8]   - sha256("account:IndexStorageAccount")[..8]
//!   indices: Vec<IndexAccount>
//!     index_name: String
//!     pub_keys: Vec<String>  - base58 price account addresses
//!   zero padding
//! ```

use crate::error::{IndexerError, Result};
use crate::tx_builder::discriminator;
use borsh::{BorshDeserialize, BorshSerialize};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// Space the program allocates for the storage account
pub const STORAGE_ACCOUNT_SPACE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IndexAccount {
    pub index_name: String,
    pub pub_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IndexStorageAccount {
    pub indices: Vec<IndexAccount>,
}

/// A named basket of oracle accounts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Basket {
    pub name: String,
    pub account_ids: Vec<Pubkey>,
}

impl Basket {
    pub fn new(name: impl Into<String>, account_ids: Vec<Pubkey>) -> Self {
        Self {
            name: name.into(),
            account_ids,
        }
    }

    fn from_index_account(index: IndexAccount) -> Result<Self> {
        let account_ids = index
            .pub_keys
            .iter()
            .map(|k| {
                Pubkey::from_str(k).map_err(|e| {
                    IndexerError::StorageDecode(format!(
                        "basket '{}' holds invalid key {}: {}",
                        index.index_name, k, e
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: index.index_name,
            account_ids,
        })
    }

    pub fn to_index_account(&self) -> IndexAccount {
        IndexAccount {
            index_name: self.name.clone(),
            pub_keys: self.account_ids.iter().map(Pubkey::to_string).collect(),
        }
    }
}

pub fn account_discriminator() -> [u8; 8] {
    discriminator("account", "IndexStorageAccount")
}

/// Decode the baskets held by a storage account, in stored order
pub fn decode_storage(data: &[u8]) -> Result<Vec<Basket>> {
    if data.len() < 8 {
        return Err(IndexerError::StorageDecode(
            "account data shorter than discriminator".to_string(),
        ));
    }

    let (disc, mut body) = data.split_at(8);
    if disc != account_discriminator() {
        return Err(IndexerError::StorageDecode(
            "not an index storage account".to_string(),
        ));
    }

    let storage = IndexStorageAccount::deserialize(&mut body)
        .map_err(|e| IndexerError::StorageDecode(e.to_string()))?;

    storage
        .indices
        .into_iter()
        .map(Basket::from_index_account)
        .collect()
}

/// Encode baskets the way the program stores them (without padding)
pub fn encode_storage(baskets: &[Basket]) -> Result<Vec<u8>> {
    let storage = IndexStorageAccount {
        indices: baskets.iter().map(Basket::to_index_account).collect(),
    };

    let mut data = account_discriminator().to_vec();
    storage.serialize(&mut data)?;
    Ok(data)
}

/// Check that appending `basket` still fits in the storage account
pub fn check_capacity(existing: &[Basket], basket: &Basket) -> Result<()> {
    let mut all = existing.to_vec();
    all.push(basket.clone());

    let needed = encode_storage(&all)?.len();
    if needed > STORAGE_ACCOUNT_SPACE {
        return Err(IndexerError::config(format!(
            "basket '{}' needs {} bytes of storage, account holds {}",
            basket.name, needed, STORAGE_ACCOUNT_SPACE
        )));
    }
    Ok(())
}
