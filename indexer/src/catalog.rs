//! Asset catalog: Pyth devnet price accounts selectable for a basket

use crate::error::{IndexerError, Result};
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// One selectable asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    pub symbol: &'static str,
    /// Base58 address of the Pyth price account
    pub account: &'static str,
}

impl Asset {
    pub fn account_id(&self) -> Result<Pubkey> {
        Pubkey::from_str(self.account).map_err(|e| {
            IndexerError::config(format!("catalog entry {} has bad key: {}", self.symbol, e))
        })
    }
}

/// Pyth price accounts on devnet
pub const ASSETS: &[Asset] = &[
    Asset {
        symbol: "Crypto.BTC/USD",
        account: "HovQMDrbAgAYPCmHVSrezcSmkMtXSSUsLDFANExrZh2J",
    },
    Asset {
        symbol: "Crypto.ETH/USD",
        account: "EdVCmQ9FSPcVe5YySXDPCRmc8aDQLKJ9xvYBMZPie1Vw",
    },
    Asset {
        symbol: "Crypto.SOL/USD",
        account: "J83w4HKfqxwcq3BEMMkPFSppX3gqekLyLJBexebFVkix",
    },
    Asset {
        symbol: "Crypto.USDC/USD",
        account: "5SSkXsEKQepHHAewytPVwdej4epN1nxgLVM84L4KXgy7",
    },
];

/// Look up an asset by symbol. Accepts the bare pair ("SOL/USD") as well.
pub fn lookup(symbol: &str) -> Option<&'static Asset> {
    ASSETS.iter().find(|a| {
        a.symbol.eq_ignore_ascii_case(symbol)
            || a.symbol
                .split_once('.')
                .is_some_and(|(_, pair)| pair.eq_ignore_ascii_case(symbol))
    })
}

/// Symbol for a price account, if it is in the catalog
pub fn symbol_for(account_id: &Pubkey) -> Option<&'static str> {
    ASSETS
        .iter()
        .find(|a| a.account_id().ok().as_ref() == Some(account_id))
        .map(|a| a.symbol)
}

/// Resolve a selection of symbols to account ids, preserving order
pub fn resolve(symbols: &[String]) -> Result<Vec<Pubkey>> {
    symbols
        .iter()
        .map(|s| {
            lookup(s)
                .ok_or_else(|| IndexerError::config(format!("unknown asset symbol: {}", s)))?
                .account_id()
        })
        .collect()
}

/// Every catalog account, used as the oracle watch set
pub fn all_accounts() -> Result<Vec<Pubkey>> {
    ASSETS.iter().map(Asset::account_id).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_entries_parse() {
        let accounts = all_accounts().unwrap();
        assert_eq!(accounts.len(), ASSETS.len());
    }

    #[test]
    fn test_lookup_full_and_bare_symbol() {
        let full = lookup("Crypto.SOL/USD").unwrap();
        let bare = lookup("sol/usd").unwrap();
        assert_eq!(full, bare);
        assert!(lookup("DOGE/USD").is_none());
    }

    #[test]
    fn test_resolve_preserves_order_and_duplicates() {
        let ids = resolve(&[
            "ETH/USD".to_string(),
            "BTC/USD".to_string(),
            "ETH/USD".to_string(),
        ])
        .unwrap();

        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0], ids[2]);
        assert_eq!(symbol_for(&ids[1]), Some("Crypto.BTC/USD"));
    }

    #[test]
    fn test_resolve_unknown_symbol() {
        let err = resolve(&["XYZ/USD".to_string()]).unwrap_err();
        assert!(matches!(err, IndexerError::Configuration(_)));
    }
}
