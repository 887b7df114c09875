//! Wallet and storage account keypairs

use crate::error::{IndexerError, Result};
use solana_sdk::signature::{Keypair, Signer};
use std::path::Path;

/// Load a keypair from a Solana CLI JSON file or raw 64-byte file
pub fn load_keypair(path: &str) -> Result<Keypair> {
    let unavailable = |reason: String| IndexerError::WalletUnavailable {
        path: path.to_string(),
        reason,
    };

    let expanded_path = shellexpand::tilde(path);
    let bytes = std::fs::read(expanded_path.as_ref()).map_err(|e| unavailable(e.to_string()))?;

    let keypair = if bytes.first() == Some(&b'[') {
        // JSON format
        let json_data: Vec<u8> = serde_json::from_slice(&bytes)
            .map_err(|e| unavailable(format!("bad keypair JSON: {}", e)))?;
        Keypair::try_from(&json_data[..]).map_err(|e| unavailable(e.to_string()))?
    } else {
        // Binary format
        Keypair::try_from(&bytes[..]).map_err(|e| unavailable(e.to_string()))?
    };

    Ok(keypair)
}

/// Load the storage account keypair, generating and saving a new one if
/// the file does not exist yet. Returns the keypair and whether it is new.
pub fn load_or_create_keypair(path: &str) -> Result<(Keypair, bool)> {
    let expanded_path = shellexpand::tilde(path);
    let file = Path::new(expanded_path.as_ref());

    if file.exists() {
        return Ok((load_keypair(path)?, false));
    }

    let keypair = Keypair::new();
    let write_err = |e: std::io::Error| IndexerError::WalletUnavailable {
        path: path.to_string(),
        reason: e.to_string(),
    };

    if let Some(parent) = file.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    let json = serde_json::to_string(&keypair.to_bytes().to_vec())
        .map_err(|e| IndexerError::config(e.to_string()))?;
    std::fs::write(file, json).map_err(write_err)?;

    log::info!("Generated storage account {} at {}", keypair.pubkey(), path);
    Ok((keypair, true))
}
