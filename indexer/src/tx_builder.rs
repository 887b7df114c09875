//! Transaction builder for the index program
//!
//! The program is an Anchor program: instruction data is the first 8 bytes
//! of `sha256("global:<instruction>")` followed by borsh-encoded arguments.

use crate::error::Result;
use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_sdk::{
    hash::Hash,
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    system_program,
    transaction::Transaction,
};

pub const INIT_INDEX_STORAGE: &str = "init_index_storage";
pub const NAME_AND_PUBKEYS_INDEX: &str = "name_and_pubkeys_index";
pub const DELETE_INDEX: &str = "delete_index";

/// Anchor discriminator for `<namespace>:<name>`
pub fn discriminator(namespace: &str, name: &str) -> [u8; 8] {
    let hash = Sha256::digest(format!("{}:{}", namespace, name).as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash[..8]);
    out
}

fn instruction_data(name: &str, args: &impl BorshSerialize) -> Result<Vec<u8>> {
    let mut data = discriminator("global", name).to_vec();
    args.serialize(&mut data)?;
    Ok(data)
}

#[derive(BorshSerialize)]
struct NameAndPubkeysArgs {
    index_name: String,
    pub_keys: Vec<String>,
}

#[derive(BorshSerialize)]
struct DeleteIndexArgs {
    name_to_delete: String,
}

/// Build init_index_storage instruction
///
/// Creates the storage account; both the storage account and the user
/// must sign.
pub fn build_init_storage_instruction(
    program_id: &Pubkey,
    storage_account: &Pubkey,
    user: &Pubkey,
) -> Instruction {
    let accounts = vec![
        AccountMeta::new(*storage_account, true),
        AccountMeta::new(*user, true),
        AccountMeta::new_readonly(system_program::id(), false),
    ];

    Instruction {
        program_id: *program_id,
        accounts,
        data: discriminator("global", INIT_INDEX_STORAGE).to_vec(),
    }
}

/// Build name_and_pubkeys_index instruction
///
/// Account ids travel as base58 strings, matching the program's argument type.
pub fn build_save_basket_instruction(
    program_id: &Pubkey,
    storage_account: &Pubkey,
    name: &str,
    account_ids: &[Pubkey],
) -> Result<Instruction> {
    let args = NameAndPubkeysArgs {
        index_name: name.to_string(),
        pub_keys: account_ids.iter().map(Pubkey::to_string).collect(),
    };

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*storage_account, false)],
        data: instruction_data(NAME_AND_PUBKEYS_INDEX, &args)?,
    })
}

/// Build delete_index instruction
pub fn build_delete_basket_instruction(
    program_id: &Pubkey,
    storage_account: &Pubkey,
    name: &str,
) -> Result<Instruction> {
    let args = DeleteIndexArgs {
        name_to_delete: name.to_string(),
    };

    Ok(Instruction {
        program_id: *program_id,
        accounts: vec![AccountMeta::new(*storage_account, false)],
        data: instruction_data(DELETE_INDEX, &args)?,
    })
}

/// Sign `instructions` with the payer and any extra signers
pub fn build_transaction(
    instructions: &[Instruction],
    payer: &Keypair,
    extra_signers: &[&Keypair],
    recent_blockhash: Hash,
) -> Transaction {
    let mut signers: Vec<&Keypair> = vec![payer];
    signers.extend_from_slice(extra_signers);

    Transaction::new_signed_with_payer(
        instructions,
        Some(&payer.pubkey()),
        &signers,
        recent_blockhash,
    )
}
