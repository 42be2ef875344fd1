//! Wallet Service Client
//!
//! This module provides the client that builds, partially signs, and
//! validates escrow payment transactions on behalf of end-user wallets.
//! The client holds the fee payer and protocol authority keypairs plus the
//! read-only program configuration; it has no mutable state of its own, so
//! concurrent requests share it freely.

pub mod accounts;
pub mod escrow;
pub mod transfers;

// Re-export for convenience
pub use escrow::{check_settlement, InitializeEscrowOutput, SettleEscrowOutput};
pub use transfers::{CreateAssociatedTokenOutput, TransferOutput};

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use std::str::FromStr;

use crate::config::WalletServiceConfig;
use crate::instructions::ProgramRegistry;

/// One entry in a transaction's ordered signature list. `signature` is
/// absent for required signers whose key is not held locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureEntry {
    /// Address of the required signer (base58)
    pub pub_key: String,
    /// Signature bytes (base64), or absent if still required
    pub signature: Option<String>,
}

/// Client for building and signing escrow payment transactions.
pub struct WalletServiceClient {
    rpc: RpcClient,
    fee_payer: Keypair,
    authority: Keypair,
    fee_taker: Pubkey,
    escrow_program: Pubkey,
    programs: ProgramRegistry,
}

impl WalletServiceClient {
    /// Creates a new client from already-resolved parts.
    ///
    /// # Arguments
    ///
    /// * `rpc` - Ledger RPC client
    /// * `fee_payer` - Keypair debited for network transaction costs
    /// * `authority` - Protocol authority keypair approving settlements
    /// * `fee_taker` - Account credited with settlement fees
    /// * `escrow_program` - Address of the on-chain escrow program
    /// * `programs` - Token/memo program addresses
    pub fn new(
        rpc: RpcClient,
        fee_payer: Keypair,
        authority: Keypair,
        fee_taker: Pubkey,
        escrow_program: Pubkey,
        programs: ProgramRegistry,
    ) -> Self {
        Self {
            rpc,
            fee_payer,
            authority,
            fee_taker,
            escrow_program,
            programs,
        }
    }

    /// Builds a client from configuration, loading the fee payer and
    /// authority keypairs from the configured environment variables.
    ///
    /// # Returns
    ///
    /// * `Ok(WalletServiceClient)` - Initialized client
    /// * `Err(anyhow::Error)` - Invalid config values or missing/invalid keys
    pub fn from_config(config: &WalletServiceConfig) -> Result<Self> {
        config.validate()?;
        let rpc = RpcClient::new_with_commitment(
            config.service.rpc_url.clone(),
            config.commitment()?,
        );
        let fee_payer = keypair_from_env(&config.signing.fee_payer_key_env)?;
        let authority = keypair_from_env(&config.signing.authority_key_env)?;

        Ok(Self::new(
            rpc,
            fee_payer,
            authority,
            config.fee_taker()?,
            config.escrow_program()?,
            config.program_registry()?,
        ))
    }

    /// Address of the locally held fee payer key.
    pub fn fee_payer_address(&self) -> Pubkey {
        self.fee_payer.pubkey()
    }

    /// Address of the locally held protocol authority key.
    pub fn authority_address(&self) -> Pubkey {
        self.authority.pubkey()
    }

    /// Serialized unsigned-message bytes of a transaction, base64-encoded
    /// for transport.
    fn encode_message(transaction: &Transaction) -> String {
        STANDARD.encode(transaction.message_data())
    }

    /// Collects every (signer, optional signature) pair of `transaction` in
    /// signer order; placeholder signatures map to `None`.
    fn signature_entries(transaction: &Transaction) -> Vec<SignatureEntry> {
        let signers = transaction.message.header.num_required_signatures as usize;
        transaction.message.account_keys[..signers]
            .iter()
            .zip(&transaction.signatures)
            .map(|(key, signature)| SignatureEntry {
                pub_key: key.to_string(),
                signature: (*signature != Signature::default())
                    .then(|| STANDARD.encode(signature.as_ref())),
            })
            .collect()
    }

    /// The signatures already collected on `transaction`, base64-encoded.
    fn present_signatures(transaction: &Transaction) -> Vec<String> {
        transaction
            .signatures
            .iter()
            .filter(|signature| **signature != Signature::default())
            .map(|signature| STANDARD.encode(signature.as_ref()))
            .collect()
    }
}

/// Checks that a string parses as a well-formed base58 ledger address.
pub fn validate_address(address: &str) -> bool {
    Pubkey::from_str(address).is_ok()
}

/// Loads a keypair from an environment variable holding a base58-encoded
/// 64-byte private key.
fn keypair_from_env(env_var: &str) -> Result<Keypair> {
    let value = std::env::var(env_var)
        .with_context(|| format!("Missing keypair env var: {}", env_var))?;
    keypair_from_base58(&value)
        .with_context(|| format!("Invalid keypair in env var: {}", env_var))
}

/// Decodes a base58 private key string into a Keypair.
///
/// Private keys are 64 bytes (seed + public key) encoded as base58.
pub fn keypair_from_base58(b58: &str) -> Result<Keypair> {
    let bytes = bs58::decode(b58)
        .into_vec()
        .context("Invalid base58 encoding")?;
    Keypair::try_from(bytes.as_slice())
        .map_err(|e| anyhow::anyhow!("Invalid keypair bytes: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What is tested: address validation accepts base58 pubkeys and rejects garbage
    #[test]
    fn test_validate_address() {
        assert!(validate_address(&Pubkey::new_unique().to_string()));
        assert!(!validate_address("not-an-address"));
        assert!(!validate_address(""));
    }

    /// What is tested: keypair decoding round-trips through base58
    #[test]
    fn test_keypair_from_base58() {
        let keypair = Keypair::new();
        let encoded = bs58::encode(keypair.to_bytes()).into_string();
        let decoded = keypair_from_base58(&encoded).expect("decode keypair");
        assert_eq!(decoded.pubkey(), keypair.pubkey());

        assert!(keypair_from_base58("0OIl").is_err());
        assert!(keypair_from_base58("abc").is_err());
    }
}
