//! Token and native transfer operations
//!
//! Builders for the simple payment paths: each produces a transaction
//! signed by the fee payer only, returned as a (message, signatures) pair
//! for the wallet to complete and submit out-of-band. Also hosts the
//! memo-based transaction signature lookup.

use serde::Serialize;
use solana_client::rpc_client::GetConfirmedSignaturesForAddress2Config;
use solana_sdk::{
    hash::Hash,
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Signature,
    signer::Signer,
    system_instruction,
    transaction::Transaction,
};

use crate::error::WalletServiceError;
use crate::instructions;

use super::WalletServiceClient;

/// Message/signature pair for a transaction still awaiting the wallet's
/// own signature.
#[derive(Debug, Clone, Serialize)]
pub struct TransferOutput {
    /// Serialized unsigned-message bytes (base64)
    pub message: String,
    /// Signatures collected locally (base64)
    pub signatures: Vec<String>,
}

/// Output of `create_associated_token`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateAssociatedTokenOutput {
    /// The derived associated token address (base58)
    pub address: String,
    /// Serialized unsigned-message bytes (base64)
    pub message: String,
    /// Signatures collected locally (base64)
    pub signatures: Vec<String>,
}

impl WalletServiceClient {
    /// Builds a fee-payer-funded transaction creating the associated token
    /// account for `(wallet, mint)` at its derived address.
    pub fn create_associated_token(
        &self,
        wallet: &Pubkey,
        mint: &Pubkey,
        recent_blockhash: Hash,
    ) -> Result<CreateAssociatedTokenOutput, WalletServiceError> {
        let (address, _) = instructions::associated_token_address(&self.programs, wallet, mint)?;
        let instruction = instructions::create_associated_token_account(
            &self.programs,
            &self.fee_payer.pubkey(),
            wallet,
            mint,
            &address,
        );
        let transaction = self.partially_signed(&[instruction], recent_blockhash);

        Ok(CreateAssociatedTokenOutput {
            address: address.to_string(),
            message: Self::encode_message(&transaction),
            signatures: Self::present_signatures(&transaction),
        })
    }

    /// Creates the destination wallet's associated token account and funds
    /// it from `source` in a single transaction, signed by `wallet`.
    pub fn create_and_transfer_to_account(
        &self,
        wallet: &Pubkey,
        mint: &Pubkey,
        source: &Pubkey,
        destination: &Pubkey,
        amount: u64,
        recent_blockhash: Hash,
        memo: Option<&str>,
    ) -> Result<TransferOutput, WalletServiceError> {
        let (associated_address, _) =
            instructions::associated_token_address(&self.programs, destination, mint)?;
        let mut sequence = vec![
            instructions::create_associated_token_account(
                &self.programs,
                &self.fee_payer.pubkey(),
                destination,
                mint,
                &associated_address,
            ),
            instructions::token_transfer(
                &self.programs.token_program,
                source,
                &associated_address,
                wallet,
                amount,
            ),
        ];
        if let Some(text) = memo {
            sequence.push(instructions::memo(&self.programs.memo_program, text, None));
        }
        let transaction = self.partially_signed(&sequence, recent_blockhash);

        Ok(TransferOutput {
            message: Self::encode_message(&transaction),
            signatures: Self::present_signatures(&transaction),
        })
    }

    /// Transfers a token balance between two existing token accounts owned
    /// by `wallet`.
    pub fn transfer_between_token_accounts(
        &self,
        wallet: &Pubkey,
        source: &Pubkey,
        destination: &Pubkey,
        amount: u64,
        recent_blockhash: Hash,
        memo: Option<&str>,
    ) -> TransferOutput {
        let mut sequence = vec![instructions::token_transfer(
            &self.programs.token_program,
            source,
            destination,
            wallet,
            amount,
        )];
        if let Some(text) = memo {
            sequence.push(instructions::memo(&self.programs.memo_program, text, None));
        }
        let transaction = self.partially_signed(&sequence, recent_blockhash);

        TransferOutput {
            message: Self::encode_message(&transaction),
            signatures: Self::present_signatures(&transaction),
        }
    }

    /// Moves native lamports from the wallet to `destination`.
    pub fn native_transfer(
        &self,
        wallet: &Pubkey,
        destination: &Pubkey,
        amount: u64,
        recent_blockhash: Hash,
    ) -> TransferOutput {
        let instruction = system_instruction::transfer(wallet, destination, amount);
        let transaction = self.partially_signed(&[instruction], recent_blockhash);

        TransferOutput {
            message: Self::encode_message(&transaction),
            signatures: Self::present_signatures(&transaction),
        }
    }

    /// Scans the wallet's confirmed transactions for one tagged with `memo`.
    ///
    /// # Arguments
    ///
    /// * `wallet` - Address whose transaction history is scanned
    /// * `memo` - Memo text to match exactly
    /// * `until` - Optional signature bounding how far back to scan
    ///
    /// # Returns
    ///
    /// * `Ok(Some(signature))` - First transaction carrying the memo
    /// * `Ok(None)` - No matching transaction
    pub async fn find_transaction_signature_by_memo(
        &self,
        wallet: &Pubkey,
        memo: &str,
        until: Option<Signature>,
    ) -> Result<Option<String>, WalletServiceError> {
        let statuses = self
            .rpc
            .get_signatures_for_address_with_config(
                wallet,
                GetConfirmedSignaturesForAddress2Config {
                    until,
                    ..Default::default()
                },
            )
            .await?;

        Ok(statuses
            .into_iter()
            .find(|status| status.memo.as_deref() == Some(memo))
            .map(|status| status.signature))
    }

    /// Assembles `instructions` behind the fee payer and signs with the fee
    /// payer key only, leaving the remaining signature slots empty.
    fn partially_signed(&self, instructions: &[Instruction], recent_blockhash: Hash) -> Transaction {
        let mut transaction = Transaction::new_with_payer(instructions, Some(&self.fee_payer.pubkey()));
        transaction.partial_sign(&[&self.fee_payer], recent_blockhash);
        transaction
    }
}
