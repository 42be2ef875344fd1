//! Account state reading and idempotent associated-account resolution.
//!
//! Reads enforce the owner and size invariants before any field is
//! trusted; resolution tolerates concurrent creators by ignoring creation
//! failures exactly once and re-reading the derived address.

use solana_sdk::{pubkey::Pubkey, signer::Signer, transaction::Transaction};
use tracing::debug;

use crate::error::WalletServiceError;
use crate::instructions;
use crate::state::{EscrowRecord, TokenAccountRecord};

use super::WalletServiceClient;

impl WalletServiceClient {
    /// Fetches and decodes a token account.
    ///
    /// # Returns
    ///
    /// * `Ok(TokenAccountRecord)` - Decoded token account state
    /// * `Err(AccountNotFound)` - No account at the address
    /// * `Err(OwnerMismatch)` - Account is not owned by the token program
    /// * `Err(SizeMismatch)` - Account data is not the fixed token span
    pub async fn read_token_account(
        &self,
        address: &Pubkey,
    ) -> Result<TokenAccountRecord, WalletServiceError> {
        let data = self
            .read_account_owned_by(address, &self.programs.token_program)
            .await?;
        TokenAccountRecord::unpack(&data)
    }

    /// Fetches and decodes an escrow account owned by the escrow program.
    pub async fn read_escrow_account(
        &self,
        address: &Pubkey,
    ) -> Result<EscrowRecord, WalletServiceError> {
        let data = self
            .read_account_owned_by(address, &self.escrow_program)
            .await?;
        EscrowRecord::unpack(&data)
    }

    async fn read_account_owned_by(
        &self,
        address: &Pubkey,
        expected_owner: &Pubkey,
    ) -> Result<Vec<u8>, WalletServiceError> {
        let account = self
            .rpc
            .get_account_with_commitment(address, self.rpc.commitment())
            .await?
            .value
            .ok_or(WalletServiceError::AccountNotFound(*address))?;

        if account.owner != *expected_owner {
            return Err(WalletServiceError::OwnerMismatch {
                address: *address,
                expected: *expected_owner,
                actual: account.owner,
            });
        }
        Ok(account.data)
    }

    /// Returns the token account at the associated address for
    /// `(wallet, mint)`, creating it when missing.
    ///
    /// Safe to call from concurrent resolvers without coordination: the
    /// creation instruction is idempotent at the protocol level (a
    /// duplicate creation against an existing token account is rejected by
    /// the remote program, not double-applied), so creation failures are
    /// ignored once and the address is re-read. The second read's error,
    /// if any, is surfaced verbatim.
    pub async fn resolve_associated_token_account(
        &self,
        wallet: &Pubkey,
        mint: &Pubkey,
    ) -> Result<(Pubkey, TokenAccountRecord), WalletServiceError> {
        let (address, _) = instructions::associated_token_address(&self.programs, wallet, mint)?;

        match self.read_token_account(&address).await {
            Ok(record) => Ok((address, record)),
            // OwnerMismatch covers the narrow case where the derived
            // address received a plain lamport deposit before ever being
            // initialized as a token account.
            Err(WalletServiceError::AccountNotFound(_))
            | Err(WalletServiceError::OwnerMismatch { .. }) => {
                if let Err(err) = self.submit_associated_account_creation(wallet, mint, &address).await {
                    // A concurrent resolver may have created it first.
                    debug!(
                        "Ignoring associated account creation failure for {}: {}",
                        address, err
                    );
                }
                let record = self.read_token_account(&address).await?;
                Ok((address, record))
            }
            Err(err) => Err(err),
        }
    }

    async fn submit_associated_account_creation(
        &self,
        wallet: &Pubkey,
        mint: &Pubkey,
        associated_address: &Pubkey,
    ) -> Result<(), WalletServiceError> {
        let instruction = instructions::create_associated_token_account(
            &self.programs,
            &self.fee_payer.pubkey(),
            wallet,
            mint,
            associated_address,
        );
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&self.fee_payer.pubkey()),
            &[&self.fee_payer],
            blockhash,
        );
        self.rpc.send_transaction(&transaction).await?;
        Ok(())
    }
}
