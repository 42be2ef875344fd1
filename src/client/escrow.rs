//! Escrow payment operations
//!
//! The initialize / send / settle / close flows against the escrow
//! program. Initialization is partially signed and completed by the wallet
//! out-of-band; settlement and close are fully signed locally (authority
//! and fee payer) and submitted directly.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::Keypair,
    signer::Signer,
    system_instruction,
    transaction::Transaction,
};
use tracing::info;

use crate::error::WalletServiceError;
use crate::instructions::{self, ProgramRegistry};
use crate::state::{EscrowRecord, ESCROW_RECORD_LEN, TOKEN_ACCOUNT_RECORD_LEN};

use super::{SignatureEntry, WalletServiceClient};

/// Output of `initialize_escrow_payment`.
#[derive(Debug, Clone, Serialize)]
pub struct InitializeEscrowOutput {
    /// Serialized unsigned-message bytes (base64)
    pub message: String,
    /// Every required signer with its signature, absent for the wallet
    pub signatures: Vec<SignatureEntry>,
    /// Address of the newly created escrow account (base58)
    pub escrow_address: String,
}

/// Output of `settle_escrow_payment`.
#[derive(Debug, Clone, Serialize)]
pub struct SettleEscrowOutput {
    /// Submission signature (base58)
    pub signature: String,
    /// Token account (or wallet, for the native token) that received the payment
    pub destination: String,
}

/// Inputs to the escrow-initialize instruction sequence.
pub struct InitializeEscrowParams<'a> {
    pub programs: &'a ProgramRegistry,
    pub escrow_program: &'a Pubkey,
    pub fee_payer: &'a Pubkey,
    pub authority: &'a Pubkey,
    pub wallet: &'a Pubkey,
    /// Wallet-side funding source: a token account, or the wallet itself
    /// for the wrapped native mint
    pub token_account: &'a Pubkey,
    pub mint: &'a Pubkey,
    pub temp_token_account: &'a Pubkey,
    pub escrow_account: &'a Pubkey,
    pub amount: u64,
    pub token_account_rent: u64,
    pub escrow_rent: u64,
    pub memo: Option<&'a str>,
}

/// Orders the escrow-initialize instruction sequence.
///
/// The wrapped native mint must be funded before the token account is
/// initialized (the wrapping deposit only becomes valid once the funded
/// account is initialized); every other mint initializes first and funds
/// second.
pub fn assemble_initialize_escrow(params: &InitializeEscrowParams<'_>) -> Vec<Instruction> {
    let create_temp = system_instruction::create_account(
        params.fee_payer,
        params.temp_token_account,
        params.token_account_rent,
        TOKEN_ACCOUNT_RECORD_LEN as u64,
        &params.programs.token_program,
    );
    let init_temp = instructions::initialize_token_account(
        &params.programs.token_program,
        params.temp_token_account,
        params.mint,
        params.wallet,
    );
    let fund_temp = if *params.mint == params.programs.wrapped_native_mint {
        system_instruction::transfer(params.token_account, params.temp_token_account, params.amount)
    } else {
        instructions::token_transfer(
            &params.programs.token_program,
            params.token_account,
            params.temp_token_account,
            params.wallet,
            params.amount,
        )
    };
    let create_escrow = system_instruction::create_account(
        params.fee_payer,
        params.escrow_account,
        params.escrow_rent,
        ESCROW_RECORD_LEN as u64,
        params.escrow_program,
    );
    let init_escrow = instructions::initialize_escrow(
        params.escrow_program,
        params.wallet,
        params.temp_token_account,
        params.authority,
        params.escrow_account,
        &params.programs.token_program,
        params.amount,
    );

    let mut sequence = vec![create_temp];
    if *params.mint == params.programs.wrapped_native_mint {
        sequence.push(fund_temp);
        sequence.push(init_temp);
    } else {
        sequence.push(init_temp);
        sequence.push(fund_temp);
    }
    sequence.push(create_escrow);
    sequence.push(init_escrow);
    if let Some(text) = params.memo {
        sequence.push(instructions::memo(
            &params.programs.memo_program,
            text,
            Some(params.authority),
        ));
    }
    sequence
}

/// Enforces the financial invariants gating settlement: the requested
/// amount must equal the escrow's stored amount, and the locally held
/// authority must be the escrow's stored authority.
pub fn check_settlement(
    record: &EscrowRecord,
    requested_amount: u64,
    authority: &Pubkey,
) -> Result<(), WalletServiceError> {
    if requested_amount != record.amount {
        return Err(WalletServiceError::AmountMismatch {
            requested: requested_amount,
            expected: record.amount,
        });
    }
    if *authority != record.authority {
        return Err(WalletServiceError::InvalidAuthority(record.authority));
    }
    Ok(())
}

impl WalletServiceClient {
    /// Builds the escrow-initialize transaction: a fresh temporary token
    /// account is created and funded with `amount` from `token_account`,
    /// and a fresh escrow account records the payment. Signed by every
    /// local key (fee payer, authority, both new accounts); the wallet's
    /// signature is collected out-of-band before submission.
    pub async fn initialize_escrow_payment(
        &self,
        wallet: &Pubkey,
        token_account: &Pubkey,
        mint: &Pubkey,
        amount: u64,
        memo: Option<&str>,
    ) -> Result<InitializeEscrowOutput, WalletServiceError> {
        let temp_token_account = Keypair::new();
        let escrow_account = Keypair::new();

        let token_account_rent = self
            .rpc
            .get_minimum_balance_for_rent_exemption(TOKEN_ACCOUNT_RECORD_LEN)
            .await?;
        let escrow_rent = self
            .rpc
            .get_minimum_balance_for_rent_exemption(ESCROW_RECORD_LEN)
            .await?;

        let sequence = assemble_initialize_escrow(&InitializeEscrowParams {
            programs: &self.programs,
            escrow_program: &self.escrow_program,
            fee_payer: &self.fee_payer.pubkey(),
            authority: &self.authority.pubkey(),
            wallet,
            token_account,
            mint,
            temp_token_account: &temp_token_account.pubkey(),
            escrow_account: &escrow_account.pubkey(),
            amount,
            token_account_rent,
            escrow_rent,
            memo,
        });

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let mut transaction =
            Transaction::new_with_payer(&sequence, Some(&self.fee_payer.pubkey()));
        transaction.partial_sign(
            &[
                &self.fee_payer,
                &self.authority,
                &escrow_account,
                &temp_token_account,
            ],
            blockhash,
        );

        info!(
            "Built escrow initialization {} for wallet {} (amount {})",
            escrow_account.pubkey(),
            wallet,
            amount
        );

        Ok(InitializeEscrowOutput {
            message: Self::encode_message(&transaction),
            signatures: Self::signature_entries(&transaction),
            escrow_address: escrow_account.pubkey().to_string(),
        })
    }

    /// Verifies every signature on a wallet-completed payload and submits
    /// it raw.
    ///
    /// # Arguments
    ///
    /// * `payload` - Base64-encoded, fully signed transaction
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Submission signature
    /// * `Err(InvalidSignature)` - A signature fails verification
    /// * `Err(MalformedRecord)` - The payload does not decode to a transaction
    pub async fn send_escrow_payment(&self, payload: &str) -> Result<String, WalletServiceError> {
        let bytes = STANDARD
            .decode(payload)
            .map_err(|_| WalletServiceError::MalformedRecord)?;
        let transaction: Transaction =
            bincode::deserialize(&bytes).map_err(|_| WalletServiceError::MalformedRecord)?;

        if transaction.verify().is_err() {
            return Err(WalletServiceError::InvalidSignature);
        }

        let signature = self.rpc.send_transaction(&transaction).await?;
        Ok(signature.to_string())
    }

    /// Settles an initialized escrow payment.
    ///
    /// Validates the escrow record (amount and authority), resolves the
    /// taker's and fee taker's destination accounts, then submits the fully
    /// signed settle instruction. A submission failure still exposes the
    /// computed destination so the caller can reconcile against it.
    pub async fn settle_escrow_payment(
        &self,
        wallet: &Pubkey,
        escrow_address: &Pubkey,
        amount: u64,
        fee: Option<u64>,
        memo: Option<&str>,
    ) -> Result<SettleEscrowOutput, WalletServiceError> {
        let record = self.read_escrow_account(escrow_address).await?;
        check_settlement(&record, amount, &self.authority.pubkey())?;

        let temp_token = self
            .read_token_account(&record.payer_temp_token_account)
            .await?;

        // For the wrapped native token the payment unwraps straight into
        // the wallets; any other mint settles into associated accounts.
        let (taker_account, fee_taker_account) = if temp_token.is_native {
            (*wallet, self.fee_taker)
        } else {
            let (taker, _) = self
                .resolve_associated_token_account(wallet, &temp_token.mint)
                .await?;
            let (fee_taker, _) = self
                .resolve_associated_token_account(&self.fee_taker, &temp_token.mint)
                .await?;
            (taker, fee_taker)
        };

        let (escrow_authority, _) = instructions::escrow_authority_address(&self.escrow_program)?;
        let mut sequence = vec![instructions::settle_escrow(
            &self.escrow_program,
            &self.authority.pubkey(),
            &taker_account,
            &fee_taker_account,
            &record.payer_temp_token_account,
            escrow_address,
            &self.fee_payer.pubkey(),
            &self.programs.token_program,
            &escrow_authority,
            fee.unwrap_or(0),
        )];
        if let Some(text) = memo {
            sequence.push(instructions::memo(
                &self.programs.memo_program,
                text,
                Some(&self.authority.pubkey()),
            ));
        }

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = Transaction::new_signed_with_payer(
            &sequence,
            Some(&self.fee_payer.pubkey()),
            &[&self.fee_payer, &self.authority],
            blockhash,
        );

        match self.rpc.send_transaction(&transaction).await {
            Ok(signature) => {
                info!(
                    "Settled escrow {} to destination {}",
                    escrow_address, taker_account
                );
                Ok(SettleEscrowOutput {
                    signature: signature.to_string(),
                    destination: taker_account.to_string(),
                })
            }
            Err(err) => Err(WalletServiceError::TransactionSend {
                destination: taker_account,
                source: err,
            }),
        }
    }

    /// Closes an escrow account, refunding its lamports to the fee payer.
    ///
    /// No state is read first: the remote program is the sole enforcer of
    /// whether closing is currently legal, and a rejection surfaces as a
    /// send failure.
    pub async fn close_escrow_payment(
        &self,
        escrow_address: &Pubkey,
        memo: Option<&str>,
    ) -> Result<String, WalletServiceError> {
        let mut sequence = vec![instructions::close_escrow(
            &self.escrow_program,
            &self.authority.pubkey(),
            escrow_address,
            &self.fee_payer.pubkey(),
        )];
        if let Some(text) = memo {
            sequence.push(instructions::memo(
                &self.programs.memo_program,
                text,
                Some(&self.authority.pubkey()),
            ));
        }

        let blockhash = self.rpc.get_latest_blockhash().await?;
        let transaction = Transaction::new_signed_with_payer(
            &sequence,
            Some(&self.fee_payer.pubkey()),
            &[&self.fee_payer, &self.authority],
            blockhash,
        );

        let signature = self.rpc.send_transaction(&transaction).await?;
        Ok(signature.to_string())
    }
}
