//! On-chain account layouts
//!
//! Fixed-span byte layouts for the two records this service reads and
//! writes: the escrow program's state account and the SPL token account.
//! All multi-byte integers are little-endian; optional token-account fields
//! are gated by a 4-byte option tag as mandated by the token program's
//! account contract. Decoding rejects any buffer whose length differs from
//! the fixed span before touching a single field.

use arrayref::{array_mut_ref, array_ref, array_refs, mut_array_refs};
use solana_sdk::pubkey::Pubkey;

use crate::error::WalletServiceError;

/// Fixed span of an escrow state account.
pub const ESCROW_RECORD_LEN: usize = 178;

/// Fixed span of an SPL token account.
pub const TOKEN_ACCOUNT_RECORD_LEN: usize = 165;

/// State of one in-flight conditional payment, as stored by the escrow
/// program. Created by the initialize instruction, flipped to settled by
/// the settle instruction, destroyed by the close instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowRecord {
    pub is_initialized: bool,
    pub is_settled: bool,
    pub payer: Pubkey,
    pub payee: Pubkey,
    pub payer_temp_token_account: Pubkey,
    pub authority: Pubkey,
    pub fee_taker: Pubkey,
    pub amount: u64,
    pub fee: u64,
}

impl EscrowRecord {
    /// Decodes an escrow account's data, rejecting wrong-length buffers
    /// with `SizeMismatch` and invalid flag bytes with `MalformedRecord`.
    pub fn unpack(src: &[u8]) -> Result<Self, WalletServiceError> {
        if src.len() != ESCROW_RECORD_LEN {
            return Err(WalletServiceError::SizeMismatch {
                expected: ESCROW_RECORD_LEN,
                actual: src.len(),
            });
        }
        let src = array_ref![src, 0, ESCROW_RECORD_LEN];
        let (
            is_initialized,
            is_settled,
            payer,
            payee,
            payer_temp_token_account,
            authority,
            fee_taker,
            amount,
            fee,
        ) = array_refs![src, 1, 1, 32, 32, 32, 32, 32, 8, 8];

        Ok(EscrowRecord {
            is_initialized: unpack_bool(is_initialized)?,
            is_settled: unpack_bool(is_settled)?,
            payer: Pubkey::new_from_array(*payer),
            payee: Pubkey::new_from_array(*payee),
            payer_temp_token_account: Pubkey::new_from_array(*payer_temp_token_account),
            authority: Pubkey::new_from_array(*authority),
            fee_taker: Pubkey::new_from_array(*fee_taker),
            amount: u64::from_le_bytes(*amount),
            fee: u64::from_le_bytes(*fee),
        })
    }

    /// Encodes the record into its fixed 178-byte layout.
    pub fn pack(&self) -> [u8; ESCROW_RECORD_LEN] {
        let mut dst = [0u8; ESCROW_RECORD_LEN];
        {
            let dst = array_mut_ref![dst, 0, ESCROW_RECORD_LEN];
            let (
                is_initialized_dst,
                is_settled_dst,
                payer_dst,
                payee_dst,
                payer_temp_token_account_dst,
                authority_dst,
                fee_taker_dst,
                amount_dst,
                fee_dst,
            ) = mut_array_refs![dst, 1, 1, 32, 32, 32, 32, 32, 8, 8];

            is_initialized_dst[0] = self.is_initialized as u8;
            is_settled_dst[0] = self.is_settled as u8;
            payer_dst.copy_from_slice(self.payer.as_ref());
            payee_dst.copy_from_slice(self.payee.as_ref());
            payer_temp_token_account_dst.copy_from_slice(self.payer_temp_token_account.as_ref());
            authority_dst.copy_from_slice(self.authority.as_ref());
            fee_taker_dst.copy_from_slice(self.fee_taker.as_ref());
            *amount_dst = self.amount.to_le_bytes();
            *fee_dst = self.fee.to_le_bytes();
        }
        dst
    }
}

/// Lifecycle state of a token account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAccountState {
    Uninitialized,
    Initialized,
    Frozen,
}

/// Decoded SPL token account.
///
/// `delegate`/`delegated_amount` and `close_authority` follow their option
/// tags; `is_native` accounts additionally carry the rent-exempt reserve
/// that is excluded from their spendable balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAccountRecord {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub delegated_amount: u64,
    pub state: TokenAccountState,
    pub is_native: bool,
    pub rent_exempt_reserve: Option<u64>,
    pub close_authority: Option<Pubkey>,
}

impl TokenAccountRecord {
    pub fn is_initialized(&self) -> bool {
        self.state != TokenAccountState::Uninitialized
    }

    pub fn is_frozen(&self) -> bool {
        self.state == TokenAccountState::Frozen
    }

    /// Decodes a token account's data, rejecting wrong-length buffers with
    /// `SizeMismatch` and invalid option/state discriminants with
    /// `MalformedRecord`.
    pub fn unpack(src: &[u8]) -> Result<Self, WalletServiceError> {
        if src.len() != TOKEN_ACCOUNT_RECORD_LEN {
            return Err(WalletServiceError::SizeMismatch {
                expected: TOKEN_ACCOUNT_RECORD_LEN,
                actual: src.len(),
            });
        }
        let src = array_ref![src, 0, TOKEN_ACCOUNT_RECORD_LEN];
        let (
            mint,
            owner,
            amount,
            delegate_tag,
            delegate,
            state,
            is_native_tag,
            is_native,
            delegated_amount,
            close_authority_tag,
            close_authority,
        ) = array_refs![src, 32, 32, 8, 4, 32, 1, 4, 8, 8, 4, 32];

        let delegate = if unpack_option_tag(delegate_tag)? {
            Some(Pubkey::new_from_array(*delegate))
        } else {
            None
        };
        // The delegated amount is only meaningful while a delegate is set.
        let delegated_amount = if delegate.is_some() {
            u64::from_le_bytes(*delegated_amount)
        } else {
            0
        };
        let state = match state {
            [0] => TokenAccountState::Uninitialized,
            [1] => TokenAccountState::Initialized,
            [2] => TokenAccountState::Frozen,
            _ => return Err(WalletServiceError::MalformedRecord),
        };
        let (is_native, rent_exempt_reserve) = if unpack_option_tag(is_native_tag)? {
            (true, Some(u64::from_le_bytes(*is_native)))
        } else {
            (false, None)
        };
        let close_authority = if unpack_option_tag(close_authority_tag)? {
            Some(Pubkey::new_from_array(*close_authority))
        } else {
            None
        };

        Ok(TokenAccountRecord {
            mint: Pubkey::new_from_array(*mint),
            owner: Pubkey::new_from_array(*owner),
            amount: u64::from_le_bytes(*amount),
            delegate,
            delegated_amount,
            state,
            is_native,
            rent_exempt_reserve,
            close_authority,
        })
    }

    /// Encodes the record into its fixed 165-byte layout.
    pub fn pack(&self) -> [u8; TOKEN_ACCOUNT_RECORD_LEN] {
        let mut dst = [0u8; TOKEN_ACCOUNT_RECORD_LEN];
        {
            let dst = array_mut_ref![dst, 0, TOKEN_ACCOUNT_RECORD_LEN];
            let (
                mint_dst,
                owner_dst,
                amount_dst,
                delegate_tag_dst,
                delegate_dst,
                state_dst,
                is_native_tag_dst,
                is_native_dst,
                delegated_amount_dst,
                close_authority_tag_dst,
                close_authority_dst,
            ) = mut_array_refs![dst, 32, 32, 8, 4, 32, 1, 4, 8, 8, 4, 32];

            mint_dst.copy_from_slice(self.mint.as_ref());
            owner_dst.copy_from_slice(self.owner.as_ref());
            *amount_dst = self.amount.to_le_bytes();
            if let Some(delegate) = self.delegate {
                *delegate_tag_dst = 1u32.to_le_bytes();
                delegate_dst.copy_from_slice(delegate.as_ref());
            }
            state_dst[0] = match self.state {
                TokenAccountState::Uninitialized => 0,
                TokenAccountState::Initialized => 1,
                TokenAccountState::Frozen => 2,
            };
            if self.is_native {
                *is_native_tag_dst = 1u32.to_le_bytes();
                *is_native_dst = self.rent_exempt_reserve.unwrap_or(0).to_le_bytes();
            }
            *delegated_amount_dst = self.delegated_amount.to_le_bytes();
            if let Some(close_authority) = self.close_authority {
                *close_authority_tag_dst = 1u32.to_le_bytes();
                close_authority_dst.copy_from_slice(close_authority.as_ref());
            }
        }
        dst
    }
}

fn unpack_bool(src: &[u8; 1]) -> Result<bool, WalletServiceError> {
    match src {
        [0] => Ok(false),
        [1] => Ok(true),
        _ => Err(WalletServiceError::MalformedRecord),
    }
}

/// 4-byte little-endian option tag: 0 = absent, 1 = present.
fn unpack_option_tag(src: &[u8; 4]) -> Result<bool, WalletServiceError> {
    match u32::from_le_bytes(*src) {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(WalletServiceError::MalformedRecord),
    }
}
