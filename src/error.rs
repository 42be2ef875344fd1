//! Error taxonomy for wallet service operations.
//!
//! Validation failures (amount, authority, ownership, size) are surfaced
//! verbatim and never retried. Remote RPC failures propagate unchanged
//! through the `Rpc` variant, except submission failures during settlement,
//! which are enriched with the intended destination so callers can
//! reconcile without re-deriving it.

use solana_client::client_error::ClientError;
use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WalletServiceError {
    /// The remote lookup returned no account at the address.
    #[error("failed to find account {0}")]
    AccountNotFound(Pubkey),

    /// The account exists but is owned by an unexpected program.
    #[error("invalid account owner for {address}: expected {expected}, found {actual}")]
    OwnerMismatch {
        address: Pubkey,
        expected: Pubkey,
        actual: Pubkey,
    },

    /// The account data length differs from the record's fixed span.
    #[error("invalid account size: expected {expected} bytes, found {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A fixed-layout record carried an invalid discriminant.
    #[error("malformed account record")]
    MalformedRecord,

    /// The requested amount differs from the amount stored in the escrow.
    #[error("amount mismatch: requested {requested}, escrow expects {expected}")]
    AmountMismatch { requested: u64, expected: u64 },

    /// The locally held authority key is not the escrow's stored authority.
    #[error("invalid authority: escrow expects {0}")]
    InvalidAuthority(Pubkey),

    /// A submitted payload failed signature verification.
    #[error("invalid signature")]
    InvalidSignature,

    /// Submission failed after the destination was already resolved.
    #[error("transaction send error (intended destination {destination})")]
    TransactionSend {
        destination: Pubkey,
        #[source]
        source: ClientError,
    },

    /// The program-address derivation primitive found no valid address.
    #[error("program address derivation exhausted")]
    AddressDerivationExhausted,

    /// Any other remote failure, propagated unchanged.
    #[error(transparent)]
    Rpc(#[from] ClientError),
}
