//! Escrow wallet service library
//!
//! Builds, partially signs, and validates multi-party token escrow
//! transactions on a public ledger, on behalf of end-user wallets that
//! hold the final signing authority. The service acts as fee payer and
//! protocol authority; wallets contribute their own signature out-of-band
//! before broadcast.

pub mod client;
pub mod config;
pub mod error;
pub mod instructions;
pub mod state;

// Re-export public types for convenience
pub use client::{
    check_settlement, validate_address, CreateAssociatedTokenOutput, InitializeEscrowOutput,
    SettleEscrowOutput, SignatureEntry, TransferOutput, WalletServiceClient,
};
pub use config::WalletServiceConfig;
pub use error::WalletServiceError;
pub use instructions::{EscrowInstructionData, ProgramRegistry};
pub use state::{EscrowRecord, TokenAccountRecord, TokenAccountState};
