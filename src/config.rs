//! Configuration Management Module
//!
//! This module handles loading and managing configuration for the wallet
//! service. Configuration includes the ledger RPC connection, the escrow
//! program deployment, signing key sources, and the token program
//! constants, which are held as explicit configuration so tests can point
//! at alternate program deployments.

use serde::{Deserialize, Serialize};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

use crate::instructions::{
    self, ProgramRegistry, ASSOCIATED_TOKEN_PROGRAM_ID, MEMO_PROGRAM_ID, TOKEN_PROGRAM_ID,
    WRAPPED_NATIVE_MINT,
};

/// Main configuration structure for the wallet service.
///
/// This structure holds configuration for:
/// - Ledger RPC connection (URL and commitment level)
/// - The escrow program deployment and fee taker
/// - Signing key sources (env var names, never the keys themselves)
/// - Token/memo program addresses (defaulting to the canonical deployments)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletServiceConfig {
    /// Ledger connection configuration
    pub service: ServiceConfig,
    /// Escrow program configuration
    pub escrow: EscrowConfig,
    /// Signing key configuration
    pub signing: SigningConfig,
    /// Program address configuration (canonical deployments by default)
    #[serde(default)]
    pub programs: ProgramConfig,
}

/// Ledger connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// JSON-RPC endpoint URL of the ledger node
    pub rpc_url: String,
    /// Commitment level for reads and submissions ("processed", "confirmed", "finalized")
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

/// Escrow program configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Address of the on-chain escrow program (base58)
    pub program_id: String,
    /// Account credited with settlement fees (base58)
    pub fee_taker: String,
}

/// Signing key configuration.
///
/// Keys are loaded from environment variables at client construction and
/// never appear in the configuration file itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Env var holding the fee payer keypair (base58, 64 bytes)
    pub fee_payer_key_env: String,
    /// Env var holding the protocol authority keypair (base58, 64 bytes)
    pub authority_key_env: String,
}

/// Token and memo program addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Address of the fungible token program
    #[serde(default = "default_token_program")]
    pub token_program_id: String,
    /// Address of the associated token account program
    #[serde(default = "default_associated_token_program")]
    pub associated_token_program_id: String,
    /// Mint address of the wrapped native token
    #[serde(default = "default_wrapped_native_mint")]
    pub wrapped_native_mint: String,
    /// Address of the memo program
    #[serde(default = "default_memo_program")]
    pub memo_program_id: String,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        ProgramConfig {
            token_program_id: default_token_program(),
            associated_token_program_id: default_associated_token_program(),
            wrapped_native_mint: default_wrapped_native_mint(),
            memo_program_id: default_memo_program(),
        }
    }
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_token_program() -> String {
    TOKEN_PROGRAM_ID.to_string()
}

fn default_associated_token_program() -> String {
    ASSOCIATED_TOKEN_PROGRAM_ID.to_string()
}

fn default_wrapped_native_mint() -> String {
    WRAPPED_NATIVE_MINT.to_string()
}

fn default_memo_program() -> String {
    MEMO_PROGRAM_ID.to_string()
}

impl WalletServiceConfig {
    /// Loads configuration from a TOML file.
    ///
    /// This function:
    /// 1. Resolves the config path (argument > WALLET_SERVICE_CONFIG_PATH env var > default)
    /// 2. Loads and parses the configuration if the file exists
    /// 3. Validates the configuration
    /// 4. Returns an error asking the user to copy the template otherwise
    ///
    /// # Arguments
    ///
    /// * `path` - Optional path to config file
    ///
    /// # Returns
    ///
    /// * `Ok(WalletServiceConfig)` - Successfully loaded and validated configuration
    /// * `Err(anyhow::Error)` - Missing file, parse failure, or validation failure
    pub fn load_from_path(path: Option<&str>) -> anyhow::Result<Self> {
        let config_path = path
            .map(|p| p.to_string())
            .or_else(|| std::env::var("WALLET_SERVICE_CONFIG_PATH").ok())
            .unwrap_or_else(|| "config/wallet-service.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: WalletServiceConfig = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/wallet-service.template.toml config/wallet-service.toml\n\
                Then edit config/wallet-service.toml with your actual values.",
                config_path
            ))
        }
    }

    /// Loads configuration from the default path (equivalent to `load_from_path(None)`).
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from_path(None)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks that every configured address parses as a base58 pubkey, that
    /// the commitment level is known, and that the key env var names are
    /// non-empty.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Configuration is valid
    /// * `Err(anyhow::Error)` - Validation failed with error message
    pub fn validate(&self) -> anyhow::Result<()> {
        self.escrow_program()?;
        self.fee_taker()?;
        self.program_registry()?;
        self.commitment()?;

        if self.signing.fee_payer_key_env.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: signing.fee_payer_key_env must not be empty"
            ));
        }
        if self.signing.authority_key_env.is_empty() {
            return Err(anyhow::anyhow!(
                "Configuration error: signing.authority_key_env must not be empty"
            ));
        }

        Ok(())
    }

    /// Parses the configured commitment level.
    pub fn commitment(&self) -> anyhow::Result<CommitmentConfig> {
        match self.service.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(anyhow::anyhow!("Unknown commitment level '{}'", other)),
        }
    }

    /// Parses the configured escrow program address.
    pub fn escrow_program(&self) -> anyhow::Result<Pubkey> {
        parse_pubkey(&self.escrow.program_id, "escrow.program_id")
    }

    /// Parses the configured fee taker address.
    pub fn fee_taker(&self) -> anyhow::Result<Pubkey> {
        parse_pubkey(&self.escrow.fee_taker, "escrow.fee_taker")
    }

    /// Resolves the configured program addresses into a registry usable by
    /// the instruction builders.
    pub fn program_registry(&self) -> anyhow::Result<ProgramRegistry> {
        Ok(instructions::ProgramRegistry {
            token_program: parse_pubkey(&self.programs.token_program_id, "programs.token_program_id")?,
            associated_token_program: parse_pubkey(
                &self.programs.associated_token_program_id,
                "programs.associated_token_program_id",
            )?,
            wrapped_native_mint: parse_pubkey(
                &self.programs.wrapped_native_mint,
                "programs.wrapped_native_mint",
            )?,
            memo_program: parse_pubkey(&self.programs.memo_program_id, "programs.memo_program_id")?,
        })
    }
}

fn parse_pubkey(value: &str, field: &str) -> anyhow::Result<Pubkey> {
    Pubkey::from_str(value)
        .map_err(|_| anyhow::anyhow!("Configuration error: invalid address in {}: '{}'", field, value))
}
