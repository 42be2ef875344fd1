//! Wallet Service Operator Tool
//!
//! CLI for the escrow wallet service: address validation and derivation,
//! plus the operations every required signer of which is held locally
//! (settle, close, memo lookup).
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin wallet_tool -- --config config/wallet-service.toml \
//!   settle --wallet <address> --escrow <address> --amount 1000 --fee 10
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use std::str::FromStr;
use tracing::info;
use wallet_service::{
    client::validate_address, config::WalletServiceConfig, instructions, WalletServiceClient,
};

#[derive(Parser, Debug)]
#[command(name = "wallet_tool")]
#[command(about = "Operator tool for the escrow wallet service")]
struct Args {
    /// Path to configuration file (default: config/wallet-service.toml or WALLET_SERVICE_CONFIG_PATH)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that an address is a well-formed base58 pubkey
    ValidateAddress {
        address: String,
    },
    /// Derive the associated token address for a wallet and mint
    DeriveTokenAddress {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        mint: String,
    },
    /// Settle an initialized escrow payment
    Settle {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        escrow: String,
        #[arg(long)]
        amount: u64,
        #[arg(long)]
        fee: Option<u64>,
        #[arg(long)]
        memo: Option<String>,
    },
    /// Close an escrow account and reclaim its rent
    Close {
        #[arg(long)]
        escrow: String,
        #[arg(long)]
        memo: Option<String>,
    },
    /// Find a wallet transaction signature by its memo tag
    FindMemo {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        memo: String,
        #[arg(long)]
        until: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt::init();

    match args.command {
        Command::ValidateAddress { address } => {
            if validate_address(&address) {
                println!("valid");
            } else {
                println!("invalid");
                std::process::exit(1);
            }
        }
        Command::DeriveTokenAddress { wallet, mint } => {
            let config = WalletServiceConfig::load_from_path(args.config.as_deref())?;
            let programs = config.program_registry()?;
            let wallet = parse_address(&wallet, "wallet")?;
            let mint = parse_address(&mint, "mint")?;
            let (address, _) = instructions::associated_token_address(&programs, &wallet, &mint)?;
            println!("{}", address);
        }
        Command::Settle {
            wallet,
            escrow,
            amount,
            fee,
            memo,
        } => {
            let client = load_client(args.config.as_deref())?;
            let wallet = parse_address(&wallet, "wallet")?;
            let escrow = parse_address(&escrow, "escrow")?;
            let output = client
                .settle_escrow_payment(&wallet, &escrow, amount, fee, memo.as_deref())
                .await?;
            println!("signature: {}", output.signature);
            println!("destination: {}", output.destination);
        }
        Command::Close { escrow, memo } => {
            let client = load_client(args.config.as_deref())?;
            let escrow = parse_address(&escrow, "escrow")?;
            let signature = client.close_escrow_payment(&escrow, memo.as_deref()).await?;
            println!("signature: {}", signature);
        }
        Command::FindMemo {
            wallet,
            memo,
            until,
        } => {
            let client = load_client(args.config.as_deref())?;
            let wallet = parse_address(&wallet, "wallet")?;
            let until = until
                .map(|value| Signature::from_str(&value).context("Invalid until signature"))
                .transpose()?;
            match client
                .find_transaction_signature_by_memo(&wallet, &memo, until)
                .await?
            {
                Some(signature) => println!("{}", signature),
                None => {
                    println!("not found");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn load_client(config_path: Option<&str>) -> Result<WalletServiceClient> {
    let config = WalletServiceConfig::load_from_path(config_path)?;
    info!("Connecting to {}", config.service.rpc_url);
    WalletServiceClient::from_config(&config)
}

fn parse_address(value: &str, name: &str) -> Result<Pubkey> {
    Pubkey::from_str(value).map_err(|_| anyhow::anyhow!("Invalid {} address: '{}'", name, value))
}
