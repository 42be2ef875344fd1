//! Shared test helpers for wallet service tests
//!
//! Provides a client wired to an arbitrary RPC URL, canonical program
//! registries, sample on-chain records, and JSON-RPC response builders for
//! the mocked ledger endpoints.

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use solana_sdk::signer::Signer;
use std::str::FromStr;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wallet_service::instructions::{
    ProgramRegistry, ASSOCIATED_TOKEN_PROGRAM_ID, MEMO_PROGRAM_ID, TOKEN_PROGRAM_ID,
    WRAPPED_NATIVE_MINT,
};
use wallet_service::state::{EscrowRecord, TokenAccountRecord, TokenAccountState};
use wallet_service::WalletServiceClient;

// ============================================================================
// CLIENT CONSTRUCTION
// ============================================================================

/// A client plus the addresses of the keys it holds.
pub struct TestContext {
    pub client: WalletServiceClient,
    pub fee_payer: Pubkey,
    pub authority: Pubkey,
    pub fee_taker: Pubkey,
    pub escrow_program: Pubkey,
    pub programs: ProgramRegistry,
}

/// Registry pointing at the canonical program deployments.
pub fn canonical_programs() -> ProgramRegistry {
    ProgramRegistry {
        token_program: Pubkey::from_str(TOKEN_PROGRAM_ID).unwrap(),
        associated_token_program: Pubkey::from_str(ASSOCIATED_TOKEN_PROGRAM_ID).unwrap(),
        wrapped_native_mint: Pubkey::from_str(WRAPPED_NATIVE_MINT).unwrap(),
        memo_program: Pubkey::from_str(MEMO_PROGRAM_ID).unwrap(),
    }
}

/// Builds a client with fresh keypairs against `rpc_url`.
pub fn test_context(rpc_url: &str) -> TestContext {
    let fee_payer = Keypair::new();
    let authority = Keypair::new();
    let fee_taker = Pubkey::new_unique();
    let escrow_program = Pubkey::new_unique();
    let programs = canonical_programs();

    TestContext {
        fee_payer: fee_payer.pubkey(),
        authority: authority.pubkey(),
        fee_taker,
        escrow_program,
        programs: programs.clone(),
        client: WalletServiceClient::new(
            RpcClient::new_with_commitment(rpc_url.to_string(), CommitmentConfig::confirmed()),
            fee_payer,
            authority,
            fee_taker,
            escrow_program,
            programs,
        ),
    }
}

// ============================================================================
// SAMPLE RECORDS
// ============================================================================

/// An initialized, unsettled escrow record.
pub fn escrow_record(
    authority: Pubkey,
    fee_taker: Pubkey,
    payer_temp_token_account: Pubkey,
    amount: u64,
    fee: u64,
) -> EscrowRecord {
    EscrowRecord {
        is_initialized: true,
        is_settled: false,
        payer: Pubkey::new_unique(),
        payee: Pubkey::new_unique(),
        payer_temp_token_account,
        authority,
        fee_taker,
        amount,
        fee,
    }
}

/// An initialized token account holding a non-native mint.
pub fn token_record(owner: Pubkey, mint: Pubkey, amount: u64) -> TokenAccountRecord {
    TokenAccountRecord {
        mint,
        owner,
        amount,
        delegate: None,
        delegated_amount: 0,
        state: TokenAccountState::Initialized,
        is_native: false,
        rent_exempt_reserve: None,
        close_authority: None,
    }
}

/// An initialized wrapped-native token account.
pub fn native_token_record(owner: Pubkey, amount: u64) -> TokenAccountRecord {
    TokenAccountRecord {
        mint: Pubkey::from_str(WRAPPED_NATIVE_MINT).unwrap(),
        owner,
        amount,
        delegate: None,
        delegated_amount: 0,
        state: TokenAccountState::Initialized,
        is_native: true,
        rent_exempt_reserve: Some(2_039_280),
        close_authority: None,
    }
}

// ============================================================================
// JSON-RPC RESPONSE BUILDERS
// ============================================================================

/// getAccountInfo response carrying base64 account data.
pub fn account_info_response(data: &[u8], owner: &Pubkey, lamports: u64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "context": { "slot": 1 },
            "value": {
                "data": [STANDARD.encode(data), "base64"],
                "executable": false,
                "lamports": lamports,
                "owner": owner.to_string(),
                "rentEpoch": 0,
                "space": data.len()
            }
        },
        "id": 1
    })
}

/// getAccountInfo response for a missing account.
pub fn missing_account_response() -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": { "context": { "slot": 1 }, "value": null },
        "id": 1
    })
}

/// getLatestBlockhash response with a fresh blockhash.
pub fn latest_blockhash_response() -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": {
            "context": { "slot": 1 },
            "value": {
                "blockhash": Hash::new_unique().to_string(),
                "lastValidBlockHeight": 100
            }
        },
        "id": 1
    })
}

/// getMinimumBalanceForRentExemption response.
pub fn rent_exemption_response(lamports: u64) -> Value {
    json!({ "jsonrpc": "2.0", "result": lamports, "id": 1 })
}

/// sendTransaction response with the given submission signature.
pub fn send_transaction_response(signature: &str) -> Value {
    json!({ "jsonrpc": "2.0", "result": signature, "id": 1 })
}

/// JSON-RPC error response (e.g. a rejected submission).
pub fn rpc_error_response(message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "error": { "code": -32002, "message": message },
        "id": 1
    })
}

/// getSignaturesForAddress response from (signature, memo) pairs.
pub fn signatures_for_address_response(entries: &[(&str, Option<&str>)]) -> Value {
    let list: Vec<Value> = entries
        .iter()
        .map(|(signature, memo)| {
            json!({
                "signature": signature,
                "slot": 5,
                "err": null,
                "memo": memo,
                "blockTime": null,
                "confirmationStatus": "finalized"
            })
        })
        .collect();
    json!({ "jsonrpc": "2.0", "result": list, "id": 1 })
}

// ============================================================================
// MOCK MOUNTING
// ============================================================================

/// Mounts a persistent mock answering every POST whose body contains all
/// `needles` (method name plus, optionally, an address) with `response`.
pub async fn mount_rpc(server: &MockServer, needles: &[&str], response: Value) {
    let mut mock = Mock::given(method("POST"));
    for needle in needles {
        mock = mock.and(body_string_contains(*needle));
    }
    mock.respond_with(ResponseTemplate::new(200).set_body_json(response))
        .mount(server)
        .await;
}
