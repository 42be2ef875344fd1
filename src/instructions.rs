//! Instruction builders and address derivation
//!
//! Pure, I/O-free constructors for every instruction this service submits,
//! plus the deterministic address derivations the escrow protocol and the
//! associated-token convention rely on. Builders accept already-resolved
//! addresses and amounts only; sequencing them into transactions is the
//! client's job.

use solana_sdk::{
    instruction::{AccountMeta, Instruction},
    pubkey::Pubkey,
    system_program, sysvar,
};

use crate::error::WalletServiceError;

// Well-known program IDs from Solana mainnet/devnet docs.
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";
pub const ASSOCIATED_TOKEN_PROGRAM_ID: &str = "ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL";
pub const WRAPPED_NATIVE_MINT: &str = "So11111111111111111111111111111111111111112";
pub const MEMO_PROGRAM_ID: &str = "MemoSq4gqABAXKb96qnH8TySNcWxMyWCqXgDLGmfcHr";

// Token program opcodes used by this service.
const TOKEN_OP_INITIALIZE_ACCOUNT: u8 = 1;
const TOKEN_OP_TRANSFER: u8 = 3;

/// Seed literal for the escrow program's settlement authority.
const ESCROW_AUTHORITY_SEED: &[u8] = b"escrow";

/// Resolved program addresses used when deriving addresses and building
/// instructions. Held as immutable configuration so tests can substitute
/// alternate program deployments.
#[derive(Debug, Clone)]
pub struct ProgramRegistry {
    pub token_program: Pubkey,
    pub associated_token_program: Pubkey,
    pub wrapped_native_mint: Pubkey,
    pub memo_program: Pubkey,
}

/// Escrow program instruction payloads: a 1-byte opcode followed by
/// opcode-specific little-endian fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscrowInstructionData {
    /// Opcode 0: locks `amount` tokens in a freshly created escrow account.
    Initialize { amount: u64 },
    /// Opcode 1: releases the escrowed tokens, paying `fee` to the fee taker.
    Settle { fee: u64 },
    /// Opcode 2: closes the escrow account and reclaims its lamports.
    Close,
}

impl EscrowInstructionData {
    pub fn pack(&self) -> Vec<u8> {
        match self {
            EscrowInstructionData::Initialize { amount } => pack_tagged_u64(0, *amount),
            EscrowInstructionData::Settle { fee } => pack_tagged_u64(1, *fee),
            EscrowInstructionData::Close => vec![2],
        }
    }

    /// Decodes a payload, rejecting unknown opcodes and any length that is
    /// not exactly the opcode's fixed span.
    pub fn unpack(input: &[u8]) -> Result<Self, WalletServiceError> {
        let (tag, rest) = input
            .split_first()
            .ok_or(WalletServiceError::MalformedRecord)?;
        match tag {
            0 => Ok(EscrowInstructionData::Initialize {
                amount: unpack_u64(rest)?,
            }),
            1 => Ok(EscrowInstructionData::Settle {
                fee: unpack_u64(rest)?,
            }),
            2 if rest.is_empty() => Ok(EscrowInstructionData::Close),
            _ => Err(WalletServiceError::MalformedRecord),
        }
    }
}

fn pack_tagged_u64(tag: u8, value: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(9);
    data.push(tag);
    data.extend_from_slice(&value.to_le_bytes());
    data
}

fn unpack_u64(input: &[u8]) -> Result<u64, WalletServiceError> {
    if input.len() != 8 {
        return Err(WalletServiceError::MalformedRecord);
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(input);
    Ok(u64::from_le_bytes(bytes))
}

/// Derives the associated token account address for `(wallet, mint)`.
///
/// Pure and deterministic: recomputing with identical inputs always yields
/// the same address, which is what makes idempotent resolution possible
/// without a side channel.
pub fn associated_token_address(
    programs: &ProgramRegistry,
    wallet: &Pubkey,
    mint: &Pubkey,
) -> Result<(Pubkey, u8), WalletServiceError> {
    Pubkey::try_find_program_address(
        &[
            wallet.as_ref(),
            programs.token_program.as_ref(),
            mint.as_ref(),
        ],
        &programs.associated_token_program,
    )
    .ok_or(WalletServiceError::AddressDerivationExhausted)
}

/// Derives the escrow program's non-signing settlement authority.
pub fn escrow_authority_address(
    escrow_program: &Pubkey,
) -> Result<(Pubkey, u8), WalletServiceError> {
    Pubkey::try_find_program_address(&[ESCROW_AUTHORITY_SEED], escrow_program)
        .ok_or(WalletServiceError::AddressDerivationExhausted)
}

/// Transfers a token balance between two token accounts, signed by `owner`.
pub fn token_transfer(
    token_program: &Pubkey,
    source: &Pubkey,
    destination: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *token_program,
        accounts: vec![
            AccountMeta::new(*source, false),
            AccountMeta::new(*destination, false),
            AccountMeta::new_readonly(*owner, true),
        ],
        data: pack_tagged_u64(TOKEN_OP_TRANSFER, amount),
    }
}

/// Initializes a freshly created account as a token account for `mint`,
/// owned by `owner`.
pub fn initialize_token_account(
    token_program: &Pubkey,
    account: &Pubkey,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *token_program,
        accounts: vec![
            AccountMeta::new(*account, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data: vec![TOKEN_OP_INITIALIZE_ACCOUNT],
    }
}

/// Creates and initializes the associated token account for `(owner, mint)`
/// at its derived address, funded by `payer`.
pub fn create_associated_token_account(
    programs: &ProgramRegistry,
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    associated_address: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: programs.associated_token_program,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(*associated_address, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(system_program::id(), false),
            AccountMeta::new_readonly(programs.token_program, false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
        ],
        data: vec![],
    }
}

/// Escrow initialize: six accounts in the order the program mandates, plus
/// the `{opcode 0, amount}` payload. Both the wallet and the protocol
/// authority must sign.
pub fn initialize_escrow(
    escrow_program: &Pubkey,
    wallet: &Pubkey,
    temp_token_account: &Pubkey,
    authority: &Pubkey,
    escrow_account: &Pubkey,
    token_program: &Pubkey,
    amount: u64,
) -> Instruction {
    Instruction {
        program_id: *escrow_program,
        accounts: vec![
            AccountMeta::new_readonly(*wallet, true),
            AccountMeta::new(*temp_token_account, false),
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*escrow_account, false),
            AccountMeta::new_readonly(sysvar::rent::id(), false),
            AccountMeta::new_readonly(*token_program, false),
        ],
        data: EscrowInstructionData::Initialize { amount }.pack(),
    }
}

/// Escrow settle: eight accounts with the derived escrow authority last,
/// plus the `{opcode 1, fee}` payload. Only the protocol authority signs.
#[allow(clippy::too_many_arguments)]
pub fn settle_escrow(
    escrow_program: &Pubkey,
    authority: &Pubkey,
    taker_account: &Pubkey,
    fee_taker_account: &Pubkey,
    payer_temp_token_account: &Pubkey,
    escrow_account: &Pubkey,
    fee_payer: &Pubkey,
    token_program: &Pubkey,
    escrow_authority: &Pubkey,
    fee: u64,
) -> Instruction {
    Instruction {
        program_id: *escrow_program,
        accounts: vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*taker_account, false),
            AccountMeta::new(*fee_taker_account, false),
            AccountMeta::new(*payer_temp_token_account, false),
            AccountMeta::new(*escrow_account, false),
            AccountMeta::new(*fee_payer, false),
            AccountMeta::new_readonly(*token_program, false),
            AccountMeta::new_readonly(*escrow_authority, false),
        ],
        data: EscrowInstructionData::Settle { fee }.pack(),
    }
}

/// Escrow close: the authority approves and the escrow account's lamports
/// are refunded to `refund_target`.
pub fn close_escrow(
    escrow_program: &Pubkey,
    authority: &Pubkey,
    escrow_account: &Pubkey,
    refund_target: &Pubkey,
) -> Instruction {
    Instruction {
        program_id: *escrow_program,
        accounts: vec![
            AccountMeta::new_readonly(*authority, true),
            AccountMeta::new(*escrow_account, false),
            AccountMeta::new(*refund_target, false),
        ],
        data: EscrowInstructionData::Close.pack(),
    }
}

/// Human-readable memo, optionally signed to prove provenance. Purely
/// additive; never required for correctness.
pub fn memo(memo_program: &Pubkey, text: &str, signer: Option<&Pubkey>) -> Instruction {
    let accounts = match signer {
        Some(key) => vec![AccountMeta::new_readonly(*key, true)],
        None => vec![],
    };
    Instruction {
        program_id: *memo_program,
        accounts,
        data: text.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn test_programs() -> ProgramRegistry {
        ProgramRegistry {
            token_program: Pubkey::from_str(TOKEN_PROGRAM_ID).unwrap(),
            associated_token_program: Pubkey::from_str(ASSOCIATED_TOKEN_PROGRAM_ID).unwrap(),
            wrapped_native_mint: Pubkey::from_str(WRAPPED_NATIVE_MINT).unwrap(),
            memo_program: Pubkey::from_str(MEMO_PROGRAM_ID).unwrap(),
        }
    }

    /// What is tested: payload opcodes and field bytes match the wire contract
    /// Why: the on-chain program dispatches on the exact opcode byte
    #[test]
    fn test_payload_layout() {
        let init = EscrowInstructionData::Initialize { amount: 1000 }.pack();
        assert_eq!(init[0], 0);
        assert_eq!(init[1..], 1000u64.to_le_bytes());

        let settle = EscrowInstructionData::Settle { fee: u64::MAX }.pack();
        assert_eq!(settle[0], 1);
        assert_eq!(settle[1..], u64::MAX.to_le_bytes());

        assert_eq!(EscrowInstructionData::Close.pack(), vec![2]);
    }

    /// What is tested: payload unpack round-trips and rejects malformed input
    #[test]
    fn test_payload_unpack() {
        for payload in [
            EscrowInstructionData::Initialize { amount: 0 },
            EscrowInstructionData::Settle { fee: 10 },
            EscrowInstructionData::Close,
        ] {
            assert_eq!(
                EscrowInstructionData::unpack(&payload.pack()).unwrap(),
                payload
            );
        }
        assert!(EscrowInstructionData::unpack(&[]).is_err());
        assert!(EscrowInstructionData::unpack(&[3]).is_err());
        // truncated amount
        assert!(EscrowInstructionData::unpack(&[0, 1, 2]).is_err());
        // trailing bytes after close
        assert!(EscrowInstructionData::unpack(&[2, 0]).is_err());
    }

    /// What is tested: associated token derivation is pure and deterministic
    /// Why: idempotent resolution recomputes the address instead of storing it
    #[test]
    fn test_associated_token_address_deterministic() {
        let programs = test_programs();
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let first = associated_token_address(&programs, &wallet, &mint).unwrap();
        let second = associated_token_address(&programs, &wallet, &mint).unwrap();
        assert_eq!(first, second);

        let other_mint = Pubkey::new_unique();
        let third = associated_token_address(&programs, &wallet, &other_mint).unwrap();
        assert_ne!(first.0, third.0);
    }

    /// What is tested: settle instruction account order and signer flags
    /// Why: the on-chain program indexes accounts positionally
    #[test]
    fn test_settle_escrow_account_order() {
        let programs = test_programs();
        let escrow_program = Pubkey::new_unique();
        let authority = Pubkey::new_unique();
        let taker = Pubkey::new_unique();
        let fee_taker = Pubkey::new_unique();
        let temp = Pubkey::new_unique();
        let escrow = Pubkey::new_unique();
        let fee_payer = Pubkey::new_unique();
        let (escrow_authority, _) = escrow_authority_address(&escrow_program).unwrap();

        let instruction = settle_escrow(
            &escrow_program,
            &authority,
            &taker,
            &fee_taker,
            &temp,
            &escrow,
            &fee_payer,
            &programs.token_program,
            &escrow_authority,
            10,
        );

        let keys: Vec<Pubkey> = instruction.accounts.iter().map(|meta| meta.pubkey).collect();
        assert_eq!(
            keys,
            vec![
                authority,
                taker,
                fee_taker,
                temp,
                escrow,
                fee_payer,
                programs.token_program,
                escrow_authority
            ]
        );
        assert!(instruction.accounts[0].is_signer);
        assert!(!instruction.accounts[0].is_writable);
        assert!(instruction.accounts[1].is_writable);
        assert!(!instruction.accounts[7].is_signer);
    }

    /// What is tested: initialize instruction marks wallet and authority as signers
    #[test]
    fn test_initialize_escrow_signers() {
        let programs = test_programs();
        let escrow_program = Pubkey::new_unique();
        let wallet = Pubkey::new_unique();
        let authority = Pubkey::new_unique();

        let instruction = initialize_escrow(
            &escrow_program,
            &wallet,
            &Pubkey::new_unique(),
            &authority,
            &Pubkey::new_unique(),
            &programs.token_program,
            1000,
        );

        assert_eq!(instruction.accounts.len(), 6);
        assert!(instruction.accounts[0].is_signer);
        assert!(instruction.accounts[2].is_signer);
        assert!(instruction.accounts[1].is_writable);
        assert!(instruction.accounts[3].is_writable);
        assert_eq!(instruction.data[0], 0);
    }

    /// What is tested: memo instruction carries UTF-8 bytes and the optional signer
    #[test]
    fn test_memo_instruction() {
        let programs = test_programs();
        let signer = Pubkey::new_unique();

        let unsigned = memo(&programs.memo_program, "order-42", None);
        assert!(unsigned.accounts.is_empty());
        assert_eq!(unsigned.data, b"order-42");

        let signed = memo(&programs.memo_program, "order-42", Some(&signer));
        assert_eq!(signed.accounts.len(), 1);
        assert!(signed.accounts[0].is_signer);
    }
}
