//! On-chain account layouts for PumpSwap pool watching.
//!
//! Decoding here is pure byte transformation: fixed little-endian layouts,
//! no RPC calls. Live account data often carries bytes past the fields we
//! care about, so both decoders only require the fixed prefix and ignore
//! the rest.

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

/// Fixed prefix of a PumpSwap pool account: discriminator, bump, index,
/// six 32-byte keys and the LP supply.
pub const POOL_ACCOUNT_LEN: usize = 8 + 1 + 2 + 6 * 32 + 8;

/// Fixed prefix of an SPL token account: mint, owner and amount.
pub const TOKEN_ACCOUNT_LEN: usize = 32 + 32 + 8;

/// Errors produced while decoding raw account data.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("account data too short: need {expected} bytes, got {actual}")]
    TooShort { expected: usize, actual: usize },
    #[error("malformed account data: {0}")]
    Malformed(String),
}

/// PumpSwap pool account state, field for field as the program lays it out.
///
/// The discriminator is carried for completeness but never interpreted.
#[derive(Debug, Clone, BorshDeserialize, BorshSerialize)]
pub struct PoolAccount {
    pub discriminator: [u8; 8],
    pub pool_bump: u8,
    pub index: u16,
    pub creator: [u8; 32],
    pub base_mint: [u8; 32],
    pub quote_mint: [u8; 32],
    pub lp_mint: [u8; 32],
    pub pool_base_token_account: [u8; 32],
    pub pool_quote_token_account: [u8; 32],
    pub lp_supply: u64,
}

/// The 72-byte prefix of an SPL token account that vault updates are
/// decoded from.
#[derive(Debug, Clone, PartialEq, Eq, BorshDeserialize, BorshSerialize)]
pub struct TokenAccountRecord {
    pub mint: [u8; 32],
    pub owner: [u8; 32],
    pub amount: u64,
}

/// Decode a PumpSwap pool account from raw account data.
pub fn decode_pool(data: &[u8]) -> Result<PoolAccount, DecodeError> {
    if data.len() < POOL_ACCOUNT_LEN {
        return Err(DecodeError::TooShort {
            expected: POOL_ACCOUNT_LEN,
            actual: data.len(),
        });
    }
    PoolAccount::deserialize(&mut &data[..POOL_ACCOUNT_LEN])
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}

/// Decode the token account prefix from raw account data.
pub fn decode_token_account(data: &[u8]) -> Result<TokenAccountRecord, DecodeError> {
    if data.len() < TOKEN_ACCOUNT_LEN {
        return Err(DecodeError::TooShort {
            expected: TOKEN_ACCOUNT_LEN,
            actual: data.len(),
        });
    }
    TokenAccountRecord::deserialize(&mut &data[..TOKEN_ACCOUNT_LEN])
        .map_err(|e| DecodeError::Malformed(e.to_string()))
}
