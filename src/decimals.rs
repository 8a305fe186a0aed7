//! SPL mint metadata lookups.

use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;

/// Byte offset of the `decimals` field inside an SPL mint account.
pub const MINT_DECIMALS_OFFSET: usize = 44;

/// Fetch the decimal scale for a mint.
///
/// One RPC read, no caching. Returns `None` when the account does not exist
/// or its payload is shorter than the mint layout. A pool whose mints cannot
/// be resolved cannot be priced, so callers must abort setup on `None`
/// rather than defaulting.
pub async fn resolve_decimals(rpc: &RpcClient, mint: &Pubkey) -> Option<u8> {
    let account = match rpc.get_account(mint).await {
        Ok(account) => account,
        Err(e) => {
            log::error!("Failed to fetch mint account {}: {}", mint, e);
            return None;
        }
    };
    match account.data.get(MINT_DECIMALS_OFFSET).copied() {
        Some(decimals) => Some(decimals),
        None => {
            log::error!(
                "Mint account {} too short for a decimals field ({} bytes)",
                mint,
                account.data.len()
            );
            None
        }
    }
}
