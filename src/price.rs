//! Quote/base price math for pool vault balances.

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;

/// Wrapped SOL mint: So11111111111111111111111111111111111111112
pub const NATIVE_MINT: Pubkey = Pubkey::new_from_array([
    6, 155, 136, 87, 254, 171, 129, 132, 251, 104, 127, 99, 70, 24, 192, 53, 218, 196, 57, 220,
    26, 235, 59, 85, 152, 160, 240, 0, 0, 0, 0, 1,
]);

/// Convert raw vault balances into a SOL-per-token price.
///
/// When the base side is SOL the ratio is inverted so the result is always
/// expressed in SOL per token. A base with 9 decimals is treated as SOL even
/// when the mint does not match [`NATIVE_MINT`]; this mirrors existing
/// PumpSwap tooling and is a known approximation, not a guarantee.
///
/// Returns `None` when the divisor side is zero, i.e. the pool has no
/// observable liquidity yet, or when a decimal scale is unrepresentable.
pub fn compute_price(
    base_amount: u64,
    quote_amount: u64,
    base_decimals: u8,
    quote_decimals: u8,
    base_mint: &Pubkey,
) -> Option<Decimal> {
    let base_is_native = *base_mint == NATIVE_MINT || base_decimals == 9;
    let (num_amount, num_decimals, div_amount, div_decimals) = if base_is_native {
        (base_amount, base_decimals, quote_amount, quote_decimals)
    } else {
        (quote_amount, quote_decimals, base_amount, base_decimals)
    };
    if div_amount == 0 {
        return None;
    }

    // Exact decimal arithmetic; u64 amounts at scales up to 28 cannot lose
    // precision the way f64 division would.
    let numerator = Decimal::try_from_i128_with_scale(num_amount as i128, num_decimals as u32).ok()?;
    let divisor = Decimal::try_from_i128_with_scale(div_amount as i128, div_decimals as u32).ok()?;
    numerator.checked_div(divisor)
}
