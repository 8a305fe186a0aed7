//! PumpSwap pool discovery via the DexScreener token API.

use anyhow::{Context, Result};
use serde::Deserialize;

/// Default DexScreener token endpoint.
pub const DEXSCREENER_API: &str = "https://api.dexscreener.com/latest/dex/tokens";

/// Venue identifiers DexScreener has used for PumpSwap pairs.
const PUMPSWAP_DEX_IDS: [&str; 2] = ["pumpswap", "pump-swap"];

#[derive(Debug, Deserialize)]
struct TokenPairsResponse {
    #[serde(default)]
    pairs: Option<Vec<PairRecord>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairRecord {
    #[serde(default)]
    dex_id: String,
    #[serde(default)]
    pair_address: Option<String>,
}

fn is_pumpswap(dex_id: &str) -> bool {
    let dex_id = dex_id.to_lowercase();
    PUMPSWAP_DEX_IDS.iter().any(|id| dex_id.contains(id))
}

fn select_pumpswap_pair(pairs: Vec<PairRecord>) -> Option<String> {
    pairs
        .into_iter()
        .find(|pair| is_pumpswap(&pair.dex_id))
        .and_then(|pair| pair.pair_address)
}

/// Look up the PumpSwap pool (pair) address for a token mint.
///
/// Returns `Ok(None)` when DexScreener lists no PumpSwap pair for the mint.
pub async fn find_pool_address(
    client: &reqwest::Client,
    base_url: &str,
    mint: &str,
) -> Result<Option<String>> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), mint);
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("DexScreener request for {} failed", mint))?
        .error_for_status()
        .context("DexScreener returned an error status")?;
    let body: TokenPairsResponse = response
        .json()
        .await
        .context("invalid DexScreener response body")?;
    Ok(select_pumpswap_pair(body.pairs.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn venue_match_is_case_insensitive() {
        assert!(is_pumpswap("pumpswap"));
        assert!(is_pumpswap("PumpSwap"));
        assert!(is_pumpswap("PUMP-SWAP"));
        assert!(!is_pumpswap("raydium"));
        assert!(!is_pumpswap(""));
    }

    #[test]
    fn picks_first_pumpswap_pair() {
        let body = r#"{
            "schemaVersion": "1.0.0",
            "pairs": [
                {"dexId": "raydium", "pairAddress": "AAA"},
                {"dexId": "PumpSwap", "pairAddress": "BBB"},
                {"dexId": "pumpswap", "pairAddress": "CCC"}
            ]
        }"#;
        let parsed: TokenPairsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(
            select_pumpswap_pair(parsed.pairs.unwrap()),
            Some("BBB".to_string())
        );
    }

    #[test]
    fn no_pairs_yields_none() {
        let parsed: TokenPairsResponse = serde_json::from_str(r#"{"pairs": null}"#).unwrap();
        assert_eq!(select_pumpswap_pair(parsed.pairs.unwrap_or_default()), None);

        let parsed: TokenPairsResponse = serde_json::from_str(
            r#"{"pairs": [{"dexId": "orca", "pairAddress": "AAA"}]}"#,
        )
        .unwrap();
        assert_eq!(select_pumpswap_pair(parsed.pairs.unwrap()), None);
    }
}
