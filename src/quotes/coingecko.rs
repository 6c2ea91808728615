//! CoinGecko simple-price client.
//!
//! API docs: https://docs.coingecko.com/reference/simple-price
//! Base URL: https://api.coingecko.com/api/v3
//! Auth: demo key in the `x-cg-demo-api-key` header (optional, raises the
//! rate limit).
//!
//! CoinGecko addresses coins by id ("bitcoin"), not ticker ("BTC"), so the
//! client carries the symbol → id mapping from the catalog configuration.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use super::{ensure_complete, QuoteSource};
use crate::types::{AssetSpec, QuoteError, Quotes};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";

const API_KEY_HEADER: &str = "x-cg-demo-api-key";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

/// One entry of the `simple/price` response: `{"bitcoin": {"usd": 65000}}`.
#[derive(Debug, Deserialize)]
struct SimplePrice {
    #[serde(default)]
    usd: Option<f64>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    api_key: Option<SecretString>,
    /// symbol → CoinGecko coin id
    ids: HashMap<String, String>,
}

impl CoinGeckoClient {
    pub fn new(
        base_url: &str,
        api_key: Option<SecretString>,
        assets: &[AssetSpec],
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("tiger-tracker/0.1.0")
            .build()
            .context("Failed to build HTTP client for CoinGecko")?;

        let ids = assets
            .iter()
            .map(|a| (a.symbol.clone(), a.quote_id().to_string()))
            .collect();

        info!(
            base_url,
            authenticated = api_key.is_some(),
            assets = assets.len(),
            "CoinGecko client ready"
        );

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            ids,
        })
    }

    /// Map requested symbols to CoinGecko ids, in request order.
    fn coin_ids(&self, symbols: &[String]) -> Result<Vec<(String, String)>, QuoteError> {
        symbols
            .iter()
            .map(|s| {
                self.ids
                    .get(s)
                    .map(|id| (s.clone(), id.clone()))
                    .ok_or_else(|| QuoteError::MissingQuote(s.clone()))
            })
            .collect()
    }

    fn price_url(&self, pairs: &[(String, String)]) -> String {
        let ids: Vec<&str> = pairs.iter().map(|(_, id)| id.as_str()).collect();
        format!(
            "{}/simple/price?vs_currencies=usd&ids={}",
            self.base_url,
            urlencoding::encode(&ids.join(",")),
        )
    }

    /// Decode a `simple/price` body into a symbol-keyed snapshot. Every
    /// requested coin must be present with a USD price.
    fn parse_prices(body: &str, pairs: &[(String, String)]) -> Result<Quotes, QuoteError> {
        let raw: HashMap<String, SimplePrice> = serde_json::from_str(body)
            .map_err(|e| QuoteError::Decode(format!("CoinGecko response: {e}")))?;

        let mut quotes = Quotes::with_capacity(pairs.len());
        for (symbol, id) in pairs {
            let price = raw
                .get(id)
                .and_then(|p| p.usd)
                .ok_or_else(|| QuoteError::MissingQuote(symbol.clone()))?;
            quotes.insert(symbol.clone(), price);
        }

        let symbols: Vec<String> = pairs.iter().map(|(s, _)| s.clone()).collect();
        ensure_complete(&symbols, &quotes)?;
        Ok(quotes)
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoClient {
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Quotes, QuoteError> {
        let pairs = self.coin_ids(symbols)?;
        let url = self.price_url(&pairs);
        debug!(url = %url, "Calling CoinGecko");

        let mut req = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            req = req.header(API_KEY_HEADER, key.expose_secret().as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| QuoteError::Transport(format!("CoinGecko request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(QuoteError::Transport(format!("CoinGecko API error {status}: {body}")));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| QuoteError::Transport(format!("Failed to read CoinGecko body: {e}")))?;

        let quotes = Self::parse_prices(&body, &pairs)?;
        debug!(?quotes, "CoinGecko prices");
        Ok(quotes)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> CoinGeckoClient {
        let assets = vec![
            AssetSpec::new("BTC", "bitcoin"),
            AssetSpec::new("SOL", "solana"),
            AssetSpec::new("ETH", "ethereum"),
        ];
        CoinGeckoClient::new(DEFAULT_BASE_URL, None, &assets, Duration::from_secs(5)).unwrap()
    }

    fn all_symbols() -> Vec<String> {
        vec!["BTC".into(), "SOL".into(), "ETH".into()]
    }

    #[test]
    fn test_price_url() {
        let c = client();
        let pairs = c.coin_ids(&all_symbols()).unwrap();
        assert_eq!(
            c.price_url(&pairs),
            "https://api.coingecko.com/api/v3/simple/price?vs_currencies=usd&ids=bitcoin%2Csolana%2Cethereum"
        );
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let c = CoinGeckoClient::new(
            "http://localhost:9000/",
            None,
            &[AssetSpec::new("BTC", "bitcoin")],
            Duration::from_secs(1),
        )
        .unwrap();
        let pairs = c.coin_ids(&["BTC".to_string()]).unwrap();
        assert!(c.price_url(&pairs).starts_with("http://localhost:9000/simple/price?"));
    }

    #[test]
    fn test_unknown_symbol() {
        let err = client().coin_ids(&["DOGE".to_string()]).unwrap_err();
        assert!(matches!(err, QuoteError::MissingQuote(s) if s == "DOGE"));
    }

    #[test]
    fn test_parse_prices() {
        let c = client();
        let pairs = c.coin_ids(&all_symbols()).unwrap();
        // Bitcoin arrives as an integer.
        let body = r#"{"bitcoin":{"usd":65000},"solana":{"usd":150.25},"ethereum":{"usd":3200.5}}"#;

        let quotes = CoinGeckoClient::parse_prices(body, &pairs).unwrap();
        assert_eq!(quotes["BTC"], 65_000.0);
        assert_eq!(quotes["SOL"], 150.25);
        assert_eq!(quotes["ETH"], 3_200.5);
    }

    #[test]
    fn test_parse_missing_coin_fails() {
        let c = client();
        let pairs = c.coin_ids(&all_symbols()).unwrap();
        let body = r#"{"bitcoin":{"usd":65000},"solana":{"usd":150.25}}"#;

        let err = CoinGeckoClient::parse_prices(body, &pairs).unwrap_err();
        assert!(matches!(err, QuoteError::MissingQuote(s) if s == "ETH"));
    }

    #[test]
    fn test_parse_missing_usd_fails() {
        let c = client();
        let pairs = c.coin_ids(&["BTC".to_string()]).unwrap();
        let err = CoinGeckoClient::parse_prices(r#"{"bitcoin":{"eur":60000}}"#, &pairs).unwrap_err();
        assert!(matches!(err, QuoteError::MissingQuote(_)));
    }

    #[test]
    fn test_parse_malformed_body_is_decode_error() {
        let c = client();
        let pairs = c.coin_ids(&all_symbols()).unwrap();
        for body in ["", "not json", r#"{"status":{"error_code":429}}"#, r#"[1,2,3]"#] {
            let err = CoinGeckoClient::parse_prices(body, &pairs).unwrap_err();
            assert!(
                matches!(err, QuoteError::Decode(_) | QuoteError::MissingQuote(_)),
                "body {body:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_parse_negative_price_rejected() {
        let c = client();
        let pairs = c.coin_ids(&["BTC".to_string()]).unwrap();
        let err = CoinGeckoClient::parse_prices(r#"{"bitcoin":{"usd":-5}}"#, &pairs).unwrap_err();
        assert!(matches!(err, QuoteError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let c = CoinGeckoClient::new(
            "http://127.0.0.1:1",
            None,
            &[AssetSpec::new("BTC", "bitcoin")],
            Duration::from_secs(2),
        )
        .unwrap();
        let err = c.fetch_quotes(&["BTC".to_string()]).await.unwrap_err();
        assert!(matches!(err, QuoteError::Transport(_)));
    }
}
