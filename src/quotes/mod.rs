//! Quote sources.
//!
//! Defines the `QuoteSource` trait and the CoinGecko implementation used in
//! production.

pub mod coingecko;

use async_trait::async_trait;

use crate::types::{QuoteError, Quotes};

/// Abstraction over an external price provider.
///
/// Implementors return a USD price for every requested symbol or fail the
/// whole call; partial snapshots are never returned.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Fetch current USD prices for `symbols`.
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Quotes, QuoteError>;
}

/// Check a snapshot covers every requested symbol with a usable price.
pub fn ensure_complete(symbols: &[String], quotes: &Quotes) -> Result<(), QuoteError> {
    for symbol in symbols {
        match quotes.get(symbol) {
            None => return Err(QuoteError::MissingQuote(symbol.clone())),
            Some(p) if !p.is_finite() || *p < 0.0 => {
                return Err(QuoteError::Decode(format!("invalid price for {symbol}: {p}")));
            }
            Some(_) => {}
        }
    }
    Ok(())
}
