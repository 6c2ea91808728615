//! Shared types for the tracker.
//!
//! The reference catalog (users, assets), the observation records written by
//! the ingestion cycle, and the error taxonomy shared by the quote source,
//! catalog and engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Units recorded per observation. The tracker logs price snapshots, not
/// trade sizes, so every row carries exactly one unit.
pub const OBSERVATION_QUANTITY: u32 = 1;

/// Symbol → USD price snapshot returned by a quote source.
pub type Quotes = HashMap<String, f64>;

// ---------------------------------------------------------------------------
// Reference catalog
// ---------------------------------------------------------------------------

/// The single identity every observation is attributed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
}

/// A tracked asset with its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Asset {
    pub id: i64,
    /// Ticker symbol, e.g. "BTC". Unique in the store.
    pub symbol: String,
    pub name: String,
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, id={})", self.symbol, self.name, self.id)
    }
}

/// Configured description of an asset, before it has a store id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSpec {
    pub symbol: String,
    pub name: String,
    /// Identifier used by the quote provider. Defaults to `name`
    /// (CoinGecko ids are the lowercase coin names, e.g. "bitcoin").
    #[serde(default)]
    pub quote_id: Option<String>,
}

impl AssetSpec {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            quote_id: None,
        }
    }

    pub fn quote_id(&self) -> &str {
        self.quote_id.as_deref().unwrap_or(&self.name)
    }
}

// ---------------------------------------------------------------------------
// Observations
// ---------------------------------------------------------------------------

/// One recorded price snapshot: "this user observed `quantity` units of this
/// asset at `price_usd` at `timestamp`". Stored in the `transactions` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub asset_id: i64,
    pub quantity: u32,
    pub price_usd: f64,
}

/// An observation that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewObservation {
    pub timestamp: DateTime<Utc>,
    pub user_id: i64,
    pub asset_id: i64,
    pub quantity: u32,
    pub price_usd: f64,
}

/// A recorded price joined with its asset, as read back for the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub symbol: String,
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub price_usd: f64,
}

/// Summary of a single fetch → resolve → persist cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub observations: Vec<Observation>,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cycle @ {}: {} observations recorded",
            self.timestamp.to_rfc3339(),
            self.observations.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failure to obtain a complete quote snapshot.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("Quote transport error: {0}")]
    Transport(String),

    #[error("Quote decode error: {0}")]
    Decode(String),

    #[error("Quote missing for symbol {0}")]
    MissingQuote(String),

    #[error("Quote fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure to resolve reference data.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Not found in catalog: {0}")]
    NotFound(String),

    #[error("Catalog store error: {0}")]
    Store(#[from] sqlx::Error),
}

/// Why an ingestion cycle was aborted. No observations are written in any
/// of these cases.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] QuoteError),

    #[error("Resolution failed: {0}")]
    Resolution(#[from] CatalogError),

    #[error("Persist failed: {0}")]
    Persist(#[source] sqlx::Error),

    #[error("Persist timed out after {0:?}")]
    PersistTimeout(Duration),
}

impl CycleError {
    /// A missing user or asset means seeding never ran or failed; ingesting
    /// without identities is meaningless, so the run stops. Everything else
    /// is retried at the next interval.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CycleError::Resolution(CatalogError::NotFound(_)))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
