//! Reference catalog.
//!
//! Guarantees the configured user and assets exist in the ledger and maps
//! symbols to store-assigned identifiers. Seeding is best-effort: a failed
//! upsert is logged and the remaining entities are still attempted.

use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::storage::Ledger;
use crate::types::{Asset, AssetSpec, CatalogError, User};

/// Outcome of a seeding pass.
#[derive(Debug, Default, Clone)]
pub struct SeedReport {
    /// Entities written, e.g. "user:Bryan", "asset:BTC".
    pub seeded: Vec<String>,
    /// Entities that failed, with the store error message.
    pub failed: Vec<(String, String)>,
}

impl SeedReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The configured identity and asset set for this deployment.
#[derive(Debug, Clone)]
pub struct ReferenceCatalog {
    ledger: Ledger,
    user: String,
    assets: Vec<AssetSpec>,
}

impl ReferenceCatalog {
    pub fn new(ledger: Ledger, user: impl Into<String>, assets: Vec<AssetSpec>) -> Self {
        Self { ledger, user: user.into(), assets }
    }

    /// Configured symbols, in configuration order.
    pub fn symbols(&self) -> Vec<String> {
        self.assets.iter().map(|a| a.symbol.clone()).collect()
    }

    /// Upsert the user and every configured asset. Safe to run on every
    /// start: the unique keys on `users.name` and `assets.symbol` turn a
    /// repeat into an in-place update.
    pub async fn seed(&self) -> SeedReport {
        let mut report = SeedReport::default();

        let key = format!("user:{}", self.user);
        match self.ledger.upsert_user(&self.user).await {
            Ok(user) => {
                debug!(id = user.id, name = %user.name, "User seeded");
                report.seeded.push(key);
            }
            Err(e) => {
                warn!(error = %e, name = %self.user, "Failed to seed user");
                report.failed.push((key, e.to_string()));
            }
        }

        for spec in &self.assets {
            let key = format!("asset:{}", spec.symbol);
            match self.ledger.upsert_asset(&spec.symbol, &spec.name).await {
                Ok(asset) => {
                    debug!(%asset, "Asset seeded");
                    report.seeded.push(key);
                }
                Err(e) => {
                    warn!(error = %e, symbol = %spec.symbol, "Failed to seed asset");
                    report.failed.push((key, e.to_string()));
                }
            }
        }

        info!(
            seeded = report.seeded.len(),
            failed = report.failed.len(),
            "Reference data seeded"
        );
        report
    }

    /// Look up `symbols` in the store, returning assets in the same order.
    pub async fn resolve_assets(&self, symbols: &[String]) -> Result<Vec<Asset>, CatalogError> {
        let mut by_symbol: HashMap<String, Asset> = self
            .ledger
            .find_assets(symbols)
            .await?
            .into_iter()
            .map(|a| (a.symbol.clone(), a))
            .collect();

        symbols
            .iter()
            .map(|s| {
                by_symbol
                    .remove(s)
                    .ok_or_else(|| CatalogError::NotFound(format!("asset {s}")))
            })
            .collect()
    }

    /// The first (and only) user in the store.
    pub async fn resolve_user(&self) -> Result<User, CatalogError> {
        let user = self
            .ledger
            .first_user()
            .await?
            .ok_or_else(|| CatalogError::NotFound("user".into()))?;
        debug!(id = user.id, "Found user");
        Ok(user)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
