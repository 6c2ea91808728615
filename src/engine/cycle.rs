//! One ingestion cycle: fetch quotes → resolve identities → persist batch.
//!
//! The batch is a single logical snapshot: every observation shares one
//! timestamp, there is exactly one per configured asset, and the rows are
//! committed in one transaction or not at all.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::catalog::ReferenceCatalog;
use crate::quotes::{ensure_complete, QuoteSource};
use crate::storage::Ledger;
use crate::types::{
    CycleError, CycleReport, NewObservation, QuoteError, OBSERVATION_QUANTITY,
};

pub struct IngestionCycle {
    source: Arc<dyn QuoteSource>,
    catalog: ReferenceCatalog,
    ledger: Ledger,
    fetch_timeout: Duration,
    persist_timeout: Duration,
}

impl IngestionCycle {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        catalog: ReferenceCatalog,
        ledger: Ledger,
        fetch_timeout: Duration,
        persist_timeout: Duration,
    ) -> Self {
        Self { source, catalog, ledger, fetch_timeout, persist_timeout }
    }

    /// Run one cycle. On any error nothing from this cycle is written.
    pub async fn run_once(&self) -> Result<CycleReport, CycleError> {
        let ts = snapshot_timestamp();
        let symbols = self.catalog.symbols();

        // 1. Quotes
        info!(symbols = ?symbols, "Fetching quotes");
        let quotes = tokio::time::timeout(self.fetch_timeout, self.source.fetch_quotes(&symbols))
            .await
            .map_err(|_| QuoteError::Timeout(self.fetch_timeout))??;
        ensure_complete(&symbols, &quotes)?;

        // 2. Identities
        let user = self.catalog.resolve_user().await?;
        let assets = self.catalog.resolve_assets(&symbols).await?;

        // 3. Batch
        let batch: Vec<NewObservation> = assets
            .iter()
            .map(|asset| NewObservation {
                timestamp: ts,
                user_id: user.id,
                asset_id: asset.id,
                quantity: OBSERVATION_QUANTITY,
                price_usd: quotes[&asset.symbol],
            })
            .collect();

        for (asset, obs) in assets.iter().zip(&batch) {
            debug!(symbol = %asset.symbol, asset_id = asset.id, price_usd = obs.price_usd, "Observation");
        }

        // Dropping the future on timeout drops the open transaction, which
        // rolls it back.
        let observations = tokio::time::timeout(self.persist_timeout, self.ledger.record_batch(&batch))
            .await
            .map_err(|_| CycleError::PersistTimeout(self.persist_timeout))?
            .map_err(CycleError::Persist)?;

        info!(
            user = %user.name,
            rows = observations.len(),
            ts = %ts.to_rfc3339(),
            "Observations recorded"
        );

        Ok(CycleReport { timestamp: ts, observations })
    }
}

/// Current UTC time truncated to the microsecond precision the ledger
/// stores, so recorded and returned timestamps compare equal.
fn snapshot_timestamp() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_micros(now.timestamp_micros()).unwrap_or(now)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
