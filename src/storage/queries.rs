//! Read-side queries backing the dashboard.

use chrono::{DateTime, Utc};

use super::{micros_to_datetime, Ledger};
use crate::types::PricePoint;

#[derive(sqlx::FromRow)]
struct PricePointRow {
    symbol: String,
    name: String,
    ts: i64,
    price_usd: f64,
}

impl TryFrom<PricePointRow> for PricePoint {
    type Error = sqlx::Error;

    fn try_from(row: PricePointRow) -> Result<Self, Self::Error> {
        Ok(PricePoint {
            symbol: row.symbol,
            name: row.name,
            timestamp: micros_to_datetime(row.ts)?,
            price_usd: row.price_usd,
        })
    }
}

impl Ledger {
    /// The most recent recorded price for every asset, ordered by symbol.
    pub async fn latest_prices(&self) -> Result<Vec<PricePoint>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PricePointRow>(
            "SELECT a.symbol, a.name, t.ts, t.price_usd
             FROM transactions t
             JOIN assets a ON a.id = t.asset_id
             WHERE t.id = (
                 SELECT t2.id FROM transactions t2
                 WHERE t2.asset_id = t.asset_id
                 ORDER BY t2.ts DESC, t2.id DESC
                 LIMIT 1
             )
             ORDER BY a.symbol",
        )
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(PricePoint::try_from).collect()
    }

    /// Every recorded price at or after `since`, ordered by symbol then time.
    pub async fn prices_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, sqlx::Error> {
        let rows = sqlx::query_as::<_, PricePointRow>(
            "SELECT a.symbol, a.name, t.ts, t.price_usd
             FROM transactions t
             JOIN assets a ON a.id = t.asset_id
             WHERE t.ts >= ?1
             ORDER BY a.symbol, t.ts, t.id",
        )
        .bind(since.timestamp_micros())
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(PricePoint::try_from).collect()
    }
}
