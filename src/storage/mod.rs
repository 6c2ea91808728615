//! Persistence layer.
//!
//! The ledger keeps the reference catalog (`users`, `assets`) and the
//! append-only observation log (`transactions`) in SQLite through `sqlx`.
//! Observation batches are written inside a single transaction so a cycle
//! is either fully visible or not at all.

pub mod queries;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use std::str::FromStr;
use tracing::{debug, info};

use crate::types::{Asset, NewObservation, Observation, User};

/// Schema statements, applied in order. All are idempotent.
///
/// `transactions` is keyed on `(id, ts)` and indexed on `ts` so range
/// scans over time stay cheap as the log grows.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS assets (
        id     INTEGER PRIMARY KEY AUTOINCREMENT,
        symbol TEXT NOT NULL UNIQUE,
        name   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS transactions (
        id        INTEGER NOT NULL,
        ts        INTEGER NOT NULL,
        user_id   INTEGER NOT NULL REFERENCES users (id),
        asset_id  INTEGER NOT NULL REFERENCES assets (id),
        amount    INTEGER NOT NULL CHECK (amount >= 0),
        price_usd REAL NOT NULL CHECK (price_usd >= 0),
        PRIMARY KEY (id, ts)
    )",
    "CREATE INDEX IF NOT EXISTS transactions_ts_idx ON transactions (ts DESC)",
];

/// Handle to the observation ledger. Cheap to clone (shares the pool).
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

#[derive(sqlx::FromRow)]
struct ObservationRow {
    id: i64,
    ts: i64,
    user_id: i64,
    asset_id: i64,
    amount: i64,
    price_usd: f64,
}

impl TryFrom<ObservationRow> for Observation {
    type Error = sqlx::Error;

    fn try_from(row: ObservationRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.amount)
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
        Ok(Observation {
            id: row.id,
            timestamp: micros_to_datetime(row.ts)?,
            user_id: row.user_id,
            asset_id: row.asset_id,
            quantity,
            price_usd: row.price_usd,
        })
    }
}

/// Timestamps are stored as microseconds since the Unix epoch.
pub(crate) fn micros_to_datetime(micros: i64) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        sqlx::Error::Decode(format!("timestamp out of range: {micros}").into())
    })
}

/// Database URL with credentials and query parameters stripped, for logs
/// and error messages.
fn redact_url(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (Some(scheme), rest),
        None => (None, url),
    };
    let rest = rest.split(['?', '#']).next().unwrap_or_default();
    let rest = rest.rsplit_once('@').map_or(rest, |(_, location)| location);
    match scheme {
        Some(scheme) => format!("{scheme}://{rest}"),
        None => rest.to_string(),
    }
}

impl Ledger {
    /// Open (creating if missing) the database at `url`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let location = redact_url(url);
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {location}"))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {location}"))?;

        info!(db = %location, max_connections, "Ledger connected");
        Ok(Self { pool })
    }

    /// A private in-memory ledger. Uses a single connection that is never
    /// recycled, since each SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .context("Invalid in-memory database URL")?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .context("Failed to open in-memory database")?;

        Ok(Self { pool })
    }

    /// Create tables and indexes if they don't exist yet.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to apply ledger schema")?;
        }
        debug!(statements = SCHEMA.len(), "Ledger schema applied");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // -- Reference catalog ------------------------------------------------

    /// Insert the user, or update the existing row with the same name.
    pub async fn upsert_user(&self, name: &str) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name) VALUES (?1)
             ON CONFLICT (name) DO UPDATE SET name = excluded.name
             RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
    }

    /// Insert the asset, or update the name of the existing row with the
    /// same symbol. Never creates a second row for a symbol.
    pub async fn upsert_asset(&self, symbol: &str, name: &str) -> Result<Asset, sqlx::Error> {
        sqlx::query_as::<_, Asset>(
            "INSERT INTO assets (symbol, name) VALUES (?1, ?2)
             ON CONFLICT (symbol) DO UPDATE SET name = excluded.name
             RETURNING id, symbol, name",
        )
        .bind(symbol)
        .bind(name)
        .fetch_one(&self.pool)
        .await
    }

    /// The lowest-id user, if any.
    pub async fn first_user(&self) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT id, name FROM users ORDER BY id LIMIT 1")
            .fetch_optional(&self.pool)
            .await
    }

    /// Assets whose symbol is in `symbols`, in no particular order.
    pub async fn find_assets(&self, symbols: &[String]) -> Result<Vec<Asset>, sqlx::Error> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, symbol, name FROM assets WHERE symbol IN (");
        let mut separated = qb.separated(", ");
        for symbol in symbols {
            separated.push_bind(symbol.clone());
        }
        separated.push_unseparated(")");

        qb.build_query_as::<Asset>().fetch_all(&self.pool).await
    }

    pub async fn count_users(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
    }

    pub async fn count_assets(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM assets")
            .fetch_one(&self.pool)
            .await
    }

    // -- Observations -----------------------------------------------------

    /// Append a batch of observations in one transaction.
    ///
    /// Any row error (constraint, foreign key) rolls back the whole batch.
    /// Ids continue from the current maximum.
    pub async fn record_batch(
        &self,
        batch: &[NewObservation],
    ) -> Result<Vec<Observation>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let mut recorded = Vec::with_capacity(batch.len());

        for obs in batch {
            let id: i64 = sqlx::query_scalar(
                "INSERT INTO transactions (id, ts, user_id, asset_id, amount, price_usd)
                 VALUES ((SELECT COALESCE(MAX(id), 0) + 1 FROM transactions), ?1, ?2, ?3, ?4, ?5)
                 RETURNING id",
            )
            .bind(obs.timestamp.timestamp_micros())
            .bind(obs.user_id)
            .bind(obs.asset_id)
            .bind(i64::from(obs.quantity))
            .bind(obs.price_usd)
            .fetch_one(&mut *tx)
            .await?;

            recorded.push(Observation {
                id,
                timestamp: obs.timestamp,
                user_id: obs.user_id,
                asset_id: obs.asset_id,
                quantity: obs.quantity,
                price_usd: obs.price_usd,
            });
        }

        tx.commit().await?;
        debug!(rows = recorded.len(), "Observation batch committed");
        Ok(recorded)
    }

    /// All observations, oldest first.
    pub async fn observations(&self) -> Result<Vec<Observation>, sqlx::Error> {
        let rows = sqlx::query_as::<_, ObservationRow>(
            "SELECT id, ts, user_id, asset_id, amount, price_usd
             FROM transactions ORDER BY ts, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Observation::try_from).collect()
    }

    pub async fn count_observations(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM transactions")
            .fetch_one(&self.pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
