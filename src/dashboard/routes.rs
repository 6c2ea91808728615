//! Dashboard API route handlers.
//!
//! All endpoints return JSON read straight from the ledger. State is shared
//! via `Arc<DashboardState>`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::error;

use crate::analytics::{self, AssetInsight, OverallTrend, Series};
use crate::storage::Ledger;

/// Window covered by `/api/series` and `/api/insights`.
const LOOKBACK_HOURS: i64 = 24;
/// Width of a `/api/series` bucket.
const SERIES_BUCKET_MINUTES: i64 = 5;

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct DashboardState {
    pub ledger: Ledger,
}

impl DashboardState {
    pub fn new(ledger: Ledger) -> Self {
        Self { ledger }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct LatestPrice {
    pub symbol: String,
    pub price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LatestResponse {
    pub data: Vec<LatestPrice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesResponse {
    pub data: BTreeMap<String, Series>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsSummary {
    pub overall_trend: OverallTrend,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InsightsResponse {
    pub insights: Vec<AssetInsight>,
    pub summary: InsightsSummary,
}

/// A failed read, rendered as `{"error": "..."}` with a 500.
#[derive(Debug)]
pub struct ApiError(&'static str);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": self.0 })),
        )
            .into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/latest
pub async fn get_latest(State(state): State<AppState>) -> Result<Json<LatestResponse>, ApiError> {
    let latest = state.ledger.latest_prices().await.map_err(|e| {
        error!(error = %e, "Failed to load latest prices");
        ApiError("Failed to load latest prices")
    })?;

    Ok(Json(LatestResponse {
        data: latest
            .into_iter()
            .map(|p| LatestPrice { symbol: p.symbol, price: p.price_usd })
            .collect(),
    }))
}

/// GET /api/series
pub async fn get_series(State(state): State<AppState>) -> Result<Json<SeriesResponse>, ApiError> {
    let since = Utc::now() - Duration::hours(LOOKBACK_HOURS);
    let points = state.ledger.prices_since(since).await.map_err(|e| {
        error!(error = %e, "Failed to load price series");
        ApiError("Failed to load price series")
    })?;

    Ok(Json(SeriesResponse {
        data: analytics::bucket_series(&points, Duration::minutes(SERIES_BUCKET_MINUTES)),
    }))
}

/// GET /api/insights
pub async fn get_insights(
    State(state): State<AppState>,
) -> Result<Json<InsightsResponse>, ApiError> {
    let since = Utc::now() - Duration::hours(LOOKBACK_HOURS);
    let points = state.ledger.prices_since(since).await.map_err(|e| {
        error!(error = %e, "Error generating insights");
        ApiError("Failed to generate insights")
    })?;

    let insights = analytics::insights(&points);
    let overall_trend = analytics::overall_trend(&insights);

    Ok(Json(InsightsResponse {
        insights,
        summary: InsightsSummary { overall_trend, timestamp: Utc::now() },
    }))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
