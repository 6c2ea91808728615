//! Price analytics over recorded observations.
//!
//! Pure functions: time-bucketed series for charting, and a per-asset
//! 24-hour insight (trend, volatility, anomalies) built from step-to-step
//! percentage changes between consecutive observations.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::types::PricePoint;

/// |change| below this (in %) is a flat market.
const STABLE_CHANGE_PCT: f64 = 0.5;
/// |change| beyond this (in %) is a strong trend.
const STRONG_CHANGE_PCT: f64 = 2.0;
/// Mean absolute step change (in %) thresholds.
const HIGH_VOLATILITY_PCT: f64 = 0.3;
const MODERATE_VOLATILITY_PCT: f64 = 0.1;
/// A single step beyond ±1 % is a spike/drop.
const SPIKE_PCT: f64 = 1.0;
/// A step beyond ±0.5 % counts as a large swing.
const LARGE_SWING_PCT: f64 = 0.5;
/// Large swings in more than this share of points is unusual.
const UNUSUAL_SWING_SHARE: f64 = 0.15;
/// Minutes between observations before a gap is reported.
const GAP_MINUTES: f64 = 30.0;

// ---------------------------------------------------------------------------
// Series
// ---------------------------------------------------------------------------

/// Bucketed prices for one symbol: parallel timestamp / average arrays.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub t: Vec<DateTime<Utc>>,
    pub v: Vec<f64>,
}

/// Start of the epoch-aligned bucket containing `ts`.
pub fn bucket_start(ts: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    let width_s = width.num_seconds().max(1);
    let secs = ts.timestamp().div_euclid(width_s) * width_s;
    DateTime::from_timestamp(secs, 0).unwrap_or(ts)
}

/// Average prices per symbol per `width` bucket, buckets in time order.
pub fn bucket_series(points: &[PricePoint], width: Duration) -> BTreeMap<String, Series> {
    let mut sums: BTreeMap<String, BTreeMap<DateTime<Utc>, (f64, u32)>> = BTreeMap::new();
    for p in points {
        let slot = sums
            .entry(p.symbol.clone())
            .or_default()
            .entry(bucket_start(p.timestamp, width))
            .or_insert((0.0, 0));
        slot.0 += p.price_usd;
        slot.1 += 1;
    }

    sums.into_iter()
        .map(|(symbol, buckets)| {
            let mut series = Series::default();
            for (t, (sum, n)) in buckets {
                series.t.push(t);
                series.v.push(sum / f64::from(n));
            }
            (symbol, series)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Insights
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendStrength {
    Strong,
    Modest,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Volatility {
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallTrend {
    Bullish,
    Bearish,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInsight {
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub price_24h_ago: f64,
    pub change_24h: f64,
    pub trend: Trend,
    pub trend_strength: TrendStrength,
    pub volatility: Volatility,
    pub avg_volatility: f64,
    pub max_gain: f64,
    pub max_loss: f64,
    pub anomalies: Vec<String>,
    pub description: String,
}

/// Build an insight from one symbol's points in time order. `None` if empty.
pub fn asset_insight(points: &[PricePoint]) -> Option<AssetInsight> {
    let first = points.first()?;
    let last = points.last()?;

    // The first point has no predecessor: it contributes a 0 % step and no gap.
    let mut steps = Vec::with_capacity(points.len());
    let mut gaps = Vec::with_capacity(points.len());
    steps.push(0.0);
    for pair in points.windows(2) {
        let (prev, cur) = (&pair[0], &pair[1]);
        let pct = if prev.price_usd > 0.0 {
            (cur.price_usd - prev.price_usd) / prev.price_usd * 100.0
        } else {
            0.0
        };
        steps.push(pct);
        gaps.push((cur.timestamp - prev.timestamp).num_milliseconds() as f64 / 60_000.0);
    }

    let total = steps.len() as f64;
    let max_gain = steps.iter().copied().fold(0.0, f64::max);
    let max_loss = steps.iter().copied().fold(0.0, f64::min);
    let avg_volatility = steps.iter().map(|s| s.abs()).sum::<f64>() / total;
    let large_swings = steps.iter().filter(|s| s.abs() > LARGE_SWING_PCT).count() as f64;
    let max_gap = gaps.iter().copied().fold(0.0, f64::max);

    let change_24h = if first.price_usd > 0.0 {
        (last.price_usd - first.price_usd) / first.price_usd * 100.0
    } else {
        0.0
    };

    let (trend, trend_strength) = classify_trend(change_24h);
    let volatility = classify_volatility(avg_volatility);

    let mut anomalies = Vec::new();
    if max_gain > SPIKE_PCT {
        anomalies.push(format!("Sharp upward spike of +{max_gain:.2}%"));
    }
    if max_loss < -SPIKE_PCT {
        anomalies.push(format!("Sharp downward drop of {max_loss:.2}%"));
    }
    if max_gap > GAP_MINUTES {
        anomalies.push(format!("Data gap detected ({max_gap:.0} min between updates)"));
    }
    if large_swings / total > UNUSUAL_SWING_SHARE {
        anomalies.push(format!(
            "Unusual volatility pattern ({:.1}% large swings)",
            large_swings / total * 100.0
        ));
    }

    Some(AssetInsight {
        symbol: last.symbol.clone(),
        name: last.name.clone(),
        current_price: last.price_usd,
        price_24h_ago: first.price_usd,
        change_24h,
        trend,
        trend_strength,
        volatility,
        avg_volatility,
        max_gain,
        max_loss,
        anomalies,
        description: describe(trend, trend_strength).to_string(),
    })
}

/// Insights for every symbol in `points` (grouped by symbol, each in time
/// order), sorted by symbol.
pub fn insights(points: &[PricePoint]) -> Vec<AssetInsight> {
    let mut by_symbol: BTreeMap<&str, Vec<PricePoint>> = BTreeMap::new();
    for p in points {
        by_symbol.entry(p.symbol.as_str()).or_default().push(p.clone());
    }
    by_symbol
        .into_values()
        .filter_map(|mut pts| {
            pts.sort_by_key(|p| p.timestamp);
            asset_insight(&pts)
        })
        .collect()
}

/// Bullish or bearish only if every asset agrees.
pub fn overall_trend(insights: &[AssetInsight]) -> OverallTrend {
    if insights.is_empty() {
        OverallTrend::Mixed
    } else if insights.iter().all(|i| i.trend == Trend::Bullish) {
        OverallTrend::Bullish
    } else if insights.iter().all(|i| i.trend == Trend::Bearish) {
        OverallTrend::Bearish
    } else {
        OverallTrend::Mixed
    }
}

fn classify_trend(change_pct: f64) -> (Trend, TrendStrength) {
    if change_pct.abs() < STABLE_CHANGE_PCT {
        (Trend::Stable, TrendStrength::Weak)
    } else if change_pct > 0.0 {
        let strength = if change_pct > STRONG_CHANGE_PCT {
            TrendStrength::Strong
        } else {
            TrendStrength::Modest
        };
        (Trend::Bullish, strength)
    } else {
        let strength = if change_pct < -STRONG_CHANGE_PCT {
            TrendStrength::Strong
        } else {
            TrendStrength::Modest
        };
        (Trend::Bearish, strength)
    }
}

fn classify_volatility(avg_abs_step_pct: f64) -> Volatility {
    if avg_abs_step_pct >= HIGH_VOLATILITY_PCT {
        Volatility::High
    } else if avg_abs_step_pct >= MODERATE_VOLATILITY_PCT {
        Volatility::Moderate
    } else {
        Volatility::Low
    }
}

fn describe(trend: Trend, strength: TrendStrength) -> &'static str {
    match (trend, strength) {
        (Trend::Stable, _) => {
            "Price has remained relatively flat over 24 hours. The market is consolidating with minimal directional movement."
        }
        (Trend::Bullish, TrendStrength::Strong) => {
            "Significant upward momentum. Buyers are in strong control, pushing prices higher."
        }
        (Trend::Bullish, _) => {
            "Modest upward trend. Buyers are in control, gradually pushing prices higher."
        }
        (Trend::Bearish, TrendStrength::Strong) => {
            "Significant downward pressure. Sellers are dominating, driving prices lower."
        }
        (Trend::Bearish, _) => {
            "Modest downward trend. Sellers are in control, gradually pushing prices lower."
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
