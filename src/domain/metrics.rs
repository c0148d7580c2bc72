//! Derived statistics over equity curves and trade logs.
//!
//! Everything here is a pure function of its input slice: nothing is cached
//! and inputs are never reordered in place.

use crate::domain::error::StratlabError;
use crate::domain::record::{ModuleKind, StepPayload};
use chrono::NaiveDate;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(with = "series_date")]
    pub date: NaiveDate,
    pub asset: String,
    #[serde(rename = "entry", alias = "entryPrice")]
    pub entry_price: f64,
    #[serde(rename = "exit", alias = "exitPrice")]
    pub exit_price: f64,
    pub pnl: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    #[serde(with = "series_date")]
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawdownPoint {
    pub date: NaiveDate,
    pub drawdown_pct: f64,
}

/// Accepts `YYYY-MM-DD` or `YYYY-MM` (taken as the first of the month).
pub fn parse_series_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|e| NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d").map_err(|_| e))
}

mod series_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_series_date(&raw).map_err(serde::de::Error::custom)
    }
}

/// Percentage decline from the running peak, one point per input point.
///
/// The peak starts at the first point, so the first drawdown is always 0.
/// Points under a non-positive peak report 0.
pub fn compute_drawdown_curve(points: &[EquityPoint]) -> Vec<DrawdownPoint> {
    let mut peak = match points.first() {
        Some(p) => p.equity,
        None => return Vec::new(),
    };

    points
        .iter()
        .map(|point| {
            if point.equity > peak {
                peak = point.equity;
            }
            let drawdown_pct = if peak > 0.0 {
                (point.equity - peak) / peak * 100.0
            } else {
                0.0
            };
            DrawdownPoint {
                date: point.date,
                drawdown_pct,
            }
        })
        .collect()
}

/// Deepest drawdown percentage (a value ≤ 0), or `None` for an empty curve.
pub fn max_drawdown(points: &[EquityPoint]) -> Option<f64> {
    compute_drawdown_curve(points)
        .into_iter()
        .map(|p| p.drawdown_pct)
        .reduce(f64::min)
}

/// The run in progress after the last trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Streak {
    Win(usize),
    Loss(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeStatistics {
    pub avg_profit: f64,
    pub max_win: f64,
    pub max_loss: f64,
    pub max_win_streak: usize,
    pub max_loss_streak: usize,
    pub final_streak: Streak,
}

/// `None` for an empty trade list. A trade with `pnl <= 0` counts as a loss
/// for streak purposes.
pub fn compute_trade_statistics(trades: &[TradeRecord]) -> Option<TradeStatistics> {
    if trades.is_empty() {
        return None;
    }

    let total: f64 = trades.iter().map(|t| t.pnl).sum();
    let max_win = trades.iter().map(|t| t.pnl).fold(f64::NEG_INFINITY, f64::max);
    let max_loss = trades.iter().map(|t| t.pnl).fold(f64::INFINITY, f64::min);

    let mut max_win_streak = 0usize;
    let mut max_loss_streak = 0usize;
    let mut current_win = 0usize;
    let mut current_loss = 0usize;

    for trade in trades {
        if trade.pnl > 0.0 {
            current_win += 1;
            current_loss = 0;
            max_win_streak = max_win_streak.max(current_win);
        } else {
            current_loss += 1;
            current_win = 0;
            max_loss_streak = max_loss_streak.max(current_loss);
        }
    }

    let final_streak = if current_win > 0 {
        Streak::Win(current_win)
    } else {
        Streak::Loss(current_loss)
    };

    Some(TradeStatistics {
        avg_profit: total / trades.len() as f64,
        max_win,
        max_loss,
        max_win_streak,
        max_loss_streak,
        final_streak,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeField {
    Date,
    Asset,
    EntryPrice,
    ExitPrice,
    Pnl,
}

impl FromStr for TradeField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "date" => Ok(TradeField::Date),
            "asset" => Ok(TradeField::Asset),
            "entry" | "entry_price" | "entryprice" => Ok(TradeField::EntryPrice),
            "exit" | "exit_price" | "exitprice" => Ok(TradeField::ExitPrice),
            "pnl" => Ok(TradeField::Pnl),
            other => Err(format!("unknown trade field: {other}")),
        }
    }
}

fn compare_field(a: &TradeRecord, b: &TradeRecord, field: TradeField) -> Ordering {
    match field {
        TradeField::Date => a.date.cmp(&b.date),
        TradeField::Asset => a.asset.cmp(&b.asset),
        TradeField::EntryPrice => a.entry_price.total_cmp(&b.entry_price),
        TradeField::ExitPrice => a.exit_price.total_cmp(&b.exit_price),
        TradeField::Pnl => a.pnl.total_cmp(&b.pnl),
    }
}

/// Stable sort on a copy; equal keys keep their input order in both
/// directions.
pub fn sort_by_field(trades: &[TradeRecord], field: TradeField, ascending: bool) -> Vec<TradeRecord> {
    let mut sorted = trades.to_vec();
    sorted.sort_by(|a, b| {
        let ord = compare_field(a, b, field);
        if ascending { ord } else { ord.reverse() }
    });
    sorted
}

/// Named numeric results for one session, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsSummary {
    entries: Vec<(String, f64)>,
}

impl MetricsSummary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the value in place if `name` already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for MetricsSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for MetricsSummary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SummaryVisitor;

        impl<'de> Visitor<'de> for SummaryVisitor {
            type Value = MetricsSummary;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of metric names to numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut summary = MetricsSummary::new();
                while let Some((name, value)) = access.next_entry::<String, f64>()? {
                    summary.insert(name, value);
                }
                Ok(summary)
            }
        }

        deserializer.deserialize_map(SummaryVisitor)
    }
}

/// Typed view of a backtesting step's `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub equity_curve: Vec<EquityPoint>,
    #[serde(default)]
    pub trade_log: Vec<TradeRecord>,
}

impl BacktestReport {
    pub fn from_payload(payload: &StepPayload) -> Result<Self, StratlabError> {
        if payload.module != ModuleKind::Backtesting {
            return Err(StratlabError::PayloadSchema {
                expected: ModuleKind::Backtesting,
                found: payload.module,
            });
        }
        serde_json::from_value(payload.data.clone()).map_err(|e| StratlabError::Deserialization {
            key: "backtesting payload".into(),
            reason: e.to_string(),
        })
    }

    pub fn to_payload(&self) -> Result<StepPayload, StratlabError> {
        let data = serde_json::to_value(self).map_err(|e| StratlabError::Serialization {
            reason: e.to_string(),
        })?;
        Ok(StepPayload::new(ModuleKind::Backtesting, data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SummaryConfig {
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.05,
            periods_per_year: TRADING_DAYS_PER_YEAR,
        }
    }
}

/// Headline numbers for one backtest. Returns, drawdown and win rate are in
/// percent; `maxDrawdown` is reported as a positive magnitude.
pub fn summarize_backtest(
    report: &BacktestReport,
    config: &SummaryConfig,
) -> Result<MetricsSummary, StratlabError> {
    let curve = &report.equity_curve;
    let (first, last) = match (curve.first(), curve.last()) {
        (Some(f), Some(l)) => (f.equity, l.equity),
        _ => {
            return Err(StratlabError::EmptySeries {
                series: "equity curve",
            })
        }
    };

    let total_return = if first > 0.0 { (last - first) / first } else { 0.0 };

    let years = curve.len() as f64 / config.periods_per_year;
    let annualized_return = if years > 0.0 && total_return > -1.0 {
        (1.0 + total_return).powf(1.0 / years) - 1.0
    } else {
        0.0
    };

    let period_rf = config.risk_free_rate / config.periods_per_year;
    let (sharpe_ratio, sortino_ratio) =
        compute_risk_adjusted(curve, period_rf, config.periods_per_year);

    let mut summary = MetricsSummary::new()
        .with("totalReturn", total_return * 100.0)
        .with("annualizedReturn", annualized_return * 100.0)
        .with("sharpeRatio", sharpe_ratio)
        .with("sortinoRatio", sortino_ratio)
        .with("maxDrawdown", max_drawdown(curve).unwrap_or(0.0).abs())
        .with("totalTrades", report.trade_log.len() as f64);

    if let Some(stats) = compute_trade_statistics(&report.trade_log) {
        let won = report.trade_log.iter().filter(|t| t.pnl > 0.0).count();
        let gross_win: f64 = report.trade_log.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum();
        let gross_loss: f64 = report
            .trade_log
            .iter()
            .filter(|t| t.pnl < 0.0)
            .map(|t| t.pnl.abs())
            .sum();

        summary.insert("winRate", won as f64 / report.trade_log.len() as f64 * 100.0);
        if gross_loss > 0.0 {
            summary.insert("profitFactor", gross_win / gross_loss);
        }
        summary.insert("avgProfit", stats.avg_profit);
        summary.insert("maxWinStreak", stats.max_win_streak as f64);
        summary.insert("maxLossStreak", stats.max_loss_streak as f64);
    }

    Ok(summary)
}

fn compute_risk_adjusted(curve: &[EquityPoint], period_rf: f64, periods_per_year: f64) -> (f64, f64) {
    if curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - period_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * periods_per_year.sqrt()
    } else {
        0.0
    };

    let downside_sq: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sq / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * periods_per_year.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
