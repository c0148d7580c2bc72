//! Side-by-side comparison of sessions whose metric sets differ.

use crate::domain::error::StratlabError;
use crate::domain::metrics::MetricsSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

pub const MIN_COMPARED_SESSIONS: usize = 2;

/// One recorded session as the dashboard lists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub module: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "metricsSummary", alias = "metrics", default)]
    pub metrics: MetricsSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionHeader {
    pub id: String,
    pub name: String,
    pub module: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Value(f64),
    /// The session does not report this metric. Serializes as `null`.
    Missing,
}

impl Cell {
    pub fn value(&self) -> Option<f64> {
        match self {
            Cell::Value(v) => Some(*v),
            Cell::Missing => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Value(v) => write!(f, "{v}"),
            Cell::Missing => f.write_str("-"),
        }
    }
}

/// One metric across every compared session; `cells[i]` belongs to
/// `sessions[i]` of the enclosing table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub metric: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonTable {
    pub sessions: Vec<SessionHeader>,
    pub metric_names: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

/// Builds the table over the union of metric names, in first-seen order.
pub fn compare(sessions: &[SessionSummary]) -> Result<ComparisonTable, StratlabError> {
    if sessions.len() < MIN_COMPARED_SESSIONS {
        return Err(StratlabError::InsufficientSelection {
            selected: sessions.len(),
        });
    }

    let mut seen = HashSet::new();
    let metric_names: Vec<String> = sessions
        .iter()
        .flat_map(|s| s.metrics.names())
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect();

    let rows = metric_names
        .iter()
        .map(|metric| ComparisonRow {
            metric: metric.clone(),
            cells: sessions
                .iter()
                .map(|s| s.metrics.get(metric).map_or(Cell::Missing, Cell::Value))
                .collect(),
        })
        .collect();

    let headers = sessions
        .iter()
        .map(|s| SessionHeader {
            id: s.id.clone(),
            name: s.name.clone(),
            module: s.module.clone(),
            timestamp: s.timestamp,
        })
        .collect();

    Ok(ComparisonTable {
        sessions: headers,
        metric_names,
        rows,
    })
}

/// `sharpeRatio` → `Sharpe Ratio`.
pub fn metric_label(name: &str) -> String {
    let mut label = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if i == 0 {
            label.extend(ch.to_uppercase());
        } else {
            if ch.is_uppercase() {
                label.push(' ');
            }
            label.push(ch);
        }
    }
    label
}
