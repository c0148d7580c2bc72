#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use stratlab::domain::comparison::SessionSummary;
use stratlab::domain::error::StratlabError;
pub use stratlab::domain::metrics::{EquityPoint, MetricsSummary, TradeRecord};
use stratlab::ports::series_port::SeriesSource;
use stratlab::ports::session_catalog_port::SessionCatalog;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_trade(asset: &str, day: u32, pnl: f64) -> TradeRecord {
    TradeRecord {
        date: date(2023, 1, day),
        asset: asset.to_string(),
        entry_price: 100.0,
        exit_price: 100.0 + pnl / 10.0,
        pnl,
    }
}

pub fn make_trades(pnls: &[f64]) -> Vec<TradeRecord> {
    pnls.iter()
        .enumerate()
        .map(|(i, &pnl)| make_trade("AAPL", (i % 28) as u32 + 1, pnl))
        .collect()
}

/// Daily points starting 2024-01-01.
pub fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
    values
        .iter()
        .enumerate()
        .map(|(i, &v)| EquityPoint {
            date: date(2024, 1, 1) + chrono::Duration::days(i as i64),
            equity: v,
        })
        .collect()
}

pub fn make_session(id: &str, name: &str, module: &str, metrics: MetricsSummary) -> SessionSummary {
    SessionSummary {
        id: id.to_string(),
        name: name.to_string(),
        module: module.to_string(),
        timestamp: "2025-05-17T10:12:00Z".parse().unwrap(),
        metrics,
    }
}

pub struct MockSeriesSource {
    pub trades: HashMap<String, Vec<TradeRecord>>,
    pub equity: HashMap<String, Vec<EquityPoint>>,
}

impl MockSeriesSource {
    pub fn new() -> Self {
        Self {
            trades: HashMap::new(),
            equity: HashMap::new(),
        }
    }

    pub fn with_trades(mut self, name: &str, trades: Vec<TradeRecord>) -> Self {
        self.trades.insert(name.to_string(), trades);
        self
    }

    pub fn with_equity(mut self, name: &str, points: Vec<EquityPoint>) -> Self {
        self.equity.insert(name.to_string(), points);
        self
    }
}

impl SeriesSource for MockSeriesSource {
    fn fetch_trades(&self, name: &str) -> Result<Vec<TradeRecord>, StratlabError> {
        self.trades.get(name).cloned().ok_or_else(|| StratlabError::Data {
            reason: format!("no trades for {name}"),
        })
    }

    fn fetch_equity_curve(&self, name: &str) -> Result<Vec<EquityPoint>, StratlabError> {
        self.equity.get(name).cloned().ok_or_else(|| StratlabError::Data {
            reason: format!("no equity curve for {name}"),
        })
    }
}

pub struct MockCatalog {
    pub sessions: Vec<SessionSummary>,
}

impl SessionCatalog for MockCatalog {
    fn list_sessions(&self) -> Result<Vec<SessionSummary>, StratlabError> {
        Ok(self.sessions.clone())
    }
}

/// The four sessions of the demo dashboard.
pub fn demo_catalog() -> MockCatalog {
    MockCatalog {
        sessions: vec![
            make_session(
                "s1",
                "Tech Growth Portfolio",
                "Portfolio Optimization",
                MetricsSummary::new()
                    .with("expectedReturn", 12.5)
                    .with("volatility", 18.2)
                    .with("sharpeRatio", 0.69),
            ),
            make_session(
                "s2",
                "Momentum Strategy Test",
                "Backtesting",
                MetricsSummary::new()
                    .with("totalReturn", 28.7)
                    .with("maxDrawdown", 15.2)
                    .with("sharpeRatio", 1.2),
            ),
            make_session(
                "s3",
                "Earnings Surprise Signal",
                "Alpha Signal",
                MetricsSummary::new()
                    .with("alpha", 0.05)
                    .with("signalStrength", 0.85),
            ),
            make_session(
                "s4",
                "Market Regime Analysis",
                "Regime Detection",
                MetricsSummary::new()
                    .with("regimeCount", 3.0)
                    .with("currentRegime", 1.0),
            ),
        ],
    }
}

pub fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

pub fn write_file(dir: &Path, name: &str, content: &str) {
    let mut f = std::fs::File::create(dir.join(name)).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}
