//! CSV series adapter.
//!
//! A directory holds `{name}_trades.csv` (`date,asset,entry,exit,pnl`) and
//! `{name}_equity.csv` (`date,equity`) per series.

use crate::domain::error::StratlabError;
use crate::domain::metrics::{EquityPoint, TradeRecord};
use crate::ports::series_port::SeriesSource;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

const TRADES_SUFFIX: &str = "_trades.csv";
const EQUITY_SUFFIX: &str = "_equity.csv";

pub struct CsvSeriesAdapter {
    base_path: PathBuf,
}

impl CsvSeriesAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, name: &str, suffix: &str) -> PathBuf {
        self.base_path.join(format!("{name}{suffix}"))
    }

    /// Names that have at least one series file, sorted.
    pub fn list_series(&self) -> Result<Vec<String>, StratlabError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| StratlabError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StratlabError::Data {
                reason: format!("directory entry error: {e}"),
            })?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();

            let stem = file_name
                .strip_suffix(TRADES_SUFFIX)
                .or_else(|| file_name.strip_suffix(EQUITY_SUFFIX));
            match stem {
                Some(stem) if !stem.is_empty() => names.push(stem.to_string()),
                _ => {}
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StratlabError> {
    let content = fs::read_to_string(path).map_err(|e| StratlabError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let rows = rdr
        .deserialize()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|e| StratlabError::Data {
                reason: format!("{} row {}: {}", path.display(), i + 1, e),
            })
        })
        .collect::<Result<Vec<T>, _>>()?;
    Ok(rows)
}

impl SeriesSource for CsvSeriesAdapter {
    fn fetch_trades(&self, name: &str) -> Result<Vec<TradeRecord>, StratlabError> {
        let trades: Vec<TradeRecord> = read_rows(&self.csv_path(name, TRADES_SUFFIX))?;
        tracing::debug!(series = name, rows = trades.len(), "loaded trade log");
        Ok(trades)
    }

    fn fetch_equity_curve(&self, name: &str) -> Result<Vec<EquityPoint>, StratlabError> {
        let mut points: Vec<EquityPoint> = read_rows(&self.csv_path(name, EQUITY_SUFFIX))?;
        points.sort_by_key(|p| p.date);
        tracing::debug!(series = name, rows = points.len(), "loaded equity curve");
        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) {
        let mut f = fs::File::create(dir.path().join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn reads_trades_in_file_order() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "momentum_trades.csv",
            "date,asset,entry,exit,pnl\n\
             2023-03-15,AAPL,150.25,165.5,1525\n\
             2023-02-10,MSFT,245.75,238.2,-755\n",
        );

        let adapter = CsvSeriesAdapter::new(dir.path().to_path_buf());
        let trades = adapter.fetch_trades("momentum").unwrap();

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].asset, "AAPL");
        assert_eq!(trades[0].date, date(2023, 3, 15));
        assert_eq!(trades[0].entry_price, 150.25);
        assert_eq!(trades[1].pnl, -755.0);
    }

    #[test]
    fn equity_accepts_month_dates_and_sorts() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "momentum_equity.csv",
            "date,equity\n2023-02,108000\n2023-01,100000\n2023-03-15, 97200\n",
        );

        let adapter = CsvSeriesAdapter::new(dir.path().to_path_buf());
        let curve = adapter.fetch_equity_curve("momentum").unwrap();

        let dates: Vec<NaiveDate> = curve.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![date(2023, 1, 1), date(2023, 2, 1), date(2023, 3, 15)]);
        assert_eq!(curve[2].equity, 97200.0);
    }

    #[test]
    fn missing_file_is_data_error() {
        let dir = TempDir::new().unwrap();
        let adapter = CsvSeriesAdapter::new(dir.path().to_path_buf());
        assert!(matches!(
            adapter.fetch_trades("nothing"),
            Err(StratlabError::Data { .. })
        ));
    }

    #[test]
    fn bad_row_names_the_row() {
        let dir = TempDir::new().unwrap();
        write_file(
            &dir,
            "bad_equity.csv",
            "date,equity\n2023-01-01,100\n2023-13-45,abc\n",
        );
        let adapter = CsvSeriesAdapter::new(dir.path().to_path_buf());
        match adapter.fetch_equity_curve("bad") {
            Err(StratlabError::Data { reason }) => assert!(reason.contains("row 2"), "{reason}"),
            other => panic!("expected Data error, got {other:?}"),
        }
    }

    #[test]
    fn empty_file_gives_empty_series() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "flat_trades.csv", "date,asset,entry,exit,pnl\n");
        let adapter = CsvSeriesAdapter::new(dir.path().to_path_buf());
        assert!(adapter.fetch_trades("flat").unwrap().is_empty());
    }

    #[test]
    fn lists_series_names() {
        let dir = TempDir::new().unwrap();
        write_file(&dir, "b_trades.csv", "date,asset,entry,exit,pnl\n");
        write_file(&dir, "b_equity.csv", "date,equity\n");
        write_file(&dir, "a_equity.csv", "date,equity\n");
        write_file(&dir, "notes.txt", "");

        let adapter = CsvSeriesAdapter::new(dir.path().to_path_buf());
        assert_eq!(adapter.list_series().unwrap(), vec!["a", "b"]);
    }
}
