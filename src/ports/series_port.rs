//! Raw series input port.

use crate::domain::error::StratlabError;
use crate::domain::metrics::{EquityPoint, TradeRecord};

pub trait SeriesSource {
    /// Trades in the order the producer recorded them.
    fn fetch_trades(&self, name: &str) -> Result<Vec<TradeRecord>, StratlabError>;

    /// Equity points ordered by date.
    fn fetch_equity_curve(&self, name: &str) -> Result<Vec<EquityPoint>, StratlabError>;
}
