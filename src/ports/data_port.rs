//! Historical bar data port.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::error::TradesimError;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `instrument` on `timeframe` between `start` and `end`
    /// inclusive, sorted by time.
    fn fetch_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, TradesimError>;
}
