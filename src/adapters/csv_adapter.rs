//! CSV file data feed.
//!
//! Reads `{base}/{INSTRUMENT}_{TIMEFRAME}.csv`. Columns are located by header
//! name (`time,open,high,low,close`); any other columns are ignored.

use crate::domain::bar::{Bar, Timeframe};
use crate::domain::error::TradesimError;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::io::ErrorKind;
use std::path::PathBuf;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, instrument: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", instrument.to_ascii_uppercase(), timeframe))
    }
}

struct Columns {
    time: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, TradesimError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| TradesimError::DataFeed {
                    reason: format!("missing {name} column"),
                })
        };
        Ok(Columns {
            time: find("time")?,
            open: find("open")?,
            high: find("high")?,
            low: find("low")?,
            close: find("close")?,
        })
    }
}

fn parse_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::default()))
        })
}

fn field(record: &csv::StringRecord, index: usize, name: &str, line: u64) -> Result<f64, TradesimError> {
    let raw = record.get(index).ok_or_else(|| TradesimError::DataFeed {
        reason: format!("line {line}: missing {name} value"),
    })?;
    raw.trim().parse().map_err(|e| TradesimError::DataFeed {
        reason: format!("line {line}: invalid {name} value '{raw}': {e}"),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        instrument: &str,
        timeframe: Timeframe,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, TradesimError> {
        let path = self.csv_path(instrument, timeframe);
        let mut rdr = match csv::Reader::from_path(&path) {
            Ok(rdr) => rdr,
            Err(e) => {
                if let csv::ErrorKind::Io(io) = e.kind() {
                    if io.kind() == ErrorKind::NotFound {
                        return Err(TradesimError::NoData {
                            instrument: instrument.to_ascii_uppercase(),
                            timeframe: timeframe.to_string(),
                        });
                    }
                }
                return Err(TradesimError::DataFeed {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let columns = Columns::locate(rdr.headers().map_err(|e| TradesimError::DataFeed {
            reason: format!("{}: {}", path.display(), e),
        })?)?;

        let from = start.and_time(NaiveTime::default());
        let until = end.and_time(NaiveTime::default()) + TimeDelta::seconds(86_399);

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TradesimError::DataFeed {
                reason: format!("CSV parse error: {e}"),
            })?;
            let line = record.position().map_or(0, |p| p.line());

            let raw_time = record.get(columns.time).unwrap_or_default();
            let time = parse_time(raw_time).ok_or_else(|| TradesimError::DataFeed {
                reason: format!("line {line}: invalid time '{raw_time}'"),
            })?;
            if time < from || time > until {
                continue;
            }

            bars.push(Bar {
                time,
                open: field(&record, columns.open, "open", line)?,
                high: field(&record, columns.high, "high", line)?,
                low: field(&record, columns.low, "low", line)?,
                close: field(&record, columns.close, "close", line)?,
            });
        }

        bars.sort_by_key(|b| b.time);
        bars.dedup_by_key(|b| b.time);
        if bars.is_empty() {
            return Err(TradesimError::NoData {
                instrument: instrument.to_ascii_uppercase(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(bars)
    }
}
