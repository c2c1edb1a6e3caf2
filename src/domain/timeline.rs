//! Per-instrument bar data and alignment of coarse and fine timeframes
//! against the shared reference timeline.

use chrono::{NaiveDateTime, TimeDelta};
use std::collections::BTreeSet;

use super::bar::Bar;
use super::error::TradesimError;

/// Loaded bar history for one instrument.
#[derive(Debug, Clone)]
pub struct InstrumentData {
    pub instrument: String,
    pub coarse: Vec<Bar>,
    pub fine: Vec<Bar>,
}

impl InstrumentData {
    pub fn new(instrument: impl Into<String>, coarse: Vec<Bar>, fine: Vec<Bar>) -> Self {
        InstrumentData {
            instrument: instrument.into(),
            coarse,
            fine,
        }
    }

    pub fn last_fine(&self) -> Option<&Bar> {
        self.fine.last()
    }
}

/// How the reference timeline is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReferenceMode {
    /// Sorted, de-duplicated union of every instrument's fine timestamps.
    Union,
    /// Fine timestamps of one designated instrument.
    Instrument(String),
}

impl ReferenceMode {
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("union") {
            ReferenceMode::Union
        } else {
            ReferenceMode::Instrument(trimmed.to_ascii_uppercase())
        }
    }
}

/// Monotonic index into an instrument's coarse bars.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoarseCursor {
    index: usize,
}

impl CoarseCursor {
    pub fn new() -> Self {
        CoarseCursor::default()
    }

    /// Move forward while the next coarse bar has opened at or before
    /// `fine_time`. Never rewinds.
    pub fn advance(&mut self, coarse: &[Bar], fine_time: NaiveDateTime) -> usize {
        while self.index + 1 < coarse.len() && coarse[self.index + 1].time <= fine_time {
            self.index += 1;
        }
        self.index
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_ready(&self, min_index: usize) -> bool {
        self.index >= min_index
    }
}

/// Closest bar to `time` by absolute difference. On an exact tie the earlier
/// bar wins. `bars` must be sorted by time.
pub fn nearest_bar(bars: &[Bar], time: NaiveDateTime) -> Option<(usize, TimeDelta)> {
    if bars.is_empty() {
        return None;
    }
    let after = bars.partition_point(|b| b.time < time);
    let distance = |i: usize| (bars[i].time - time).abs();

    let best = match (after.checked_sub(1), after < bars.len()) {
        (Some(before), true) => {
            if distance(before) <= distance(after) {
                before
            } else {
                after
            }
        }
        (Some(before), false) => before,
        (None, _) => after,
    };
    Some((best, distance(best)))
}

pub fn build_reference_timeline(
    mode: &ReferenceMode,
    instruments: &[InstrumentData],
) -> Result<Vec<NaiveDateTime>, TradesimError> {
    match mode {
        ReferenceMode::Union => {
            let unique: BTreeSet<NaiveDateTime> = instruments
                .iter()
                .flat_map(|data| data.fine.iter().map(|bar| bar.time))
                .collect();
            Ok(unique.into_iter().collect())
        }
        ReferenceMode::Instrument(name) => instruments
            .iter()
            .find(|data| data.instrument.eq_ignore_ascii_case(name))
            .map(|data| data.fine.iter().map(|bar| bar.time).collect())
            .ok_or_else(|| TradesimError::UnknownInstrument(name.clone())),
    }
}
