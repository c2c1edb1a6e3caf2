//! Configuration validation.
//!
//! Validates every config field before a run starts and returns the first
//! error found. The value-level `check_*` helpers are shared with
//! [`BacktestConfig::validate`](crate::domain::backtest::BacktestConfig::validate)
//! for configs built in code.

use crate::domain::bar::Timeframe;
use crate::domain::error::TradesimError;
use crate::domain::strategy::StrategyKind;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const BACKTEST: &str = "backtest";
pub const SWEEP: &str = "sweep";

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    validate_initial_balance(config)?;
    let max_total_risk = validate_max_total_risk(config)?;
    validate_dates(config)?;
    let instruments = instrument_list(config)?;
    validate_timeframes(config)?;
    validate_reference(config, &instruments)?;
    validate_history(config)?;
    validate_exit_mode(config)?;
    read_seed(config)?;
    for instrument in &instruments {
        validate_instrument_section(config, instrument, max_total_risk)?;
    }
    validate_sweep(config)?;
    Ok(())
}

fn validate_initial_balance(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let value = require_f64(config, BACKTEST, "initial_balance")?;
    check_positive(BACKTEST, "initial_balance", value)
}

fn validate_max_total_risk(config: &dyn ConfigPort) -> Result<f64, TradesimError> {
    let value = require_f64(config, BACKTEST, "max_total_risk")?;
    check_positive(BACKTEST, "max_total_risk", value)?;
    Ok(value)
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let start = require_date(config, BACKTEST, "start_date")?;
    let end = require_date(config, BACKTEST, "end_date")?;
    check_period(BACKTEST, "start_date", start, end)
}

fn validate_timeframes(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    let fine = read_timeframe(config, "fine_timeframe", Timeframe::M15)?;
    let coarse = read_timeframe(config, "coarse_timeframe", Timeframe::H1)?;
    if coarse.minutes() < fine.minutes() {
        return Err(TradesimError::invalid(
            BACKTEST,
            "coarse_timeframe",
            format!("{coarse} is finer than fine_timeframe {fine}"),
        ));
    }
    Ok(())
}

fn validate_reference(config: &dyn ConfigPort, instruments: &[String]) -> Result<(), TradesimError> {
    let Some(reference) = config.get_string(BACKTEST, "reference") else {
        return Ok(());
    };
    let reference = reference.trim();
    if reference.is_empty() || reference.eq_ignore_ascii_case("union") {
        return Ok(());
    }
    if instruments
        .iter()
        .any(|inst| inst.eq_ignore_ascii_case(reference))
    {
        Ok(())
    } else {
        Err(TradesimError::UnknownInstrument(reference.to_ascii_uppercase()))
    }
}

fn validate_history(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    read_usize(config, BACKTEST, "min_coarse_bars", 2)?;
    read_usize(config, BACKTEST, "min_fine_bars", 20)?;
    Ok(())
}

fn validate_exit_mode(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    match config.get_string(BACKTEST, "exit_mode") {
        None => Ok(()),
        Some(mode) => match mode.trim().to_ascii_lowercase().as_str() {
            "close" | "intrabar" => Ok(()),
            other => Err(TradesimError::invalid(
                BACKTEST,
                "exit_mode",
                format!("expected close or intrabar, got '{other}'"),
            )),
        },
    }
}

fn validate_instrument_section(
    config: &dyn ConfigPort,
    instrument: &str,
    max_total_risk: f64,
) -> Result<(), TradesimError> {
    let section = section_name(instrument);
    if !config.has_section(&section) {
        return Err(TradesimError::UnknownInstrument(instrument.to_string()));
    }
    read_strategy(config, instrument)?;

    let contract_size = require_f64(config, &section, "contract_size")?;
    check_positive(&section, "contract_size", contract_size)?;
    let leverage = require_f64(config, &section, "leverage")?;
    check_positive(&section, "leverage", leverage)?;

    for key in ["spread", "commission", "slippage_min", "slippage_max"] {
        let value = read_f64(config, &section, key)?.unwrap_or(0.0);
        check_non_negative(&section, key, value)?;
    }
    let slippage_min = read_f64(config, &section, "slippage_min")?.unwrap_or(0.0);
    let slippage_max = read_f64(config, &section, "slippage_max")?.unwrap_or(slippage_min);
    check_slippage_bounds(&section, slippage_min, slippage_max)?;

    let risk_pct = require_f64(config, &section, "risk_pct")?;
    check_risk_fraction(&section, risk_pct, max_total_risk)
}

fn validate_sweep(config: &dyn ConfigPort) -> Result<(), TradesimError> {
    if let Some(periods) = config.get_string(SWEEP, "periods") {
        parse_periods(&periods)?;
    }
    Ok(())
}

pub fn check_positive(section: &str, key: &str, value: f64) -> Result<(), TradesimError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TradesimError::invalid(
            section,
            key,
            format!("{key} must be positive"),
        ));
    }
    Ok(())
}

pub fn check_non_negative(section: &str, key: &str, value: f64) -> Result<(), TradesimError> {
    if !value.is_finite() || value < 0.0 {
        return Err(TradesimError::invalid(
            section,
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(())
}

pub fn check_slippage_bounds(section: &str, min: f64, max: f64) -> Result<(), TradesimError> {
    if min > max {
        return Err(TradesimError::invalid(
            section,
            "slippage_min",
            "slippage_min must not exceed slippage_max",
        ));
    }
    Ok(())
}

/// A single instrument's risk fraction must be positive and fit the
/// portfolio maximum on its own. Sums are enforced at admission time.
pub fn check_risk_fraction(section: &str, risk_pct: f64, max_total: f64) -> Result<(), TradesimError> {
    check_positive(section, "risk_pct", risk_pct)?;
    if risk_pct > max_total {
        return Err(TradesimError::invalid(
            section,
            "risk_pct",
            format!("risk_pct {risk_pct} exceeds max_total_risk {max_total}"),
        ));
    }
    Ok(())
}

pub fn check_period(section: &str, key: &str, start: NaiveDate, end: NaiveDate) -> Result<(), TradesimError> {
    if start > end {
        return Err(TradesimError::invalid(
            section,
            key,
            format!("{start} is after {end}"),
        ));
    }
    Ok(())
}

/// Config section holding an instrument's parameters.
pub fn section_name(instrument: &str) -> String {
    instrument.trim().to_ascii_lowercase()
}

pub(crate) fn read_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<Option<f64>, TradesimError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| TradesimError::invalid(section, key, format!("'{}' is not a number", raw.trim()))),
    }
}

pub(crate) fn require_f64(config: &dyn ConfigPort, section: &str, key: &str) -> Result<f64, TradesimError> {
    read_f64(config, section, key)?.ok_or_else(|| TradesimError::missing(section, key))
}

pub(crate) fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, TradesimError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
            TradesimError::invalid(section, key, format!("'{}' is not a non-negative integer", raw.trim()))
        }),
    }
}

pub(crate) fn read_seed(config: &dyn ConfigPort) -> Result<u64, TradesimError> {
    match config.get_string(BACKTEST, "seed") {
        None => Ok(42),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|_| TradesimError::invalid(BACKTEST, "seed", format!("'{}' is not a valid seed", raw.trim()))),
    }
}

pub(crate) fn read_timeframe(
    config: &dyn ConfigPort,
    key: &str,
    default: Timeframe,
) -> Result<Timeframe, TradesimError> {
    match config.get_string(BACKTEST, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<Timeframe>()
            .map_err(|reason| TradesimError::invalid(BACKTEST, key, reason)),
    }
}

pub(crate) fn read_strategy(config: &dyn ConfigPort, instrument: &str) -> Result<StrategyKind, TradesimError> {
    let section = section_name(instrument);
    let name = config
        .get_string(&section, "strategy")
        .ok_or_else(|| TradesimError::missing(&section, "strategy"))?;
    name.parse::<StrategyKind>()
        .map_err(|_| TradesimError::UnknownStrategy {
            instrument: instrument.to_string(),
            name: name.trim().to_string(),
        })
}

pub(crate) fn require_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, TradesimError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| TradesimError::missing(section, key))?;
    parse_date(&raw).map_err(|_| {
        TradesimError::invalid(section, key, format!("invalid {key} format, expected YYYY-MM-DD"))
    })
}

fn parse_date(raw: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
}

/// Upper-cased, de-duplicated instrument ids from `[backtest] instruments`,
/// in configuration order.
pub(crate) fn instrument_list(config: &dyn ConfigPort) -> Result<Vec<String>, TradesimError> {
    let raw = config
        .get_string(BACKTEST, "instruments")
        .ok_or_else(|| TradesimError::missing(BACKTEST, "instruments"))?;
    let mut instruments: Vec<String> = Vec::new();
    for id in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id = id.to_ascii_uppercase();
        if instruments.contains(&id) {
            return Err(TradesimError::invalid(
                BACKTEST,
                "instruments",
                format!("{id} listed twice"),
            ));
        }
        instruments.push(id);
    }
    if instruments.is_empty() {
        return Err(TradesimError::invalid(
            BACKTEST,
            "instruments",
            "at least one instrument is required",
        ));
    }
    Ok(instruments)
}

/// Parse `start:end, start:end, ...` into inclusive date ranges.
pub fn parse_periods(raw: &str) -> Result<Vec<(NaiveDate, NaiveDate)>, TradesimError> {
    let mut periods = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let bad = || TradesimError::invalid(SWEEP, "periods", format!("'{item}' is not START:END"));
        let (start, end) = item.split_once(':').ok_or_else(bad)?;
        let start = parse_date(start).map_err(|_| bad())?;
        let end = parse_date(end).map_err(|_| bad())?;
        check_period(SWEEP, "periods", start, end)?;
        periods.push((start, end));
    }
    if periods.is_empty() {
        return Err(TradesimError::invalid(SWEEP, "periods", "no periods listed"));
    }
    Ok(periods)
}
