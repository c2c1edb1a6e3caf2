//! Backtest run configuration.
//!
//! [`BacktestConfig`] is built from a [`ConfigPort`] (after
//! [`validate_config`] passes) or directly in code, in which case
//! [`BacktestConfig::validate`] applies the same value checks.

use chrono::NaiveDate;
use std::str::FromStr;

use crate::domain::bar::Timeframe;
use crate::domain::config_validation::{
    self, BACKTEST, check_non_negative, check_period, check_positive, check_risk_fraction,
    check_slippage_bounds, read_f64, read_seed, read_strategy, read_timeframe, read_usize,
    require_date, require_f64, section_name, validate_config,
};
use crate::domain::cost::CostParameters;
use crate::domain::error::TradesimError;
use crate::domain::strategy::StrategyKind;
use crate::domain::timeline::ReferenceMode;
use crate::ports::config_port::ConfigPort;

/// How open positions are evaluated against each fine bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitMode {
    /// Levels are compared with the bar close.
    #[default]
    Close,
    /// Levels are compared with the bar range, stop first.
    Intrabar,
}

impl FromStr for ExitMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(ExitMode::Close),
            "intrabar" => Ok(ExitMode::Intrabar),
            other => Err(format!("unknown exit mode '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentConfig {
    pub instrument: String,
    pub strategy: StrategyKind,
    pub costs: CostParameters,
    /// Percent of balance risked per trade.
    pub risk_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,
    /// Percent; cap on the summed `risk_pct` of open positions.
    pub max_total_risk: f64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub instruments: Vec<InstrumentConfig>,
    pub fine_timeframe: Timeframe,
    pub coarse_timeframe: Timeframe,
    pub reference: ReferenceMode,
    pub min_coarse_bars: usize,
    pub min_fine_bars: usize,
    pub exit_mode: ExitMode,
    pub seed: u64,
    pub data_dir: String,
}

impl BacktestConfig {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, TradesimError> {
        validate_config(config)?;

        let instruments = config_validation::instrument_list(config)?
            .into_iter()
            .map(|id| instrument_from_config(config, id))
            .collect::<Result<Vec<_>, _>>()?;

        let exit_mode = match config.get_string(BACKTEST, "exit_mode") {
            Some(raw) => raw
                .parse()
                .map_err(|reason| TradesimError::invalid(BACKTEST, "exit_mode", reason))?,
            None => ExitMode::default(),
        };

        Ok(BacktestConfig {
            initial_balance: require_f64(config, BACKTEST, "initial_balance")?,
            max_total_risk: require_f64(config, BACKTEST, "max_total_risk")?,
            start_date: require_date(config, BACKTEST, "start_date")?,
            end_date: require_date(config, BACKTEST, "end_date")?,
            instruments,
            fine_timeframe: read_timeframe(config, "fine_timeframe", Timeframe::M15)?,
            coarse_timeframe: read_timeframe(config, "coarse_timeframe", Timeframe::H1)?,
            reference: ReferenceMode::parse(
                &config.get_string(BACKTEST, "reference").unwrap_or_default(),
            ),
            min_coarse_bars: read_usize(config, BACKTEST, "min_coarse_bars", 2)?,
            min_fine_bars: read_usize(config, BACKTEST, "min_fine_bars", 20)?,
            exit_mode,
            seed: read_seed(config)?,
            data_dir: config
                .get_string(BACKTEST, "data_dir")
                .map(|s| s.trim().to_string())
                .unwrap_or_else(|| "data".to_string()),
        })
    }

    /// Value checks for configs assembled in code.
    pub fn validate(&self) -> Result<(), TradesimError> {
        check_positive(BACKTEST, "initial_balance", self.initial_balance)?;
        check_positive(BACKTEST, "max_total_risk", self.max_total_risk)?;
        check_period(BACKTEST, "start_date", self.start_date, self.end_date)?;
        if self.instruments.is_empty() {
            return Err(TradesimError::invalid(
                BACKTEST,
                "instruments",
                "at least one instrument is required",
            ));
        }
        if self.coarse_timeframe.minutes() < self.fine_timeframe.minutes() {
            return Err(TradesimError::invalid(
                BACKTEST,
                "coarse_timeframe",
                "coarse timeframe is finer than fine timeframe",
            ));
        }
        for (i, inst) in self.instruments.iter().enumerate() {
            if self.instruments[..i]
                .iter()
                .any(|other| other.instrument == inst.instrument)
            {
                return Err(TradesimError::invalid(
                    BACKTEST,
                    "instruments",
                    format!("{} listed twice", inst.instrument),
                ));
            }
            let section = section_name(&inst.instrument);
            let c = &inst.costs;
            check_positive(&section, "contract_size", c.contract_size)?;
            check_positive(&section, "leverage", c.leverage)?;
            check_non_negative(&section, "spread", c.spread)?;
            check_non_negative(&section, "commission", c.commission_per_unit)?;
            check_non_negative(&section, "slippage_min", c.slippage_min)?;
            check_non_negative(&section, "slippage_max", c.slippage_max)?;
            check_slippage_bounds(&section, c.slippage_min, c.slippage_max)?;
            check_risk_fraction(&section, inst.risk_pct, self.max_total_risk)?;
        }
        if let ReferenceMode::Instrument(id) = &self.reference {
            if self.instrument(id).is_none() {
                return Err(TradesimError::UnknownInstrument(id.clone()));
            }
        }
        Ok(())
    }

    pub fn instrument(&self, id: &str) -> Option<&InstrumentConfig> {
        self.instruments
            .iter()
            .find(|inst| inst.instrument.eq_ignore_ascii_case(id))
    }

    /// Same run over a different date range.
    pub fn with_period(&self, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            ..self.clone()
        }
    }
}

fn instrument_from_config(
    config: &dyn ConfigPort,
    instrument: String,
) -> Result<InstrumentConfig, TradesimError> {
    let section = section_name(&instrument);
    let slippage_min = read_f64(config, &section, "slippage_min")?.unwrap_or(0.0);
    let costs = CostParameters {
        leverage: require_f64(config, &section, "leverage")?,
        spread: read_f64(config, &section, "spread")?.unwrap_or(0.0),
        commission_per_unit: read_f64(config, &section, "commission")?.unwrap_or(0.0),
        contract_size: require_f64(config, &section, "contract_size")?,
        slippage_min,
        slippage_max: read_f64(config, &section, "slippage_max")?.unwrap_or(slippage_min),
    };
    Ok(InstrumentConfig {
        strategy: read_strategy(config, &instrument)?,
        risk_pct: require_f64(config, &section, "risk_pct")?,
        costs,
        instrument,
    })
}
