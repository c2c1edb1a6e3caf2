//! Joint multi-instrument backtest loop.
//!
//! Every instrument shares one account. Per reference timestamp, each
//! instrument in configuration order is aligned to its nearest fine bar,
//! its coarse cursor is advanced, its open position is marked and, when the
//! risk budget allows, its strategy may open a new one. After all
//! instruments the account is marked to market and an equity sample is
//! recorded. Positions still open when the timeline ends are force-closed.

use chrono::{NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info, trace};

use crate::domain::backtest::{BacktestConfig, ExitMode};
use crate::domain::error::TradesimError;
use crate::domain::lifecycle::{PositionSlot, UpdateOutcome};
use crate::domain::portfolio::{EquitySample, PortfolioState, RiskBudget};
use crate::domain::position::ClosedTrade;
use crate::domain::signal::Signal;
use crate::domain::timeline::{
    CoarseCursor, InstrumentData, build_reference_timeline, nearest_bar,
};
use crate::ports::data_port::DataPort;
use crate::ports::strategy_port::StrategyPort;

/// Everything one run needs, passed in explicitly.
///
/// `strategies[i]` drives `config.instruments[i]`.
pub struct RunContext {
    pub config: BacktestConfig,
    pub strategies: Vec<Box<dyn StrategyPort>>,
    pub seed: u64,
}

impl RunContext {
    pub fn new(config: BacktestConfig, strategies: Vec<Box<dyn StrategyPort>>) -> Self {
        let seed = config.seed;
        RunContext {
            config,
            strategies,
            seed,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub instruments: Vec<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub seed: u64,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub final_equity: f64,
    pub peak_balance: f64,
    pub max_drawdown_pct: f64,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquitySample>,
}

impl BacktestResult {
    pub fn total_pnl(&self) -> f64 {
        self.final_balance - self.initial_balance
    }

    pub fn roi_pct(&self) -> f64 {
        if self.initial_balance > 0.0 {
            self.total_pnl() / self.initial_balance * 100.0
        } else {
            0.0
        }
    }
}

pub struct PortfolioBacktest {
    config: BacktestConfig,
    seed: u64,
    strategies: Vec<Box<dyn StrategyPort>>,
    data: Vec<InstrumentData>,
    slots: Vec<PositionSlot>,
    cursors: Vec<CoarseCursor>,
    /// Fine bar each instrument was last stepped on.
    last_fine: Vec<Option<usize>>,
    timeline: Vec<NaiveDateTime>,
    state: PortfolioState,
    budget: RiskBudget,
}

impl PortfolioBacktest {
    /// `data[i]` must hold the bars for `config.instruments[i]`.
    pub fn new(ctx: RunContext, data: Vec<InstrumentData>) -> Result<Self, TradesimError> {
        let RunContext {
            config,
            strategies,
            seed,
        } = ctx;
        config.validate()?;

        if strategies.len() != config.instruments.len() || data.len() != config.instruments.len()
        {
            return Err(TradesimError::invalid(
                "backtest",
                "instruments",
                format!(
                    "{} instruments configured but {} strategies and {} data sets supplied",
                    config.instruments.len(),
                    strategies.len(),
                    data.len()
                ),
            ));
        }
        for (inst, bars) in config.instruments.iter().zip(&data) {
            if !inst.instrument.eq_ignore_ascii_case(&bars.instrument) {
                return Err(TradesimError::UnknownInstrument(bars.instrument.clone()));
            }
            if bars.fine.is_empty() {
                return Err(TradesimError::NoData {
                    instrument: inst.instrument.clone(),
                    timeframe: config.fine_timeframe.to_string(),
                });
            }
            if bars.coarse.is_empty() {
                return Err(TradesimError::NoData {
                    instrument: inst.instrument.clone(),
                    timeframe: config.coarse_timeframe.to_string(),
                });
            }
        }

        let timeline = build_reference_timeline(&config.reference, &data)?;

        // One independent slippage stream per instrument, derived in
        // configuration order from the run seed.
        let mut master = StdRng::seed_from_u64(seed);
        let slots = config
            .instruments
            .iter()
            .map(|inst| {
                PositionSlot::new(
                    inst.instrument.clone(),
                    inst.costs.clone(),
                    StdRng::seed_from_u64(master.next_u64()),
                )
            })
            .collect();

        Ok(PortfolioBacktest {
            state: PortfolioState::new(config.initial_balance),
            budget: RiskBudget::new(config.max_total_risk),
            cursors: vec![CoarseCursor::new(); data.len()],
            last_fine: vec![None; data.len()],
            config,
            seed,
            strategies,
            data,
            slots,
            timeline,
        })
    }

    pub fn run(mut self) -> BacktestResult {
        info!(
            instruments = self.data.len(),
            ticks = self.timeline.len(),
            seed = self.seed,
            "starting backtest"
        );

        let timeline = std::mem::take(&mut self.timeline);
        for &now in &timeline {
            for i in 0..self.data.len() {
                self.step_instrument(i, now);
            }
            let floating = self.floating_total();
            self.state.mark(now, floating);
        }

        self.close_remaining();
        if let Some(&last) = timeline.last() {
            let floating = self.floating_total();
            self.state.mark(last, floating);
        }

        info!(
            trades = self.state.trades.len(),
            final_balance = self.state.balance,
            max_drawdown_pct = self.state.max_drawdown_pct,
            "backtest complete"
        );
        self.into_result()
    }

    fn step_instrument(&mut self, i: usize, now: NaiveDateTime) {
        let data = &self.data[i];
        let tolerance = self.config.fine_timeframe.duration();

        let Some((fine_index, delta)) = nearest_bar(&data.fine, now) else {
            return;
        };
        if delta > tolerance {
            trace!(instrument = %data.instrument, %now, "no fine bar near tick, skipping");
            return;
        }

        let coarse_index = self.cursors[i].advance(&data.coarse, now);
        if !self.cursors[i].is_ready(self.config.min_coarse_bars) {
            trace!(instrument = %data.instrument, coarse_index, "coarse history not ready");
            return;
        }
        self.strategies[i].refresh_context(data, coarse_index);

        // Exits are evaluated once per fine bar. A tick between two of this
        // instrument's bars resolves back to the bar already stepped on.
        let fresh = self.last_fine[i] != Some(fine_index);
        self.last_fine[i] = Some(fine_index);
        if fresh {
            let bar = &data.fine[fine_index];
            let outcome = match self.config.exit_mode {
                ExitMode::Close => self.slots[i].update(bar.close, now),
                ExitMode::Intrabar => self.slots[i].update_intrabar(bar, now),
            };
            self.settle(outcome);
        } else {
            trace!(instrument = %data.instrument, fine_index, "fine bar already stepped");
        }

        if !self.slots[i].is_open() && fine_index >= self.config.min_fine_bars {
            self.try_open(i, fine_index, now);
        }
    }

    fn try_open(&mut self, i: usize, fine_index: usize, now: NaiveDateTime) {
        let risk_pct = self.config.instruments[i].risk_pct;
        let current = RiskBudget::current(
            self.slots
                .iter()
                .zip(&self.config.instruments)
                .filter(|(slot, _)| slot.is_open())
                .map(|(_, inst)| inst.risk_pct),
        );
        if !self.budget.admits(current, risk_pct) {
            trace!(instrument = %self.data[i].instrument, current, risk_pct, "risk budget full");
            return;
        }

        let data = &self.data[i];
        let price = data.fine[fine_index].close;
        let signal = self.strategies[i].generate_signal(data, fine_index, price, now);
        if !signal.is_actionable() {
            return;
        }
        let Some(params) = self.strategies[i].size_trade(&signal, self.state.balance, risk_pct)
        else {
            return;
        };
        let sized = Signal {
            entry: params.entry,
            stop: params.stop,
            target: params.target,
            ..signal
        };
        if params.size <= 0.0 || !sized.is_actionable() {
            debug!(
                instrument = %data.instrument,
                size = params.size,
                "strategy sized an unusable trade, skipping"
            );
            return;
        }

        let equity = self.state.balance + self.floating_total();
        let used_margin: f64 = self.slots.iter().map(PositionSlot::marked_margin).sum();
        let opened = self.slots[i].open(
            &sized,
            params.size,
            price,
            now,
            self.state.balance,
            equity,
            used_margin,
        );
        if let Some(pos) = self.slots[i].position().filter(|_| opened) {
            debug!(
                instrument = %pos.instrument,
                direction = %pos.direction,
                entry = pos.entry_price,
                stop = pos.stop,
                target = pos.target,
                size = pos.size,
                %now,
                "opened position"
            );
        } else {
            debug!(instrument = %data.instrument, size = params.size, "entry rejected by margin");
        }
    }

    fn settle(&mut self, outcome: UpdateOutcome) {
        if let Some(trade) = outcome.trade {
            debug!(
                instrument = %trade.instrument,
                reason = %trade.exit_reason,
                exit = trade.exit_price,
                pnl = trade.pnl,
                time = %trade.exit_time,
                "closed position"
            );
            self.state.record_trade(trade);
        }
    }

    fn close_remaining(&mut self) {
        for i in 0..self.slots.len() {
            if !self.slots[i].is_open() {
                continue;
            }
            let Some(last) = self.data[i].last_fine() else {
                continue;
            };
            let outcome = self.slots[i].force_close(last.close, last.time);
            self.settle(outcome);
        }
    }

    fn floating_total(&self) -> f64 {
        self.slots.iter().map(PositionSlot::marked_pnl).sum()
    }

    fn into_result(self) -> BacktestResult {
        BacktestResult {
            instruments: self
                .config
                .instruments
                .iter()
                .map(|inst| inst.instrument.clone())
                .collect(),
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            seed: self.seed,
            initial_balance: self.state.initial_balance,
            final_balance: self.state.balance,
            final_equity: self.state.equity,
            peak_balance: self.state.peak_balance,
            max_drawdown_pct: self.state.max_drawdown_pct,
            trades: self.state.trades,
            equity_curve: self.state.equity_curve,
        }
    }
}

/// Fetch fine and coarse bars for every configured instrument, in
/// configuration order.
pub fn load_instrument_data(
    config: &BacktestConfig,
    data_port: &dyn DataPort,
) -> Result<Vec<InstrumentData>, TradesimError> {
    config
        .instruments
        .iter()
        .map(|inst| {
            let fine = data_port.fetch_bars(
                &inst.instrument,
                config.fine_timeframe,
                config.start_date,
                config.end_date,
            )?;
            let coarse = data_port.fetch_bars(
                &inst.instrument,
                config.coarse_timeframe,
                config.start_date,
                config.end_date,
            )?;
            debug!(
                instrument = %inst.instrument,
                fine = fine.len(),
                coarse = coarse.len(),
                "loaded bars"
            );
            Ok(InstrumentData::new(inst.instrument.clone(), coarse, fine))
        })
        .collect()
}

/// Load data through `data_port` and run one backtest.
pub fn run_backtest(
    ctx: RunContext,
    data_port: &dyn DataPort,
) -> Result<BacktestResult, TradesimError> {
    ctx.config.validate()?;
    let data = load_instrument_data(&ctx.config, data_port)?;
    Ok(PortfolioBacktest::new(ctx, data)?.run())
}
