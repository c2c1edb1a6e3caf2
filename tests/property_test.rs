//! Property tests for account and position invariants.
//!
//! 1. Peak balance never falls and drawdown stays within [0, 100]
//! 2. The break-even ratchet only tightens the stop
//! 3. Entry fills stay within the configured cost band
//! 4. Closed P&L has the sign of the favorable move net of commission
//! 5. The risk budget never admits past its cap

mod common;

use common::*;
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tradesim::domain::cost::CostParameters;
use tradesim::domain::lifecycle::PositionSlot;
use tradesim::domain::portfolio::{PortfolioState, RiskBudget};
use tradesim::domain::position::Direction;
use tradesim::domain::signal::Signal;

fn arb_price() -> impl Strategy<Value = f64> {
    (1900.0..2100.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Long), Just(Direction::Short)]
}

fn gold_costs() -> CostParameters {
    CostParameters {
        leverage: 100.0,
        contract_size: 100.0,
        ..CostParameters::default()
    }
}

/// Open a 0.1 lot position at 2000 with a 10 point stop and 20 point target.
fn open_slot(direction: Direction, costs: CostParameters, seed: u64) -> PositionSlot {
    let mut slot = PositionSlot::new("XAUUSD", costs, StdRng::seed_from_u64(seed));
    let sign = direction.sign();
    let signal = Signal::new(direction, 2000.0, 2000.0 - sign * 10.0, 2000.0 + sign * 20.0);
    assert!(slot.open(&signal, 0.1, 2000.0, t(0), 10_000.0, 10_000.0, 0.0));
    slot
}

// ── 1. Drawdown bounds ───────────────────────────────────────────────

proptest! {
    #[test]
    fn peak_is_monotone_and_drawdown_bounded(
        floats in prop::collection::vec(-20_000.0..20_000.0_f64, 1..60),
    ) {
        let mut state = PortfolioState::new(10_000.0);
        let mut prev_peak = state.peak_balance;
        let mut prev_max_dd = state.max_drawdown_pct;
        for (i, floating) in floats.into_iter().enumerate() {
            state.mark(t(15 * i as i64), floating);
            prop_assert!(state.peak_balance >= prev_peak);
            prop_assert!(state.max_drawdown_pct >= prev_max_dd);
            let dd = state.drawdown_pct();
            prop_assert!((0.0..=100.0).contains(&dd));
            prop_assert!(state.max_drawdown_pct <= 100.0);
            prev_peak = state.peak_balance;
            prev_max_dd = state.max_drawdown_pct;
        }
    }
}

// ── 2. Break-even ratchet ────────────────────────────────────────────

proptest! {
    #[test]
    fn stop_only_tightens(
        direction in arb_direction(),
        path in prop::collection::vec(arb_price(), 1..40),
    ) {
        let mut slot = open_slot(direction, gold_costs(), 1);
        let sign = direction.sign();
        let mut prev_stop = 2000.0 - sign * 10.0;
        for (i, price) in path.into_iter().enumerate() {
            let outcome = slot.update(price, t(15 * (i as i64 + 1)));
            if outcome.closed {
                break;
            }
            let stop = slot.position().map(|p| p.stop).unwrap_or(prev_stop);
            // moving the stop toward price is the only allowed direction
            prop_assert!(sign * (stop - prev_stop) >= 0.0);
            prop_assert!(sign * (stop - 2000.0) <= 0.0);
            prev_stop = stop;
        }
    }
}

// ── 3. Cost band ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn entry_fill_within_spread_and_slippage(
        direction in arb_direction(),
        seed in any::<u64>(),
        spread in 0.0..1.0_f64,
        slip_min in 0.0..0.5_f64,
        slip_width in 0.0..0.5_f64,
    ) {
        let costs = CostParameters {
            spread,
            slippage_min: slip_min,
            slippage_max: slip_min + slip_width,
            ..gold_costs()
        };
        let slot = open_slot(direction, costs, seed);
        let entry = slot.position().map(|p| p.entry_price).unwrap_or(f64::NAN);
        let adverse = direction.sign() * (entry - 2000.0);
        prop_assert!(adverse >= spread + slip_min - 1e-9);
        prop_assert!(adverse <= spread + slip_min + slip_width + 1e-9);
    }
}

// ── 4. P&L sign ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn forced_pnl_follows_favorable_move(
        direction in arb_direction(),
        exit in arb_price(),
        commission in 0.0..10.0_f64,
    ) {
        let costs = CostParameters {
            commission_per_unit: commission,
            ..gold_costs()
        };
        let mut slot = open_slot(direction, costs, 3);
        let outcome = slot.force_close(exit, t(15));
        prop_assert!(outcome.closed);
        let expected = direction.sign() * (exit - 2000.0) * 100.0 * 0.1 - commission * 0.1;
        prop_assert!((outcome.pnl - expected).abs() < 1e-6);
        prop_assert!(!slot.is_open());
    }
}

// ── 5. Risk budget ───────────────────────────────────────────────────

proptest! {
    #[test]
    fn budget_never_admits_past_cap(
        max_total in 0.5..5.0_f64,
        requests in prop::collection::vec(0.1..2.0_f64, 1..20),
    ) {
        let budget = RiskBudget::new(max_total);
        let mut open: Vec<f64> = Vec::new();
        for fraction in requests {
            let current = RiskBudget::current(open.iter().copied());
            if budget.admits(current, fraction) {
                open.push(fraction);
            }
            prop_assert!(RiskBudget::current(open.iter().copied()) <= max_total + 1e-9);
        }
    }
}
