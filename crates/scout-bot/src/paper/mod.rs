//! Paper-trading engine.
//!
//! A deterministic portfolio simulator that tracks every qualified signal
//! against a virtual balance. Entries run a fixed gate chain (pause, slots,
//! re-entry, loss streak, drawdown, sizing, total at-risk); exits come from
//! stop-loss / take-profit checks, market resolution, or an explicit
//! reason. Every mutation persists the full state and holds the engine
//! lock, so a given market's enter/check/close calls are serialised.

pub mod store;

pub use store::{PaperPosition, PaperState, PaperStore, PaperTrade};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, info, warn};

use scout_common::Direction;

use crate::constants::{
    PAPER_MAX_LOSS_STREAK, PAPER_MAX_OPEN_POSITIONS, PAPER_MAX_POSITION, PAPER_MAX_RISK_PERCENT,
    PAPER_MIN_POSITION, PAPER_PAUSE_DRAWDOWN, PAPER_STOP_LOSS, PAPER_TAKE_PROFIT,
};

/// Pause length in days after a loss streak.
const LOSS_STREAK_PAUSE_DAYS: i64 = 1;
/// Pause length in days after a drawdown breach.
const DRAWDOWN_PAUSE_DAYS: i64 = 3;

/// Exit reason strings, stable across restarts and reports.
const REASON_STOP_LOSS: &str = "STOP_LOSS (-40%)";
const REASON_TAKE_PROFIT: &str = "TAKE_PROFIT (+50%)";
const REASON_RESOLUTION: &str = "RESOLUTION";

/// Configuration for the paper engine.
#[derive(Debug, Clone)]
pub struct PaperConfig {
    /// Virtual starting balance in dollars.
    pub starting_balance: Decimal,
    /// Path of the persisted state file.
    pub trades_file: std::path::PathBuf,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            starting_balance: crate::constants::PAPER_STARTING_BALANCE,
            trades_file: std::path::PathBuf::from("data/paper_trades.json"),
        }
    }
}

/// Aggregate report over the engine's history for one UTC day.
#[derive(Debug, Clone)]
pub struct DailyReport {
    pub balance: Decimal,
    pub total_pnl: Decimal,
    pub trades_today: usize,
    pub wins_today: usize,
    pub win_rate_today: Option<f64>,
    pub avg_win_percent: Option<Decimal>,
    pub avg_loss_percent: Option<Decimal>,
    pub open_positions: Vec<PaperPosition>,
    pub loss_streak: u32,
    pub paused: bool,
}

/// Deterministic portfolio simulator with durable state.
#[derive(Debug)]
pub struct PaperTradingEngine {
    config: PaperConfig,
    store: PaperStore,
    state: Mutex<PaperState>,
}

impl PaperTradingEngine {
    /// Create an engine, loading persisted state when present.
    pub fn new(config: PaperConfig) -> Self {
        let store = PaperStore::new(&config.trades_file);
        let state = Mutex::new(store.load_or_fresh(config.starting_balance));
        Self {
            config,
            store,
            state,
        }
    }

    /// Current balance (snapshot).
    pub fn balance(&self) -> Decimal {
        self.state.lock().balance
    }

    /// Open positions (snapshot copy).
    pub fn open_positions(&self) -> Vec<PaperPosition> {
        self.state.lock().open_positions.clone()
    }

    /// Number of open positions.
    pub fn open_count(&self) -> usize {
        self.state.lock().open_positions.len()
    }

    /// Whether a market was ever traded.
    pub fn has_traded(&self, market_id: &str) -> bool {
        self.state.lock().traded_market_ids.contains(market_id)
    }

    /// Attempt to open a position. Every gate failure returns `None` with
    /// an info log; rejections are policy, not errors.
    #[allow(clippy::too_many_arguments)]
    pub fn try_enter(
        &self,
        market_id: &str,
        question: &str,
        direction: Direction,
        entry_price: Decimal,
        quality_score: u8,
        catalyst: &str,
        hours_to_resolution: Option<f64>,
    ) -> Option<PaperPosition> {
        self.try_enter_at(
            market_id,
            question,
            direction,
            entry_price,
            quality_score,
            catalyst,
            hours_to_resolution,
            Utc::now(),
        )
    }

    /// Entry with an explicit clock, for deterministic tests.
    #[allow(clippy::too_many_arguments)]
    pub fn try_enter_at(
        &self,
        market_id: &str,
        question: &str,
        direction: Direction,
        entry_price: Decimal,
        quality_score: u8,
        catalyst: &str,
        hours_to_resolution: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<PaperPosition> {
        if entry_price <= Decimal::ZERO || entry_price >= Decimal::ONE {
            debug!(%market_id, %entry_price, "Entry price outside (0, 1)");
            return None;
        }

        let mut state = self.state.lock();

        // 1. Pause window
        if state.paused {
            if let Some(until) = state.paused_until
                && now < until
            {
                info!(%market_id, %until, "Engine paused, rejecting entry");
                return None;
            }
            state.paused = false;
            state.paused_until = None;
        }

        // 2. Slot cap
        if state.open_positions.len() >= PAPER_MAX_OPEN_POSITIONS {
            info!(%market_id, "All position slots in use");
            return None;
        }

        // 3. One open position per market
        if state.open_positions.iter().any(|p| p.market_id == market_id) {
            info!(%market_id, "Position already open for market");
            return None;
        }

        // 4. Never re-enter a traded market
        if state.traded_market_ids.contains(market_id) {
            info!(%market_id, "Market already traded, no re-entry");
            return None;
        }

        // 5. Loss streak pause
        if state.loss_streak >= PAPER_MAX_LOSS_STREAK {
            state.paused = true;
            state.paused_until = Some(now + Duration::days(LOSS_STREAK_PAUSE_DAYS));
            warn!(streak = state.loss_streak, "Loss streak hit, pausing for a day");
            self.store.save(&state);
            return None;
        }

        // 6. Drawdown pause
        let drawdown = (self.config.starting_balance - state.balance) / self.config.starting_balance;
        if drawdown >= PAPER_PAUSE_DRAWDOWN {
            state.paused = true;
            state.paused_until = Some(now + Duration::days(DRAWDOWN_PAUSE_DAYS));
            warn!(%drawdown, "Drawdown limit hit, pausing for three days");
            self.store.save(&state);
            return None;
        }

        // 7. Score-tiered sizing, clamped to the floor/cap
        let size_percent = if quality_score >= 85 {
            dec!(0.05)
        } else if quality_score >= 70 {
            dec!(0.03)
        } else {
            dec!(0.02)
        };
        let mut position_size = (state.balance * size_percent)
            .round_dp(2)
            .clamp(PAPER_MIN_POSITION, PAPER_MAX_POSITION);

        // 8. Total at-risk cap, shrinking the entry to fit
        let open_total = state.open_size_total();
        if (open_total + position_size) / state.balance > PAPER_MAX_RISK_PERCENT {
            position_size = (state.balance * PAPER_MAX_RISK_PERCENT - open_total).round_dp(2);
            if position_size < PAPER_MIN_POSITION {
                info!(%market_id, "No room under the at-risk cap");
                return None;
            }
        }

        // 9. Book it
        let shares = (position_size / entry_price).round_dp(2);
        let position = PaperPosition {
            market_id: market_id.to_string(),
            question: question.to_string(),
            direction,
            entry_price,
            size: position_size,
            shares,
            quality_score,
            catalyst: catalyst.to_string(),
            hours_to_resolution,
            entry_time: now,
        };

        state.balance -= position_size;
        state.open_positions.push(position.clone());
        state.traded_market_ids.insert(market_id.to_string());
        self.store.save(&state);

        info!(
            %market_id,
            direction = %direction,
            size = %position_size,
            %shares,
            entry = %entry_price,
            balance = %state.balance,
            "Paper position opened"
        );
        Some(position)
    }

    /// Check a position against the current price and close it when a
    /// stop-loss / take-profit trips or an explicit reason is given.
    pub fn check_and_close(
        &self,
        market_id: &str,
        current_price: Decimal,
        exit_reason: Option<&str>,
    ) -> Option<PaperTrade> {
        let mut state = self.state.lock();
        let index = state
            .open_positions
            .iter()
            .position(|p| p.market_id == market_id)?;

        let position = &state.open_positions[index];
        let unrealized = (position.shares * current_price - position.size) / position.size;

        let reason = match exit_reason {
            Some(reason) => reason.to_string(),
            None if unrealized <= PAPER_STOP_LOSS => REASON_STOP_LOSS.to_string(),
            None if unrealized >= PAPER_TAKE_PROFIT => REASON_TAKE_PROFIT.to_string(),
            None => return None,
        };

        let trade = close_at(&mut state, index, current_price, reason);
        self.store.save(&state);
        Some(trade)
    }

    /// Close a position at resolution: $1 per share when the bet won,
    /// nothing when it lost.
    pub fn close_at_resolution(&self, market_id: &str, won_bet: bool) -> Option<PaperTrade> {
        let mut state = self.state.lock();
        let index = state
            .open_positions
            .iter()
            .position(|p| p.market_id == market_id)?;

        let exit_price = if won_bet { Decimal::ONE } else { Decimal::ZERO };
        let trade = close_at(&mut state, index, exit_price, REASON_RESOLUTION.to_string());
        self.store.save(&state);
        Some(trade)
    }

    /// Aggregate report for the given UTC day.
    pub fn daily_report(&self, now: DateTime<Utc>) -> DailyReport {
        let state = self.state.lock();
        let today = now.date_naive();

        let todays: Vec<&PaperTrade> = state
            .closed_trades
            .iter()
            .filter(|t| t.exit_time.date_naive() == today)
            .collect();

        let wins: Vec<&&PaperTrade> = todays.iter().filter(|t| t.is_win).collect();
        let losses: Vec<&&PaperTrade> = todays.iter().filter(|t| !t.is_win).collect();

        let avg = |trades: &[&&PaperTrade]| -> Option<Decimal> {
            if trades.is_empty() {
                return None;
            }
            let sum: Decimal = trades.iter().map(|t| t.pnl_percent).sum();
            Some((sum / Decimal::from(trades.len())).round_dp(2))
        };

        DailyReport {
            balance: state.balance,
            total_pnl: state.total_closed_pnl(),
            trades_today: todays.len(),
            wins_today: wins.len(),
            win_rate_today: if todays.is_empty() {
                None
            } else {
                Some(wins.len() as f64 / todays.len() as f64)
            },
            avg_win_percent: avg(&wins),
            avg_loss_percent: avg(&losses),
            open_positions: state.open_positions.clone(),
            loss_streak: state.loss_streak,
            paused: state.paused,
        }
    }
}

/// Close bookkeeping shared by every exit path. Caller persists.
fn close_at(
    state: &mut PaperState,
    index: usize,
    exit_price: Decimal,
    exit_reason: String,
) -> PaperTrade {
    let position = state.open_positions.remove(index);

    let pnl = position.shares * exit_price - position.size;
    let pnl_percent = (pnl / position.size * dec!(100)).round_dp(2);
    let is_win = pnl > Decimal::ZERO;

    state.balance += position.size + pnl;
    if is_win {
        state.loss_streak = 0;
    } else {
        state.loss_streak += 1;
    }

    let trade = PaperTrade {
        position,
        exit_price,
        exit_reason,
        exit_time: Utc::now(),
        pnl_dollars: pnl,
        pnl_percent,
        is_win,
        balance_after: state.balance,
    };

    info!(
        market_id = %trade.position.market_id,
        reason = %trade.exit_reason,
        pnl = %trade.pnl_dollars,
        balance = %state.balance,
        streak = state.loss_streak,
        "Paper position closed"
    );

    state.closed_trades.push(trade.clone());
    trade
}
