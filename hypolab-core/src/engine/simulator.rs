//! Bar-by-bar trade simulator with a strict no-look-ahead contract.
//!
//! Per bar `i`, in order:
//! 1. Pending entry: if bar `i-1` signalled, open at `bar[i].open` (plus slippage).
//! 2. Open position (entered before `i`): liquidation check, then the exit model.
//! 3. Signal: if flat, not just closed and `signals[i]` is set, mark an entry
//!    pending for bar `i+1`.
//! 4. Last bar with a position still open: force-close at `bar.close`.
//! 5. Record one equity point (realized only, flat between trades).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Bar, EquityPoint, ExitReason, Position, TimeSeries, Trade};
use crate::error::{ConfigurationError, DataIntegrityError};
use crate::exit::{ExitDecision, ExitModel, ExitModelFactory};

/// Liquidation cushion above the theoretical wipe-out level.
const LIQUIDATION_BUFFER: f64 = 0.005;

/// Fixed-percentage cost model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Fee per side, in percent of notional.
    pub fees_pct: f64,
    /// Entry slippage in percent: entries fill above the open.
    pub slippage_pct: f64,
    /// 1 = spot. Above 1 scales returns and enables liquidation.
    pub leverage: f64,
}

impl Default for SimulationConfig {
    /// Frictionless: no fees, no slippage, no leverage.
    fn default() -> Self {
        Self {
            fees_pct: 0.0,
            slippage_pct: 0.0,
            leverage: 1.0,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let out_of_range = |name: &str, reason: String| ConfigurationError::ParameterOutOfRange {
            name: name.to_string(),
            reason,
        };
        if !(self.fees_pct.is_finite() && self.fees_pct >= 0.0) {
            return Err(out_of_range(
                "fees_pct",
                format!("{} must be finite and >= 0", self.fees_pct),
            ));
        }
        if !(self.slippage_pct.is_finite() && self.slippage_pct >= 0.0) {
            return Err(out_of_range(
                "slippage_pct",
                format!("{} must be finite and >= 0", self.slippage_pct),
            ));
        }
        if !(self.leverage.is_finite() && self.leverage >= 1.0) {
            return Err(out_of_range(
                "leverage",
                format!("{} must be finite and >= 1", self.leverage),
            ));
        }
        Ok(())
    }

    /// Price at which a leveraged long is wiped out, if leverage applies.
    pub fn liquidation_price(&self, entry_price: f64) -> Option<f64> {
        (self.leverage > 1.0)
            .then(|| entry_price * (1.0 - 1.0 / self.leverage + LIQUIDATION_BUFFER))
    }
}

/// Trades plus one equity point per bar of the input series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
}

/// Stateless between runs: the same inputs always yield the same output.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simulator {
    config: SimulationConfig,
}

struct OpenPosition {
    position: Position,
    model: Box<dyn ExitModel>,
}

impl Simulator {
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Frictionless simulator.
    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Simulate `series` under `signals` (one flag per bar, already aligned to
    /// the series' timestamps), asking `exits` for a fresh exit model per
    /// position.
    pub fn run(
        &self,
        series: &TimeSeries,
        signals: &[bool],
        exits: &dyn ExitModelFactory,
    ) -> Result<SimulationResult, DataIntegrityError> {
        if signals.len() != series.len() {
            return Err(DataIntegrityError::SignalLengthMismatch {
                signals: signals.len(),
                bars: series.len(),
            });
        }

        let bars = series.bars();
        let last_index = bars.len().saturating_sub(1);
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity: Vec<EquityPoint> = Vec::with_capacity(bars.len());
        let mut open: Option<OpenPosition> = None;
        let mut pending_entry = false;
        let mut multiple = 1.0_f64;

        for (i, bar) in bars.iter().enumerate() {
            let mut closed_this_bar = false;

            if pending_entry {
                pending_entry = false;
                let entry_price = bar.open * (1.0 + self.config.slippage_pct / 100.0);
                open = Some(OpenPosition {
                    position: Position::new(bar.timestamp, entry_price, i),
                    model: exits.create(),
                });
            } else if let Some(op) = open.as_mut() {
                let decision = self
                    .liquidation_check(&op.position, bar)
                    .or_else(|| op.model.evaluate(&op.position, bar));
                if let Some(decision) = decision {
                    let trade = self.close(series, &op.position, decision, i);
                    multiple *= 1.0 + trade.return_pct / 100.0;
                    trades.push(trade);
                    open = None;
                    closed_this_bar = true;
                }
            }

            if open.is_none() && !closed_this_bar && signals[i] {
                if i < last_index {
                    pending_entry = true;
                } else {
                    debug!(
                        symbol = series.symbol(),
                        timestamp = %bar.timestamp,
                        "entry signal on final bar ignored"
                    );
                }
            }

            if i == last_index {
                if let Some(op) = open.take() {
                    warn!(
                        symbol = series.symbol(),
                        entry = %op.position.entry_timestamp,
                        "series ended with open position, closing at last close"
                    );
                    // An entry on the final bar has not been through the
                    // liquidation check yet.
                    let decision = self.liquidation_check(&op.position, bar).unwrap_or_else(
                        || ExitDecision::new(bar.close, ExitReason::EndOfData, bar),
                    );
                    let trade = self.close(series, &op.position, decision, i);
                    multiple *= 1.0 + trade.return_pct / 100.0;
                    trades.push(trade);
                }
            }

            equity.push(EquityPoint {
                timestamp: bar.timestamp,
                cumulative_return: multiple - 1.0,
            });
        }

        debug!(
            symbol = series.symbol(),
            bars = bars.len(),
            trades = trades.len(),
            "simulation complete"
        );
        Ok(SimulationResult { trades, equity })
    }

    fn liquidation_check(&self, position: &Position, bar: &Bar) -> Option<ExitDecision> {
        let price = self.config.liquidation_price(position.entry_price)?;
        (bar.low <= price).then(|| ExitDecision::new(price, ExitReason::Liquidated, bar))
    }

    fn close(
        &self,
        series: &TimeSeries,
        position: &Position,
        decision: ExitDecision,
        exit_bar: usize,
    ) -> Trade {
        let leverage = self.config.leverage;
        let (gross_return_pct, fees_paid_pct, return_pct) =
            if decision.exit_reason == ExitReason::Liquidated {
                (-100.0, self.config.fees_pct * 2.0, -100.0)
            } else {
                let gross = (decision.exit_price / position.entry_price - 1.0) * 100.0 * leverage;
                let fees = self.config.fees_pct * 2.0 * leverage;
                // Losses never exceed the posted margin.
                (gross, fees, (gross - fees).max(-100.0))
            };

        Trade {
            symbol: series.symbol().to_string(),
            interval: series.interval(),
            entry_timestamp: position.entry_timestamp,
            entry_price: position.entry_price,
            entry_bar: position.entry_bar_index,
            exit_timestamp: decision.exit_timestamp,
            exit_price: decision.exit_price,
            exit_bar,
            exit_reason: decision.exit_reason,
            bars_held: exit_bar - position.entry_bar_index,
            gross_return_pct,
            fees_paid_pct,
            return_pct,
            holding_secs: (decision.exit_timestamp - position.entry_timestamp).num_seconds(),
        }
    }
}
