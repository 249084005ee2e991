//! Dollar Imbalance Aggregation
//!
//! The core state machine of the engine: a running signed dollar-volume
//! accumulator that emits a [`Bar`] whenever the absolute imbalance
//! between buy-initiated and sell-initiated notional crosses a
//! threshold, then resets.
//!
//! The machine is memoryless beyond its two running sums, performs no
//! I/O, and never fails on a valid [`Trade`]. It has exactly one owner
//! (the pipeline's consumer loop), which is what makes the lock-free
//! single-writer discipline structural rather than incidental.

use crate::domain::market::{Bar, Trade};

/// Running accumulation state since the last emitted bar.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ImbalanceState {
    /// Dollar volume of buy-initiated trades since the last bar.
    pub buy_volume: f64,
    /// Dollar volume of sell-initiated trades since the last bar.
    pub sell_volume: f64,
}

impl ImbalanceState {
    /// Absolute buy/sell dollar-volume imbalance.
    #[must_use]
    pub fn imbalance(&self) -> f64 {
        (self.buy_volume - self.sell_volume).abs()
    }

    /// True when nothing has accumulated since the last reset.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buy_volume == 0.0 && self.sell_volume == 0.0
    }
}

/// Decides when accumulated state warrants emitting a bar.
///
/// The fixed-threshold policy is the only one shipped; adaptive
/// schemes (e.g. EWMA of recent bar sizes) slot in as further
/// implementations without touching the aggregator.
pub trait ThresholdPolicy {
    /// Whether the current state has crossed the emission threshold.
    fn should_emit(&self, state: &ImbalanceState) -> bool;

    /// The threshold that will apply to the next accumulation window.
    fn next_threshold(&self, state: &ImbalanceState) -> f64;
}

/// Constant-threshold emission policy.
#[derive(Debug, Clone, Copy)]
pub struct FixedThreshold {
    threshold: f64,
}

impl FixedThreshold {
    /// Create a fixed threshold policy. `threshold` is in notional
    /// (dollar) units.
    #[must_use]
    pub const fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// The configured threshold.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl ThresholdPolicy for FixedThreshold {
    fn should_emit(&self, state: &ImbalanceState) -> bool {
        state.imbalance() >= self.threshold
    }

    fn next_threshold(&self, _state: &ImbalanceState) -> f64 {
        self.threshold
    }
}

/// The imbalance-bar state machine.
///
/// Consumes trades in strict arrival order and emits a [`Bar`] when
/// the policy fires. Emission and reset are a single synchronous step:
/// no trade can be observed between the crossing and the reset.
#[derive(Debug)]
pub struct ImbalanceAggregator<P = FixedThreshold> {
    state: ImbalanceState,
    policy: P,
}

impl<P: ThresholdPolicy> ImbalanceAggregator<P> {
    /// Create an aggregator with empty state.
    #[must_use]
    pub fn new(policy: P) -> Self {
        Self {
            state: ImbalanceState::default(),
            policy,
        }
    }

    /// Apply one trade, returning a bar if its arrival crossed the
    /// threshold.
    ///
    /// Sign convention (fixed per exchange documentation for the `m`
    /// flag): `is_buyer_maker == false` means the aggressor bought, so
    /// the notional accrues to buy volume; `is_buyer_maker == true`
    /// means the aggressor sold and the notional accrues to sell
    /// volume.
    pub fn apply(&mut self, trade: &Trade) -> Option<Bar> {
        let dollar_value = trade.dollar_value();

        if trade.is_buyer_maker {
            self.state.sell_volume += dollar_value;
        } else {
            self.state.buy_volume += dollar_value;
        }

        if self.policy.should_emit(&self.state) {
            let bar = Bar {
                timestamp: trade.timestamp,
                dollar_imbalance: self.state.imbalance(),
                threshold_reached: true,
            };
            self.state = ImbalanceState::default();
            return Some(bar);
        }

        None
    }

    /// Current accumulation state.
    #[must_use]
    pub const fn state(&self) -> &ImbalanceState {
        &self.state
    }

    /// The active emission policy.
    #[must_use]
    pub const fn policy(&self) -> &P {
        &self.policy
    }
}
