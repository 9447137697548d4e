//! Synthetic OHLCV bar generator.
//!
//! `BarGenerator` produces a path-dependent price series via a bounded random
//! walk. One instance exists per server process and is shared (behind a mutex)
//! by every connection, so all simultaneously connected clients observe the
//! same evolving price path.
//!
//! Walk model, per [`BarGenerator::generate_next`] call:
//! - the walk price moves by a uniform step in `[-2, 2)` and is clamped into
//!   `[50, 300]`;
//! - `high`/`low` spread around the walk price by a uniform volatility of up
//!   to 2%;
//! - `open` chains from the previous bar's close, `close` is the walk price
//!   plus uniform noise in `[-1, 1)`;
//! - `volume` is drawn independently of price.
//!
//! OHLC values are rounded to cents on the emitted bar, and `high`/`low` are
//! widened afterwards so they always bracket `open` and `close`. The walk
//! price itself is kept at full precision; rounding never feeds back into it.

use chrono::{SecondsFormat, Utc};
use feed_common::Bar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Symbol identifier for the single modeled instrument.
pub const SYMBOL: &str = "BA";

/// Starting price of the walk.
const START_PRICE: f64 = 180.0;
/// Hard floor for the walk price.
const MIN_PRICE: f64 = 50.0;
/// Hard ceiling for the walk price.
const MAX_PRICE: f64 = 300.0;
/// Maximum per-step price move, in either direction.
const MAX_STEP: f64 = 2.0;
/// Maximum per-bar volatility used for the high/low spread.
const MAX_VOLATILITY: f64 = 0.02;
/// Half-open range of synthetic per-bar volumes.
const VOLUME_RANGE: std::ops::Range<u64> = 500_000..1_500_000;

/// Bounded-random-walk generator for a single symbol.
pub struct BarGenerator {
    /// Walk state, full precision, always within `[MIN_PRICE, MAX_PRICE]`.
    current_price: f64,
    /// Most recent emitted bar; seeds the `open` of the next bar.
    last_bar: Bar,
    rng: StdRng,
}

impl BarGenerator {
    /// Create a generator seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Create a generator with a deterministic RNG seed, for tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let volume = rng.random_range(VOLUME_RANGE);
        let last_bar = Bar {
            date: now_rfc3339(),
            open: START_PRICE,
            high: START_PRICE,
            low: START_PRICE,
            close: START_PRICE,
            volume,
            name: SYMBOL.to_string(),
        };
        Self {
            current_price: START_PRICE,
            last_bar,
            rng,
        }
    }

    /// The most recent bar, initially the flat seed bar at the starting price.
    ///
    /// This is what new connections receive as their `initial` message, so
    /// clients that connect back-to-back before any update tick fires all see
    /// the same bar.
    pub fn last_bar(&self) -> &Bar {
        &self.last_bar
    }

    /// Current walk price, full precision.
    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    /// Advance the walk one step and emit the next bar. Always succeeds.
    pub fn generate_next(&mut self) -> Bar {
        let price_change: f64 = self.rng.random_range(-MAX_STEP..MAX_STEP);
        let volatility: f64 = self.rng.random_range(0.0..MAX_VOLATILITY);

        self.current_price = (self.current_price + price_change).clamp(MIN_PRICE, MAX_PRICE);

        let high = self.current_price * (1.0 + volatility * self.rng.random_range(0.0..1.0));
        let low = self.current_price * (1.0 - volatility * self.rng.random_range(0.0..1.0));
        let open = self.last_bar.close;
        let close = self.current_price + self.rng.random_range(-1.0..1.0);
        let volume = self.rng.random_range(VOLUME_RANGE);

        // Round to cents for the wire, then widen high/low so they always
        // bracket open/close; the noise on `close` can otherwise escape them.
        let open = round_cents(open);
        let close = round_cents(close);
        let high = round_cents(high).max(open).max(close);
        let low = round_cents(low).min(open).min(close);

        let bar = Bar {
            date: now_rfc3339(),
            open,
            high,
            low,
            close,
            volume,
            name: SYMBOL.to_string(),
        };
        self.last_bar = bar.clone();
        bar
    }
}

impl Default for BarGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn round_cents(price: f64) -> f64 {
    (price * 100.0).round() / 100.0
}
