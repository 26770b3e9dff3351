use serde_derive::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::store::CounterStore;

/// Persisted running totals of one simulated energy counter, in watt-hours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AccumulatorSnapshot {
    pub imported_wh: f64,
    pub exported_wh: f64,
}

/// Monotonic time source, injected so tests can drive time manually.
pub trait MonotonicClock: Send {
    /// Elapsed time since a fixed, arbitrary origin.
    fn now(&self) -> Duration;
}

/// Wall clock backed by `std::time::Instant`.
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Simulates a cumulative energy counter from instantaneous power samples.
///
/// Positive power accumulates onto the imported total, negative power onto
/// the exported total, each by `|power| * elapsed`. Both totals only ever
/// grow, mirroring the hardware counters they stand in for. Totals are
/// persisted through the store after every sample so a process restart
/// resumes from the last known values instead of resetting to zero.
pub struct EnergyIntegrator<C: MonotonicClock = SystemClock> {
    counter_key: String,
    clock: C,
    last_sample: Option<Duration>,
    totals: AccumulatorSnapshot,
    store: Arc<dyn CounterStore>,
}

impl EnergyIntegrator<SystemClock> {
    /// Creates an integrator for `counter_key`, resuming from the persisted
    /// accumulator if one exists. Missing or unreadable prior state means
    /// starting from zero.
    pub fn restore(counter_key: &str, store: Arc<dyn CounterStore>) -> anyhow::Result<Self> {
        Self::restore_with_clock(counter_key, SystemClock::new(), store)
    }
}

impl<C: MonotonicClock> EnergyIntegrator<C> {
    pub fn restore_with_clock(
        counter_key: &str,
        clock: C,
        store: Arc<dyn CounterStore>,
    ) -> anyhow::Result<Self> {
        let totals = store.load_accumulator(counter_key)?.unwrap_or_default();
        Ok(Self {
            counter_key: counter_key.to_string(),
            clock,
            last_sample: None,
            totals,
            store,
        })
    }

    /// Advances the simulated counter by integrating `power` (watts, positive
    /// = drawing from the grid) over the time elapsed since the previous call
    /// and returns the running `(imported, exported)` totals in watt-hours.
    ///
    /// The first call after construction only records the sample time and
    /// returns the starting totals unchanged; there is no interval to
    /// integrate over yet.
    pub fn accumulate(&mut self, power: f64) -> anyhow::Result<(f64, f64)> {
        let now = self.clock.now();
        if let Some(last) = self.last_sample {
            // A clock that stepped backwards integrates over a zero interval.
            let dt = now.checked_sub(last).unwrap_or(Duration::ZERO);
            let energy_wh = power.abs() * dt.as_secs_f64() / 3600.0;
            if energy_wh.is_finite() {
                if power >= 0.0 {
                    self.totals.imported_wh += energy_wh;
                } else {
                    self.totals.exported_wh += energy_wh;
                }
            }
        }
        self.last_sample = Some(now);
        self.store.save_accumulator(&self.counter_key, &self.totals)?;
        Ok((self.totals.imported_wh, self.totals.exported_wh))
    }
}
