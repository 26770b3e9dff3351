use anyhow::Context;
use serde_derive::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{ComponentInfo, CounterConfig, MeterDeviceConfig};
use crate::energy_integrator::{EnergyIntegrator, MonotonicClock, SystemClock};
use crate::store::CounterStore;
use crate::value_fetcher::ValueFetcher;

/// One normalized meter sample handed to the value store each polling cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterReading {
    /// Instantaneous power in watts, positive when drawing from the grid.
    pub power: f64,
    /// Cumulative energy drawn from the grid, watt-hours.
    pub imported: f64,
    /// Cumulative energy fed back into the grid, watt-hours.
    pub exported: f64,
    /// Per-phase currents in amps, present only when all three phases
    /// reported a value.
    pub currents: Option<[f64; 3]>,
}

/// Assembles one `CounterReading` per polling cycle for a single counter.
///
/// Cumulative totals come from the device when both endpoints answer;
/// otherwise the pair is replaced wholesale by the simulated totals, so a
/// reading never mixes a live counter value with a simulated one.
pub struct ReadingAssembler<C: MonotonicClock = SystemClock> {
    component: ComponentInfo,
    get_power: ValueFetcher,
    get_imported: ValueFetcher,
    get_exported: ValueFetcher,
    get_currents: [ValueFetcher; 3],
    integrator: EnergyIntegrator<C>,
    store: Arc<dyn CounterStore>,
}

impl ReadingAssembler<SystemClock> {
    pub fn new(
        device: &MeterDeviceConfig,
        counter: &CounterConfig,
        store: Arc<dyn CounterStore>,
    ) -> anyhow::Result<Self> {
        let component = ComponentInfo::from_counter_config(device, counter);
        let integrator = EnergyIntegrator::restore(&component.id, store.clone())?;
        Ok(Self::with_integrator(device, counter, integrator, store))
    }
}

impl<C: MonotonicClock> ReadingAssembler<C> {
    /// Builds an assembler around an externally constructed integrator.
    pub fn with_integrator(
        device: &MeterDeviceConfig,
        counter: &CounterConfig,
        integrator: EnergyIntegrator<C>,
        store: Arc<dyn CounterStore>,
    ) -> Self {
        let component = ComponentInfo::from_counter_config(device, counter);
        let client = reqwest::Client::new();
        let endpoints = &counter.configuration;
        let bind = |path: &str| ValueFetcher::new(client.clone(), &device.url, path);

        Self {
            component,
            get_power: bind(&endpoints.power_path),
            get_imported: bind(&endpoints.imported_path),
            get_exported: bind(&endpoints.exported_path),
            get_currents: [
                bind(&endpoints.current_l1_path),
                bind(&endpoints.current_l2_path),
                bind(&endpoints.current_l3_path),
            ],
            integrator,
            store,
        }
    }

    pub fn component_info(&self) -> &ComponentInfo {
        &self.component
    }

    /// Runs one polling cycle: fetch all measurements, fall back to the
    /// simulated counter where the device cannot report cumulative energy,
    /// and persist the assembled reading. Transport and persistence failures
    /// abandon the cycle without storing a partial reading.
    pub async fn update(&mut self) -> anyhow::Result<CounterReading> {
        let imported = self.get_imported.fetch().await?;
        let exported = self.get_exported.fetch().await?;
        let mut currents = [None; 3];
        for (slot, getter) in currents.iter_mut().zip(self.get_currents.iter()) {
            *slot = getter.fetch().await?;
        }
        let power = self
            .get_power
            .fetch()
            .await?
            .with_context(|| format!("Meter reported no power value for {}", self.component.id))?;

        // Simulated and device-reported totals never mix within one reading.
        let (imported, exported) = match (imported, exported) {
            (Some(imported), Some(exported)) => (imported, exported),
            _ => self.integrator.accumulate(power)?,
        };

        let currents = match currents {
            [Some(l1), Some(l2), Some(l3)] => Some([l1, l2, l3]),
            _ => None,
        };

        let reading = CounterReading {
            power,
            imported,
            exported,
            currents,
        };
        self.store.set_reading(&self.component.id, &reading)?;
        Ok(reading)
    }
}
