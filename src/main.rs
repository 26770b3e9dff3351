use config::MeterDeviceConfig;
use meter_poller::MeterPoller;
use reading_assembler::ReadingAssembler;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use store::JsonFileStore;

mod config;
mod energy_integrator;
mod meter_poller;
mod reading_assembler;
mod store;
mod value_fetcher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    println!("Starting HTTP meter bridge");
    let config_path = env::var("METER_CONFIG").unwrap_or_else(|_| "meter_config.json".to_string());
    let device = MeterDeviceConfig::load(&config_path)?;

    let state_dir = env::var("STATE_DIR").unwrap_or_else(|_| "state".to_string());
    let store = Arc::new(JsonFileStore::new(&state_dir)?);

    println!(
        "Polling {} every {}ms, persisting readings to {state_dir}",
        device.url, device.poll_period_ms
    );

    // Each counter gets its own assembler/integrator pair on its own task;
    // there is no shared mutable state between counters.
    let period = Duration::from_millis(device.poll_period_ms);
    let mut pollers = Vec::new();
    for counter in &device.counters {
        let assembler = ReadingAssembler::new(&device, counter, store.clone())?;
        pollers.push(MeterPoller::new(assembler, period).spawn());
    }

    for poller in pollers {
        poller.await?;
    }

    Ok(())
}
