use anyhow::Context;
use serde_derive::{Deserialize, Serialize};

/// Configuration for one physical meter device and the counters it exposes.
///
/// Provided fully formed by the operator as a JSON document; the bridge only
/// reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterDeviceConfig {
    pub id: String,
    pub url: String,
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
    pub counters: Vec<CounterConfig>,
}

fn default_poll_period_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterConfig {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub configuration: CounterEndpoints,
}

/// Relative measurement paths on the device.
/// An empty path means the device does not expose that measurement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterEndpoints {
    #[serde(default)]
    pub power_path: String,
    #[serde(default)]
    pub imported_path: String,
    #[serde(default)]
    pub exported_path: String,
    #[serde(default)]
    pub current_l1_path: String,
    #[serde(default)]
    pub current_l2_path: String,
    #[serde(default)]
    pub current_l3_path: String,
}

/// Static identity metadata reported alongside a counter's readings.
///
/// The `id` is the stable counter identifier keying all persisted state for
/// this counter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentInfo {
    pub id: String,
    pub name: String,
    pub component_type: String,
}

impl ComponentInfo {
    pub fn from_counter_config(device: &MeterDeviceConfig, counter: &CounterConfig) -> Self {
        let name = if counter.name.is_empty() {
            format!("Counter {}", counter.id)
        } else {
            counter.name.clone()
        };
        Self {
            id: format!("{}_{}", device.id, counter.id),
            name,
            component_type: "counter".to_string(),
        }
    }
}

impl MeterDeviceConfig {
    /// Loads and parses the device configuration from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read meter config file {path}"))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Cannot parse meter config file {path}"))?;
        Ok(config)
    }
}
