//! Configuration for the pitwall daemon
//!
//! Loads configuration from a TOML file. Every section has sensible
//! defaults so the daemon can also start without a config file.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub hardware: HardwareConfig,
    #[serde(default)]
    pub strip: StripConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Diagnostic adapter configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HardwareConfig {
    /// ELM327 serial port (e.g. `/dev/rfcomm0` for a bound Bluetooth adapter).
    ///
    /// The special value `"sim"` selects the built-in simulated vehicle,
    /// useful for bench testing without a car.
    pub obd_port: String,
    /// Serial baud rate (38400 is the common ELM327 default)
    pub baud_rate: u32,
    /// Delay between poll cycles in milliseconds
    pub poll_interval_ms: u64,
    /// Fixed delay before reopening the adapter after a disconnect, in seconds
    pub retry_delay_secs: u64,
    /// Command names to watch each cycle (see [`crate::obd::ObdCommand`])
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,
}

/// Addressable light strip configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StripConfig {
    /// Number of pixels on the strip
    pub led_count: usize,
    /// Strip driver: `"none"` (no hardware attached) or `"console"`
    /// (log rendered frames at debug level)
    pub driver: String,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Remote endpoint address (`host:port`)
    pub endpoint: String,
    /// Fixed delay between reconnect attempts, in seconds
    pub retry_delay_secs: u64,
}

/// Display engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Mode rendered before the first remote command arrives
    pub initial_mode: String,
    /// Ratio source for the acceleration bar: `"throttle"` (live from the
    /// vehicle) or `"simulated"` (internal random walk)
    pub accel_source: String,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

fn default_commands() -> Vec<String> {
    [
        "RPM",
        "SPEED",
        "COOLANT_TEMP",
        "THROTTLE_POS",
        "ENGINE_LOAD",
        "MAF",
        "INTAKE_TEMP",
        "ELM_VOLTAGE",
        "GET_CURRENT_DTC",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            obd_port: "/dev/rfcomm0".to_string(),
            baud_rate: 38400,
            poll_interval_ms: 250,
            retry_delay_secs: 30,
            commands: default_commands(),
        }
    }
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            led_count: 30,
            driver: "none".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: "127.0.0.1:5555".to_string(),
            retry_delay_secs: 5,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            initial_mode: "chase".to_string(),
            accel_source: "throttle".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hardware: HardwareConfig::default(),
            strip: StripConfig::default(),
            network: NetworkConfig::default(),
            display: DisplayConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.hardware.obd_port, "/dev/rfcomm0");
        assert_eq!(config.hardware.poll_interval_ms, 250);
        assert_eq!(config.strip.led_count, 30);
        assert_eq!(config.network.retry_delay_secs, 5);
        assert_eq!(config.display.initial_mode, "chase");
        assert_eq!(config.hardware.commands.len(), 9);
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[hardware]"));
        assert!(toml_string.contains("[strip]"));
        assert!(toml_string.contains("[network]"));
        assert!(toml_string.contains("[display]"));
        assert!(toml_string.contains("[logging]"));

        assert!(toml_string.contains("obd_port = \"/dev/rfcomm0\""));
        assert!(toml_string.contains("led_count = 30"));
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[hardware]
obd_port = "/dev/ttyUSB0"
baud_rate = 115200
poll_interval_ms = 500
retry_delay_secs = 10

[strip]
led_count = 60
driver = "console"

[network]
endpoint = "telemetry.example.com:5555"
retry_delay_secs = 3

[display]
initial_mode = "off"
accel_source = "simulated"

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.hardware.obd_port, "/dev/ttyUSB0");
        assert_eq!(config.hardware.poll_interval_ms, 500);
        assert_eq!(config.strip.led_count, 60);
        assert_eq!(config.network.endpoint, "telemetry.example.com:5555");
        assert_eq!(config.display.accel_source, "simulated");
        // Omitted command list falls back to the full watch list
        assert_eq!(config.hardware.commands.len(), 9);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("[strip]\nled_count = 8\ndriver = \"none\"\n").unwrap();
        assert_eq!(config.strip.led_count, 8);
        assert_eq!(config.hardware.obd_port, "/dev/rfcomm0");
        assert_eq!(config.logging.level, "info");
    }
}
