//! OBD-II telemetry acquisition
//!
//! The telemetry source polls a fixed command set against a backend at a
//! configured interval and emits [`Reading`] events into a bounded
//! channel. Backends implement [`ObdBackend`]: the real ELM327 adapter
//! over serial, or a simulated vehicle for bench use.

pub mod commands;
pub mod elm327;
pub mod sim;
pub mod source;

pub use commands::ObdCommand;
pub use elm327::Elm327;
pub use sim::SimVehicle;
pub use source::TelemetrySource;

use crate::config::HardwareConfig;
use crate::error::Result;
use crate::transport::SerialTransport;
use serde::{Deserialize, Serialize};

/// Value carried by a reading
///
/// Diagnostic-trouble-code readings carry the list of codes; every other
/// command carries a unit-stripped numeric magnitude. Serializes to a
/// bare number or array on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadingValue {
    Scalar(f64),
    Codes(Vec<String>),
}

/// One normalized sensor reading
///
/// Wire payload is `{"command": ..., "value": ...}`; the capture
/// timestamp stays local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub command: String,
    pub value: ReadingValue,
    #[serde(skip)]
    pub timestamp_us: u64,
}

impl Reading {
    pub fn new(command: ObdCommand, value: ReadingValue) -> Self {
        Self {
            command: command.name().to_string(),
            value,
            timestamp_us: now_us(),
        }
    }
}

fn now_us() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_micros() as u64)
        .unwrap_or(0)
}

/// Diagnostic backend abstraction
///
/// `query` returns `Ok(None)` when the device has no data for the
/// command this cycle (not an error, the reading is simply suppressed).
/// An `Err` means the physical link is gone and the supervisor should
/// restart it.
pub trait ObdBackend: Send {
    fn query(&mut self, command: ObdCommand) -> Result<Option<ReadingValue>>;
}

/// Create a diagnostic backend based on configuration
///
/// The port value `"sim"` selects the built-in simulated vehicle; any
/// other value is opened as an ELM327 serial port.
pub fn create_backend(config: &HardwareConfig) -> Result<Box<dyn ObdBackend>> {
    match config.obd_port.as_str() {
        "sim" => {
            log::info!("Using simulated vehicle backend");
            Ok(Box::new(SimVehicle::new()))
        }
        path => {
            let transport = SerialTransport::open(path, config.baud_rate)?;
            Ok(Box::new(Elm327::connect(Box::new(transport))?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_wire_shape_scalar() {
        let reading = Reading::new(ObdCommand::Rpm, ReadingValue::Scalar(3000.0));
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(json, r#"{"command":"RPM","value":3000.0}"#);
    }

    #[test]
    fn test_reading_wire_shape_dtc_list() {
        let reading = Reading::new(
            ObdCommand::CurrentDtc,
            ReadingValue::Codes(vec!["P0133".to_string(), "P0420".to_string()]),
        );
        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(
            json,
            r#"{"command":"GET_CURRENT_DTC","value":["P0133","P0420"]}"#
        );
    }
}
