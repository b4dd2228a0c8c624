//! pitwall - vehicle telemetry relay and light strip controller
//!
//! Runs on a small in-car computer. Polls an OBD-II diagnostic adapter,
//! relays readings to a remote endpoint over one persistent TCP
//! connection, and renders remotely selected animation modes on an
//! addressable light strip.
//!
//! Three threads, supervised by [`supervisor::Supervisor`]:
//! - the sensor link ([`obd::TelemetrySource`]) polls the adapter
//! - the network link ([`net::NetLink`]) relays readings out and applies
//!   mode commands in
//! - the display engine ([`led::DisplayEngine`]) renders the active mode
//!
//! Threads share three small records ([`state`]): the active mode with
//! its generation counter, the latest throttle ratio, and per-link
//! connection status. Every link reconnects forever on a fixed delay; a
//! missing car or endpoint never stops the daemon.

pub mod config;
pub mod error;
pub mod led;
pub mod net;
pub mod obd;
pub mod state;
pub mod supervisor;
pub mod transport;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use supervisor::Supervisor;
