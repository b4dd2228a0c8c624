//! Daemon orchestration
//!
//! Wires the three long-lived threads together: the sensor link polls
//! the diagnostic adapter, the network link relays readings and applies
//! inbound mode commands, and the display engine renders the active
//! mode. Each link supervises itself with a fixed-delay retry loop; the
//! display engine needs no supervision because it only touches local
//! state.

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::led::engine::{DisplayEngine, RatioSource};
use crate::led::strip::{self, SharedStrip};
use crate::net::NetLink;
use crate::obd::{self, ObdCommand, Reading, TelemetrySource};
use crate::state::{LinkState, LinkStatus, Mode, ModeState, ThrottleCache};
use crossbeam_channel::bounded;
use log::{info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Capacity of the reading hand-off channel. Deep enough to ride out a
/// brief relay stall, shallow enough that stale readings age out fast.
const READING_CHANNEL_CAPACITY: usize = 64;

/// Granularity of supervisor sleeps, bounds shutdown latency
const SLEEP_SLICE: Duration = Duration::from_millis(100);

/// Top-level daemon: owns the shared state and the worker threads
pub struct Supervisor {
    config: AppConfig,
    mode_state: Arc<ModeState>,
    throttle: Arc<ThrottleCache>,
    strip: SharedStrip,
    running: Arc<AtomicBool>,
}

impl Supervisor {
    pub fn new(config: AppConfig, running: Arc<AtomicBool>) -> Result<Self> {
        let initial_mode = Mode::from_token(&config.display.initial_mode).ok_or_else(|| {
            Error::InvalidParameter(format!(
                "unknown initial mode: {:?}",
                config.display.initial_mode
            ))
        })?;

        let strip = strip::create_strip(&config.strip)?;

        Ok(Self {
            config,
            mode_state: Arc::new(ModeState::new(initial_mode)),
            throttle: Arc::new(ThrottleCache::new()),
            strip,
            running,
        })
    }

    /// Start all threads and block until shutdown
    pub fn run(&mut self) -> Result<()> {
        let commands = parse_watch_list(&self.config.hardware.commands)?;
        let ratio_source = parse_ratio_source(&self.config.display.accel_source)?;

        let (reading_tx, reading_rx) = bounded::<Reading>(READING_CHANNEL_CAPACITY);

        let sensor = self.start_sensor_link(commands, reading_tx)?;
        let network = self.start_network_link(reading_rx)?;
        let display = self.start_display(ratio_source)?;

        info!(
            "pitwall running: adapter {} -> endpoint {} ({} pixels)",
            self.config.hardware.obd_port, self.config.network.endpoint, self.config.strip.led_count
        );

        while self.running.load(Ordering::Relaxed) {
            thread::sleep(SLEEP_SLICE);
        }

        info!("Shutting down...");
        for (name, handle) in [("sensor", sensor), ("network", network), ("display", display)] {
            if handle.join().is_err() {
                warn!("{} thread panicked during shutdown", name);
            }
        }

        // The display engine already blanks on exit; this covers the
        // case where it died before shutdown
        if let Err(e) = strip::blank(&self.strip, self.config.strip.led_count) {
            warn!("Failed to blank strip on exit: {}", e);
        }
        info!("Shutdown complete");
        Ok(())
    }

    /// Sensor link: open the adapter, poll until it fails, wait, retry.
    /// The retry loop runs forever; a missing adapter at boot is the
    /// normal case when the daemon starts before the car does.
    fn start_sensor_link(
        &self,
        commands: Vec<ObdCommand>,
        reading_tx: crossbeam_channel::Sender<Reading>,
    ) -> Result<JoinHandle<()>> {
        let hardware = self.config.hardware.clone();
        let poll_interval = Duration::from_millis(hardware.poll_interval_ms);
        let retry_delay = Duration::from_secs(hardware.retry_delay_secs);
        let throttle = Arc::clone(&self.throttle);
        let running = Arc::clone(&self.running);

        thread::Builder::new()
            .name("obd-link".to_string())
            .spawn(move || {
                let mut status = LinkStatus::new("sensor");
                while running.load(Ordering::Relaxed) {
                    status.transition(LinkState::Connecting);
                    match obd::create_backend(&hardware) {
                        Ok(backend) => {
                            status.transition(LinkState::Connected);
                            let mut source = TelemetrySource::new(
                                backend,
                                commands.clone(),
                                poll_interval,
                                reading_tx.clone(),
                                Arc::clone(&throttle),
                                Arc::clone(&running),
                            );
                            match source.run() {
                                Ok(()) => break, // clean shutdown
                                Err(e) => warn!("Sensor link lost: {}", e),
                            }
                        }
                        Err(e) => {
                            warn!("Failed to open adapter: {}", e);
                            status.record_retry();
                        }
                    }
                    status.transition(LinkState::Disconnected);
                    sleep_sliced(retry_delay, &running);
                }
                info!("Sensor link stopped");
            })
            .map_err(|e| Error::Other(format!("Failed to spawn sensor link: {}", e)))
    }

    fn start_network_link(
        &self,
        reading_rx: crossbeam_channel::Receiver<Reading>,
    ) -> Result<JoinHandle<()>> {
        let mut link = NetLink::new(
            self.config.network.endpoint.clone(),
            Duration::from_secs(self.config.network.retry_delay_secs),
            reading_rx,
            Arc::clone(&self.mode_state),
            Arc::clone(&self.strip),
            self.config.strip.led_count,
            Arc::clone(&self.running),
        );
        thread::Builder::new()
            .name("net-link".to_string())
            .spawn(move || link.run())
            .map_err(|e| Error::Other(format!("Failed to spawn network link: {}", e)))
    }

    fn start_display(&self, ratio_source: RatioSource) -> Result<JoinHandle<()>> {
        let mut engine = DisplayEngine::new(
            Arc::clone(&self.mode_state),
            Arc::clone(&self.throttle),
            Arc::clone(&self.strip),
            self.config.strip.led_count,
            ratio_source,
            Arc::clone(&self.running),
        );
        thread::Builder::new()
            .name("display".to_string())
            .spawn(move || engine.run())
            .map_err(|e| Error::Other(format!("Failed to spawn display engine: {}", e)))
    }
}

/// Resolve configured command names against the known command set
fn parse_watch_list(names: &[String]) -> Result<Vec<ObdCommand>> {
    let mut commands = Vec::with_capacity(names.len());
    for name in names {
        match ObdCommand::from_name(name) {
            Some(command) => commands.push(command),
            None => warn!("Ignoring unknown command in watch list: {:?}", name),
        }
    }
    if commands.is_empty() {
        return Err(Error::InvalidParameter(
            "watch list contains no known commands".to_string(),
        ));
    }
    Ok(commands)
}

fn parse_ratio_source(source: &str) -> Result<RatioSource> {
    match source {
        "throttle" => Ok(RatioSource::Throttle),
        "simulated" => Ok(RatioSource::Simulated),
        other => Err(Error::InvalidParameter(format!(
            "unknown accel source: {:?}",
            other
        ))),
    }
}

/// Sleep `delay` in slices, returning early on shutdown
fn sleep_sliced(delay: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + delay;
    while running.load(Ordering::Relaxed) && Instant::now() < deadline {
        thread::sleep(SLEEP_SLICE.min(deadline.saturating_duration_since(Instant::now())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StripConfig;

    #[test]
    fn test_parse_watch_list_resolves_known_names() {
        let names = vec!["RPM".to_string(), "SPEED".to_string()];
        let commands = parse_watch_list(&names).unwrap();
        assert_eq!(commands, vec![ObdCommand::Rpm, ObdCommand::Speed]);
    }

    #[test]
    fn test_parse_watch_list_skips_unknown_names() {
        let names = vec!["RPM".to_string(), "FLUX_CAPACITOR".to_string()];
        let commands = parse_watch_list(&names).unwrap();
        assert_eq!(commands, vec![ObdCommand::Rpm]);
    }

    #[test]
    fn test_parse_watch_list_rejects_empty_result() {
        let names = vec!["FLUX_CAPACITOR".to_string()];
        assert!(parse_watch_list(&names).is_err());
    }

    #[test]
    fn test_parse_ratio_source() {
        assert_eq!(parse_ratio_source("throttle").unwrap(), RatioSource::Throttle);
        assert_eq!(parse_ratio_source("simulated").unwrap(), RatioSource::Simulated);
        assert!(parse_ratio_source("psychic").is_err());
    }

    #[test]
    fn test_rejects_unknown_initial_mode() {
        let mut config = AppConfig::default();
        config.display.initial_mode = "rainbow".to_string();
        let running = Arc::new(AtomicBool::new(true));
        assert!(Supervisor::new(config, running).is_err());
    }

    #[test]
    fn test_rejects_unknown_strip_driver() {
        let mut config = AppConfig::default();
        config.strip = StripConfig {
            led_count: 8,
            driver: "quantum".to_string(),
        };
        let running = Arc::new(AtomicBool::new(true));
        assert!(Supervisor::new(config, running).is_err());
    }
}
