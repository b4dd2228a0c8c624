//! Telemetry polling loop
//!
//! Polls the configured command set against the backend at a fixed
//! interval and pushes readings into a bounded channel. The loop never
//! touches the network: the relay consumes the channel on its own
//! thread, so a network stall can never delay polling.

use super::commands::ObdCommand;
use super::{ObdBackend, Reading, ReadingValue};
use crate::error::{Error, Result};
use crate::state::ThrottleCache;
use crossbeam_channel::{Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Granularity of the inter-cycle sleep, so shutdown stays responsive
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Periodic poller for the diagnostic backend
pub struct TelemetrySource {
    backend: Box<dyn ObdBackend>,
    commands: Vec<ObdCommand>,
    poll_interval: Duration,
    readings: Sender<Reading>,
    throttle: Arc<ThrottleCache>,
    running: Arc<AtomicBool>,
}

impl TelemetrySource {
    pub fn new(
        backend: Box<dyn ObdBackend>,
        commands: Vec<ObdCommand>,
        poll_interval: Duration,
        readings: Sender<Reading>,
        throttle: Arc<ThrottleCache>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            backend,
            commands,
            poll_interval,
            readings,
            throttle,
            running,
        }
    }

    /// Run the poll loop until shutdown or loss of the physical link
    ///
    /// Returns `Ok(())` on clean shutdown. Any backend failure is
    /// reported as [`Error::DeviceDisconnected`] so the supervisor
    /// restarts this link after its fixed delay.
    pub fn run(&mut self) -> Result<()> {
        log::info!(
            "Telemetry source started ({} commands every {:?})",
            self.commands.len(),
            self.poll_interval
        );

        loop {
            let cycle_start = Instant::now();

            for i in 0..self.commands.len() {
                if !self.running.load(Ordering::Relaxed) {
                    return Ok(());
                }
                let command = self.commands[i];
                match self.backend.query(command) {
                    Ok(Some(value)) => self.emit(command, value),
                    Ok(None) => {
                        // Null response this cycle: suppressed, no reading
                        log::trace!("{}: no data", command.name());
                    }
                    Err(e) => {
                        log::warn!("Backend failure on {}: {}", command.name(), e);
                        return Err(Error::DeviceDisconnected);
                    }
                }
            }

            // Pace the cycle, checking the shutdown flag in slices
            let elapsed = cycle_start.elapsed();
            if elapsed > self.poll_interval {
                log::debug!(
                    "Poll cycle overran: {:?} (target {:?})",
                    elapsed,
                    self.poll_interval
                );
            }
            let mut remaining = self.poll_interval.saturating_sub(elapsed);
            while !remaining.is_zero() {
                if !self.running.load(Ordering::Relaxed) {
                    return Ok(());
                }
                let slice = remaining.min(SLEEP_SLICE);
                std::thread::sleep(slice);
                remaining -= slice;
            }
        }
    }

    fn emit(&mut self, command: ObdCommand, value: ReadingValue) {
        // Throttle position feeds the acceleration display directly,
        // normalized from percent to [0, 1]
        if command == ObdCommand::ThrottlePos {
            if let ReadingValue::Scalar(pct) = value {
                self.throttle.store((pct / 100.0) as f32);
            }
        }

        let reading = Reading::new(command, value);
        match self.readings.try_send(reading) {
            Ok(()) => {}
            Err(TrySendError::Full(reading)) => {
                // Relay is stalled; best-effort delivery means we drop
                // rather than block the poll cycle
                log::debug!("Reading queue full, dropping {}", reading.command);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::debug!("Reading channel closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    /// Backend that replays a scripted sequence of query results
    struct ScriptedBackend {
        script: Vec<Result<Option<ReadingValue>>>,
    }

    impl ObdBackend for ScriptedBackend {
        fn query(&mut self, _command: ObdCommand) -> Result<Option<ReadingValue>> {
            if self.script.is_empty() {
                Ok(None)
            } else {
                self.script.remove(0)
            }
        }
    }

    fn source_with(
        script: Vec<Result<Option<ReadingValue>>>,
        commands: Vec<ObdCommand>,
        capacity: usize,
    ) -> (
        TelemetrySource,
        crossbeam_channel::Receiver<Reading>,
        Arc<ThrottleCache>,
        Arc<AtomicBool>,
    ) {
        let (tx, rx) = bounded(capacity);
        let throttle = Arc::new(ThrottleCache::new());
        let running = Arc::new(AtomicBool::new(true));
        let source = TelemetrySource::new(
            Box::new(ScriptedBackend { script }),
            commands,
            Duration::from_millis(1),
            tx,
            Arc::clone(&throttle),
            Arc::clone(&running),
        );
        (source, rx, throttle, running)
    }

    #[test]
    fn test_emits_readings_and_suppresses_nulls() {
        let script = vec![
            Ok(Some(ReadingValue::Scalar(3000.0))), // RPM
            Ok(None),                               // SPEED suppressed
            Err(Error::DeviceDisconnected),         // ends the run
        ];
        let (mut source, rx, _, _) =
            source_with(script, vec![ObdCommand::Rpm, ObdCommand::Speed], 16);

        let result = source.run();
        assert!(matches!(result, Err(Error::DeviceDisconnected)));

        let readings: Vec<Reading> = rx.try_iter().collect();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].command, "RPM");
        assert_eq!(readings[0].value, ReadingValue::Scalar(3000.0));
    }

    #[test]
    fn test_throttle_reading_updates_cache() {
        let script = vec![
            Ok(Some(ReadingValue::Scalar(55.0))),
            Err(Error::DeviceDisconnected),
        ];
        let (mut source, _rx, throttle, _) = source_with(script, vec![ObdCommand::ThrottlePos], 16);

        let _ = source.run();
        assert!((throttle.load() - 0.55).abs() < 1e-6);
    }

    #[test]
    fn test_full_queue_drops_instead_of_blocking() {
        let script = vec![
            Ok(Some(ReadingValue::Scalar(1.0))),
            Ok(Some(ReadingValue::Scalar(2.0))),
            Ok(Some(ReadingValue::Scalar(3.0))),
            Err(Error::DeviceDisconnected),
        ];
        // Capacity 1: the second and third readings must be dropped
        let (mut source, rx, _, _) = source_with(
            script,
            vec![ObdCommand::Rpm, ObdCommand::Rpm, ObdCommand::Rpm],
            1,
        );

        let result = source.run();
        assert!(result.is_err());

        let readings: Vec<Reading> = rx.try_iter().collect();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].value, ReadingValue::Scalar(1.0));
    }

    #[test]
    fn test_clean_shutdown_returns_ok() {
        let (mut source, _rx, _, running) =
            source_with(vec![], vec![ObdCommand::Rpm], 16);
        running.store(false, Ordering::Relaxed);
        assert!(source.run().is_ok());
    }
}
