//! Network link to the remote endpoint
//!
//! One long-lived TCP connection carries both directions: the writer
//! half drains the reading channel outbound, a receiver thread parses
//! inbound mode commands. The link reconnects forever on a fixed delay;
//! while disconnected the reading channel keeps draining and readings
//! are dropped, so the telemetry producer never blocks on network state.

use super::wire;
use crate::error::{Error, Result};
use crate::led::strip::{self, SharedStrip};
use crate::obd::Reading;
use crate::state::{LinkState, LinkStatus, ModeState};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Channel poll granularity; bounds reaction time to shutdown
const RECV_SLICE: Duration = Duration::from_millis(100);

/// Read timeout on the inbound half, so the receiver thread can check
/// its flags between frames
const READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Supervised client connection to the remote endpoint
pub struct NetLink {
    endpoint: String,
    retry_delay: Duration,
    readings: Receiver<Reading>,
    mode_state: Arc<ModeState>,
    strip: SharedStrip,
    led_count: usize,
    running: Arc<AtomicBool>,
    status: LinkStatus,
}

impl NetLink {
    pub fn new(
        endpoint: String,
        retry_delay: Duration,
        readings: Receiver<Reading>,
        mode_state: Arc<ModeState>,
        strip: SharedStrip,
        led_count: usize,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            endpoint,
            retry_delay,
            readings,
            mode_state,
            strip,
            led_count,
            running,
            status: LinkStatus::new("network"),
        }
    }

    /// Run the connect/relay/reconnect loop until shutdown
    pub fn run(&mut self) {
        while self.running.load(Ordering::Relaxed) {
            self.status.transition(LinkState::Connecting);
            match TcpStream::connect(&self.endpoint) {
                Ok(stream) => {
                    self.status.transition(LinkState::Connected);
                    self.purge_stale_readings();
                    if let Err(e) = self.run_connected(stream) {
                        log::warn!("Network link failed: {}", e);
                    }
                    self.status.transition(LinkState::Disconnected);
                }
                Err(e) => {
                    log::warn!("Connect to {} failed: {}", self.endpoint, e);
                    self.status.record_retry();
                    self.status.transition(LinkState::Disconnected);
                }
            }

            // Fixed delay before the next attempt; keep draining so
            // readings produced meanwhile are dropped, not buffered
            self.drain_while_disconnected(self.retry_delay);
        }
        log::info!("Network link stopped");
    }

    /// Relay readings until the connection or the daemon dies
    fn run_connected(&mut self, stream: TcpStream) -> Result<()> {
        let reader_stream = stream.try_clone()?;
        let conn_alive = Arc::new(AtomicBool::new(true));

        let receiver = thread::Builder::new()
            .name("cmd-receiver".to_string())
            .spawn({
                let mode_state = Arc::clone(&self.mode_state);
                let strip = Arc::clone(&self.strip);
                let led_count = self.led_count;
                let running = Arc::clone(&self.running);
                let conn_alive = Arc::clone(&conn_alive);
                move || {
                    if let Err(e) = receive_commands(
                        reader_stream,
                        &mode_state,
                        &strip,
                        led_count,
                        &running,
                        &conn_alive,
                    ) {
                        log::warn!("Command receiver failed: {}", e);
                    }
                }
            })
            .map_err(|e| Error::Other(format!("Failed to spawn command receiver: {}", e)))?;

        let mut writer = stream;
        let result = loop {
            if !self.running.load(Ordering::Relaxed) || !conn_alive.load(Ordering::Relaxed) {
                break Ok(());
            }

            match self.readings.recv_timeout(RECV_SLICE) {
                Ok(reading) => {
                    let payload = match wire::encode_reading(&reading) {
                        Ok(payload) => payload,
                        Err(e) => {
                            log::error!("Failed to encode {}: {}", reading.command, e);
                            continue;
                        }
                    };
                    if let Err(e) = wire::write_frame(&mut writer, &payload) {
                        break Err(e);
                    }
                    log::trace!("Relayed {}", reading.command);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break Ok(()),
            }
        };

        // Tear down both halves; the receiver thread wakes on its read
        // timeout and sees the cleared flag
        conn_alive.store(false, Ordering::Relaxed);
        let _ = writer.shutdown(Shutdown::Both);
        let _ = receiver.join();
        result
    }

    /// Discard everything queued while the link was down, so the relay
    /// starts from readings produced after the connection came up
    fn purge_stale_readings(&self) {
        let stale = self.readings.try_iter().count();
        if stale > 0 {
            log::debug!("Discarded {} readings queued before connect", stale);
        }
    }

    /// Drop readings for `delay`, keeping the producer unblocked
    fn drain_while_disconnected(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while self.running.load(Ordering::Relaxed) && Instant::now() < deadline {
            match self.readings.recv_timeout(RECV_SLICE) {
                Ok(reading) => {
                    log::debug!("Dropping {} while disconnected", reading.command);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}

/// Inbound half: parse command frames, publish mode changes
fn receive_commands(
    mut stream: TcpStream,
    mode_state: &ModeState,
    strip: &SharedStrip,
    led_count: usize,
    running: &AtomicBool,
    conn_alive: &AtomicBool,
) -> Result<()> {
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    let mut buf = Vec::with_capacity(64);

    loop {
        if !running.load(Ordering::Relaxed) || !conn_alive.load(Ordering::Relaxed) {
            return Ok(());
        }

        match wire::read_frame(&mut stream, &mut buf) {
            Ok(Some(payload)) => handle_command_frame(payload, mode_state, strip, led_count),
            Ok(None) => {} // timeout, loop to check flags
            Err(e) => {
                conn_alive.store(false, Ordering::Relaxed);
                if let Error::Io(ref io_err) = e {
                    if io_err.kind() == std::io::ErrorKind::UnexpectedEof
                        || io_err.kind() == std::io::ErrorKind::ConnectionReset
                    {
                        log::info!("Remote endpoint closed the connection");
                        return Ok(());
                    }
                }
                return Err(e);
            }
        }
    }
}

/// Apply one inbound frame
///
/// Accepted tokens bump the mode generation and synchronously blank the
/// strip, so the next render cycle starts from a known-blank state.
/// Everything else is logged and ignored; it never touches the
/// generation.
pub fn handle_command_frame(
    payload: &[u8],
    mode_state: &ModeState,
    strip: &SharedStrip,
    led_count: usize,
) {
    match wire::parse_command(payload) {
        Some(mode) => {
            let generation = mode_state.select(mode);
            if let Err(e) = strip::blank(strip, led_count) {
                log::error!("Failed to blank strip on mode switch: {}", e);
            }
            log::info!("Mode command accepted: {} (generation {})", mode.token(), generation);
        }
        None => {
            log::warn!(
                "Ignoring unrecognized command frame: {:?}",
                String::from_utf8_lossy(payload)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::color::BLACK;
    use crate::led::strip::MockStrip;
    use crate::obd::{ObdCommand, ReadingValue};
    use crate::state::Mode;
    use crossbeam_channel::bounded;
    use std::io::Read;
    use std::net::TcpListener;

    const LED_COUNT: usize = 8;

    struct LinkHarness {
        readings: crossbeam_channel::Sender<Reading>,
        mode_state: Arc<ModeState>,
        mock: MockStrip,
        running: Arc<AtomicBool>,
        handle: thread::JoinHandle<()>,
    }

    fn start_link(endpoint: String, retry_delay: Duration) -> LinkHarness {
        let (tx, rx) = bounded(16);
        let mode_state = Arc::new(ModeState::new(Mode::Chase));
        let mock = MockStrip::new();
        let running = Arc::new(AtomicBool::new(true));

        let mut link = NetLink::new(
            endpoint,
            retry_delay,
            rx,
            Arc::clone(&mode_state),
            mock.shared(),
            LED_COUNT,
            Arc::clone(&running),
        );
        let handle = thread::spawn(move || link.run());

        LinkHarness {
            readings: tx,
            mode_state,
            mock,
            running,
            handle,
        }
    }

    impl LinkHarness {
        fn stop(self) {
            self.running.store(false, Ordering::Relaxed);
            self.handle.join().unwrap();
        }
    }

    fn read_one_frame(stream: &mut TcpStream) -> Vec<u8> {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).unwrap();
        let mut payload = vec![0u8; u32::from_be_bytes(len_buf) as usize];
        stream.read_exact(&mut payload).unwrap();
        payload
    }

    #[test]
    fn test_outbound_readings_framed_as_json() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let harness = start_link(endpoint, Duration::from_millis(100));

        let (mut server, _) = listener.accept().unwrap();
        harness
            .readings
            .send(Reading::new(ObdCommand::Rpm, ReadingValue::Scalar(3000.0)))
            .unwrap();

        let payload = read_one_frame(&mut server);
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"command":"RPM","value":3000.0}"#
        );
        harness.stop();
    }

    #[test]
    fn test_inbound_command_updates_mode_and_blanks() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();
        let harness = start_link(endpoint, Duration::from_millis(100));

        let (mut server, _) = listener.accept().unwrap();
        wire::write_frame(&mut server, b"police").unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while harness.mode_state.snapshot().mode != Mode::Police {
            assert!(Instant::now() < deadline, "mode never switched");
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(harness.mode_state.snapshot().generation, 1);
        assert_eq!(harness.mock.last_frame().unwrap(), vec![BLACK; LED_COUNT]);
        harness.stop();
    }

    #[test]
    fn test_garbage_frame_ignored() {
        let mode_state = ModeState::new(Mode::Chase);
        let mock = MockStrip::new();
        let strip = mock.shared();

        handle_command_frame(b"definitely-not-a-mode", &mode_state, &strip, LED_COUNT);

        assert_eq!(mode_state.snapshot().generation, 0);
        assert_eq!(mode_state.snapshot().mode, Mode::Chase);
        assert_eq!(mock.frame_count(), 0);
    }

    #[test]
    fn test_readings_queued_before_connect_are_purged() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = listener.local_addr().unwrap().to_string();

        let (tx, rx) = bounded(16);
        // Already in the channel before the link ever connects; these
        // must never reach the wire
        for value in [1111.0, 2222.0] {
            tx.send(Reading::new(ObdCommand::Rpm, ReadingValue::Scalar(value)))
                .unwrap();
        }

        let mode_state = Arc::new(ModeState::new(Mode::Chase));
        let mock = MockStrip::new();
        let running = Arc::new(AtomicBool::new(true));
        let mut link = NetLink::new(
            endpoint,
            Duration::from_millis(100),
            rx,
            Arc::clone(&mode_state),
            mock.shared(),
            LED_COUNT,
            Arc::clone(&running),
        );
        let handle = thread::spawn(move || link.run());

        let (mut server, _) = listener.accept().unwrap();
        // Let the link finish discarding the backlog before producing
        // the first post-connect reading
        thread::sleep(Duration::from_millis(200));

        tx.send(Reading::new(ObdCommand::Speed, ReadingValue::Scalar(60.0)))
            .unwrap();
        let payload = read_one_frame(&mut server);
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"command":"SPEED","value":60.0}"#
        );

        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
    }

    #[test]
    fn test_readings_dropped_while_disconnected() {
        // Reserve an address, then close the listener so connects fail
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let harness = start_link(addr.to_string(), Duration::from_millis(100));

        // Produced while disconnected: must be dropped, not buffered
        for value in [1.0, 2.0] {
            harness
                .readings
                .send(Reading::new(ObdCommand::Rpm, ReadingValue::Scalar(value)))
                .unwrap();
        }
        thread::sleep(Duration::from_millis(400));

        // Endpoint comes back on the same address
        let listener = TcpListener::bind(addr).unwrap();
        let (mut server, _) = listener.accept().unwrap();
        thread::sleep(Duration::from_millis(200));

        // Only readings produced after reconnect get relayed
        harness
            .readings
            .send(Reading::new(ObdCommand::Speed, ReadingValue::Scalar(60.0)))
            .unwrap();
        let payload = read_one_frame(&mut server);
        assert_eq!(
            String::from_utf8(payload).unwrap(),
            r#"{"command":"SPEED","value":60.0}"#
        );
        harness.stop();
    }
}
