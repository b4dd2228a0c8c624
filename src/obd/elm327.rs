//! ELM327 adapter backend
//!
//! Drives the ASCII request/response protocol of an ELM327-compatible
//! adapter over a [`Transport`]. Each request is a command string
//! terminated by CR; the adapter answers with one or more lines and a
//! `>` prompt when it is ready for the next command.

use super::commands::ObdCommand;
use super::{ObdBackend, ReadingValue};
use crate::error::{Error, Result};
use crate::transport::Transport;
use std::time::{Duration, Instant};

/// Budget for the adapter reset banner (ATZ takes up to a second)
const RESET_TIMEOUT: Duration = Duration::from_millis(1500);

/// Budget for a single query round trip
const QUERY_TIMEOUT: Duration = Duration::from_millis(500);

/// Poll interval while waiting for the prompt character
const READ_POLL: Duration = Duration::from_millis(5);

/// Cap on accumulated response bytes; real replies are a few lines,
/// anything larger is a misbehaving adapter
const MAX_RESPONSE_LEN: usize = 4096;

/// ELM327 backend over a serial (or mock) transport
pub struct Elm327 {
    transport: Box<dyn Transport>,
}

impl Elm327 {
    /// Reset the adapter and configure it for polling
    ///
    /// Fails with [`Error::DeviceDisconnected`] when the adapter never
    /// answers the reset, so the supervisor can retry the whole link.
    pub fn connect(transport: Box<dyn Transport>) -> Result<Self> {
        let mut link = Self { transport };

        link.send("ATZ")?;
        match link.read_until_prompt(RESET_TIMEOUT)? {
            Some(banner) => log::info!("ELM327 reset: {}", banner.trim()),
            None => {
                log::warn!("No response to ATZ reset");
                return Err(Error::DeviceDisconnected);
            }
        }

        // Echo off, linefeeds off, headers off. Replies to these are
        // informational only ("OK"), so failures are not fatal.
        for setup in ["ATE0", "ATL0", "ATH0"] {
            link.send(setup)?;
            if link.read_until_prompt(QUERY_TIMEOUT)?.is_none() {
                log::debug!("No reply to {} during setup", setup);
            }
        }

        Ok(link)
    }

    fn send(&mut self, command: &str) -> Result<()> {
        let mut frame = command.as_bytes().to_vec();
        frame.push(b'\r');
        self.transport.write(&frame)?;
        Ok(())
    }

    /// Accumulate response bytes until the `>` prompt or the budget runs
    /// out. `Ok(None)` means the adapter produced nothing at all.
    ///
    /// Reads one byte at a time so nothing past the prompt is consumed;
    /// at serial baud rates this costs nothing.
    fn read_until_prompt(&mut self, budget: Duration) -> Result<Option<String>> {
        let deadline = Instant::now() + budget;
        let mut raw: Vec<u8> = Vec::with_capacity(64);
        let mut byte = [0u8; 1];

        loop {
            // Deadline applies even when the adapter streams data
            // continuously without ever sending a prompt
            if Instant::now() >= deadline {
                if raw.is_empty() {
                    return Ok(None);
                }
                break;
            }
            let n = self.transport.read(&mut byte)?;
            if n > 0 {
                if byte[0] == b'>' {
                    break;
                }
                if raw.len() < MAX_RESPONSE_LEN {
                    raw.push(byte[0]);
                }
                continue;
            }
            std::thread::sleep(READ_POLL);
        }

        let text: String = String::from_utf8_lossy(&raw)
            .chars()
            .map(|c| if c == '\r' { '\n' } else { c })
            .collect();
        Ok(Some(text.trim().to_string()))
    }
}

impl ObdBackend for Elm327 {
    fn query(&mut self, command: ObdCommand) -> Result<Option<ReadingValue>> {
        self.send(command.request())?;
        match self.read_until_prompt(QUERY_TIMEOUT)? {
            // Silent adapter this cycle: suppressed, not an error
            None => Ok(None),
            Some(text) => Ok(command.decode(&text)),
        }
    }
}
