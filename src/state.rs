//! Shared runtime state crossing thread boundaries
//!
//! Three records are shared between the network, polling, and render
//! threads: the active display mode, the latest throttle ratio, and the
//! per-link connection status. The first two are written from one thread
//! and read from another, so both are kept in single atomic words: a
//! reader can never observe a mode/generation pair that never coexisted.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Display modes selectable from the remote endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Mode {
    Off = 0,
    Chase = 1,
    Police = 2,
    Hazard = 3,
    PitCrew = 4,
    Acceleration = 5,
}

impl Mode {
    /// Parse a single-token command frame. Unknown tokens yield `None`
    /// and must be ignored by the caller.
    pub fn from_token(token: &str) -> Option<Mode> {
        match token {
            "off" => Some(Mode::Off),
            "chase" => Some(Mode::Chase),
            "police" => Some(Mode::Police),
            "hazard" => Some(Mode::Hazard),
            "pit" => Some(Mode::PitCrew),
            "acceleration" => Some(Mode::Acceleration),
            _ => None,
        }
    }

    /// Wire token for this mode
    pub fn token(&self) -> &'static str {
        match self {
            Mode::Off => "off",
            Mode::Chase => "chase",
            Mode::Police => "police",
            Mode::Hazard => "hazard",
            Mode::PitCrew => "pit",
            Mode::Acceleration => "acceleration",
        }
    }

    fn from_bits(bits: u8) -> Mode {
        match bits {
            1 => Mode::Chase,
            2 => Mode::Police,
            3 => Mode::Hazard,
            4 => Mode::PitCrew,
            5 => Mode::Acceleration,
            _ => Mode::Off,
        }
    }
}

/// Instantaneous {mode, generation} pair read from [`ModeState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeSnapshot {
    pub mode: Mode,
    pub generation: u64,
}

/// Process-wide record of the active display mode
///
/// Mode and generation are packed into one `AtomicU64` (mode in the low
/// 3 bits, generation above) so writes are a single store and reads are
/// a single load. Only the command channel writes; the render thread
/// reads. The generation increments on every accepted command, including
/// re-selection of the current mode, which is what lets a running
/// animation handler detect that it has been superseded.
pub struct ModeState {
    packed: AtomicU64,
}

const MODE_BITS: u64 = 0x7;
const GENERATION_SHIFT: u32 = 3;

impl ModeState {
    /// Create with an initial mode at generation 0
    pub fn new(initial: Mode) -> Self {
        Self {
            packed: AtomicU64::new(initial as u64),
        }
    }

    /// Atomic paired read of {mode, generation}
    pub fn snapshot(&self) -> ModeSnapshot {
        let packed = self.packed.load(Ordering::Acquire);
        ModeSnapshot {
            mode: Mode::from_bits((packed & MODE_BITS) as u8),
            generation: packed >> GENERATION_SHIFT,
        }
    }

    /// Accept a mode command: set the mode and bump the generation.
    ///
    /// Returns the new generation. Single-writer: only the command
    /// channel calls this, so load+store needs no compare-and-swap.
    pub fn select(&self, mode: Mode) -> u64 {
        let packed = self.packed.load(Ordering::Acquire);
        let generation = (packed >> GENERATION_SHIFT) + 1;
        self.packed
            .store(generation << GENERATION_SHIFT | mode as u64, Ordering::Release);
        generation
    }
}

/// Latest observed throttle-position ratio in [0, 1]
///
/// Written by the telemetry source whenever a THROTTLE_POS reading is
/// produced, read by the acceleration render handler. Stored as f32 bits
/// in an `AtomicU32` so the hand-off is a single word.
pub struct ThrottleCache {
    bits: AtomicU32,
}

impl ThrottleCache {
    pub fn new() -> Self {
        Self {
            bits: AtomicU32::new(0f32.to_bits()),
        }
    }

    /// Store a ratio, clamped to [0, 1]
    pub fn store(&self, ratio: f32) {
        let clamped = if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.bits.store(clamped.to_bits(), Ordering::Release);
    }

    /// Load the latest ratio
    pub fn load(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }
}

impl Default for ThrottleCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection state of a supervised link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

/// Per-link status record (sensor link, network link)
///
/// Owned by the thread supervising the link; transitions are logged so
/// operators can follow reconnect behavior from the journal.
pub struct LinkStatus {
    name: &'static str,
    pub state: LinkState,
    pub retry_count: u32,
}

impl LinkStatus {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: LinkState::Disconnected,
            retry_count: 0,
        }
    }

    /// Record a state transition, logging it
    pub fn transition(&mut self, to: LinkState) {
        if self.state == to {
            return;
        }
        match to {
            LinkState::Connected => {
                log::info!("{} link connected (after {} retries)", self.name, self.retry_count);
                self.retry_count = 0;
            }
            LinkState::Connecting => {
                log::debug!("{} link connecting...", self.name);
            }
            LinkState::Disconnected => {
                log::warn!("{} link disconnected", self.name);
            }
        }
        self.state = to;
    }

    /// Record a failed connection attempt
    pub fn record_retry(&mut self) {
        self.retry_count += 1;
        log::debug!("{} link retry #{}", self.name, self.retry_count);
    }
}
