//! Per-mode animation steps
//!
//! One dispatch table for all display modes: every mode is a step
//! function that paints the next frame from a step counter and returns
//! its cadence. Handlers hold no loops of their own; the engine drives
//! steps and checks for preemption between them, so any mode hands
//! control back within one animation step.

use super::color::{color_ramp, Rgb, AMBER, BLACK, BLUE, RED, WHITE};
use super::frame::FrameBuffer;
use crate::state::Mode;
use rand::Rng;
use std::time::Duration;

/// Chase tail length in pixels
const CHASE_TAIL: usize = 4;

/// Police strobe flashes per side before switching
const POLICE_FLASHES: u64 = 5;

/// Pit-crew color block width
const PIT_BLOCK: usize = 3;

const OFF_IDLE: Duration = Duration::from_millis(500);
const CHASE_STEP: Duration = Duration::from_millis(50);
const POLICE_FLASH: Duration = Duration::from_millis(30);
const HAZARD_FLASH: Duration = Duration::from_millis(300);
const PIT_TOGGLE: Duration = Duration::from_millis(500);
const ACCEL_STEP: Duration = Duration::from_millis(50);

/// Seconds per acceleration step, for phase length math
const ACCEL_STEP_SECS: f32 = 0.05;

/// Scratch state for the running animation handler
///
/// Reset whenever the engine dispatches a new handler, so every mode
/// starts from its first step.
pub struct AnimState {
    step: u64,
    accel: AccelSim,
}

impl AnimState {
    pub fn new() -> Self {
        Self {
            step: 0,
            accel: AccelSim::new(),
        }
    }

    pub fn reset(&mut self) {
        self.step = 0;
        self.accel = AccelSim::new();
    }
}

impl Default for AnimState {
    fn default() -> Self {
        Self::new()
    }
}

/// Paint the next frame for `mode` and return the step cadence
///
/// `live_ratio` is the throttle cache value when the acceleration bar
/// runs from live telemetry, or `None` to use the internal simulator.
pub fn render_step(
    mode: Mode,
    state: &mut AnimState,
    frame: &mut FrameBuffer,
    live_ratio: Option<f32>,
) -> Duration {
    let cadence = match mode {
        Mode::Off => off_step(frame),
        Mode::Chase => chase_step(state.step, frame),
        Mode::Police => police_step(state.step, frame),
        Mode::Hazard => hazard_step(state.step, frame),
        Mode::PitCrew => pit_step(state.step, frame),
        Mode::Acceleration => {
            let ratio = match live_ratio {
                Some(r) => r.clamp(0.0, 1.0),
                None => state.accel.step(),
            };
            accel_step(ratio, frame)
        }
    };
    state.step += 1;
    cadence
}

fn off_step(frame: &mut FrameBuffer) -> Duration {
    frame.clear();
    OFF_IDLE
}

/// A colored dot with a fading tail sweeps end to end; once the dot
/// runs past the strip the tail follows it off without wrapping.
fn chase_step(step: u64, frame: &mut FrameBuffer) -> Duration {
    let len = frame.len();
    let sweep = (len + CHASE_TAIL) as u64;
    let pos = (step % sweep.max(1)) as i64;

    for j in 0..len {
        let distance = pos - j as i64;
        if (0..CHASE_TAIL as i64).contains(&distance) {
            let brightness =
                (255.0 * (1.0 - distance as f32 / CHASE_TAIL as f32)) as u8;
            frame.set(j, Rgb::new(0, 0, brightness));
        } else {
            frame.set(j, BLACK);
        }
    }
    CHASE_STEP
}

/// Five red strobes on the left half alternated with all-off, then five
/// blue strobes on the right half, repeating.
fn police_step(step: u64, frame: &mut FrameBuffer) -> Duration {
    let len = frame.len();
    let half = len / 2;
    let phase = step % (POLICE_FLASHES * 4);
    let blue_side = phase >= POLICE_FLASHES * 2;
    let lit = phase % 2 == 0;

    frame.clear();
    if lit {
        if blue_side {
            for i in half..len {
                frame.set(i, BLUE);
            }
        } else {
            for i in 0..half {
                frame.set(i, RED);
            }
        }
    }
    POLICE_FLASH
}

fn hazard_step(step: u64, frame: &mut FrameBuffer) -> Duration {
    if step % 2 == 0 {
        frame.fill(AMBER);
    } else {
        frame.clear();
    }
    HAZARD_FLASH
}

/// Blocks of three pixels alternate red/white; parity flips each tick
fn pit_step(step: u64, frame: &mut FrameBuffer) -> Duration {
    let even_blocks_red = step % 2 == 0;
    for i in 0..frame.len() {
        let even_block = (i / PIT_BLOCK) % 2 == 0;
        let color = if even_block == even_blocks_red {
            RED
        } else {
            WHITE
        };
        frame.set(i, color);
    }
    PIT_TOGGLE
}

/// Bar graph: lit pixel count proportional to the ratio, colored by the
/// green→red ramp
fn accel_step(ratio: f32, frame: &mut FrameBuffer) -> Duration {
    let lit = (ratio * frame.len() as f32) as usize;
    let color = color_ramp(ratio);
    for i in 0..frame.len() {
        frame.set(i, if i < lit { color } else { BLACK });
    }
    ACCEL_STEP
}

/// Smoothed random-walk throttle simulator
///
/// Mirrors observed driving: each phase picks a target ratio (higher
/// when accelerating, lower when braking) and glides there over a
/// random 1.5–2.0 s, pauses briefly, then may flip direction with
/// probability 0.4.
pub struct AccelSim {
    ratio: f32,
    accelerating: bool,
    steps_left: u32,
    delta: f32,
    pause_steps: u32,
}

impl AccelSim {
    pub fn new() -> Self {
        Self {
            ratio: 1.0,
            accelerating: true,
            steps_left: 0,
            delta: 0.0,
            pause_steps: 0,
        }
    }

    /// Advance one 50 ms step and return the current ratio
    pub fn step(&mut self) -> f32 {
        if self.pause_steps > 0 {
            self.pause_steps -= 1;
            return self.ratio;
        }

        if self.steps_left == 0 {
            self.begin_phase();
        }

        self.ratio = (self.ratio + self.delta).clamp(0.0, 1.0);
        self.steps_left -= 1;

        if self.steps_left == 0 {
            let mut rng = rand::rng();
            if rng.random_bool(0.4) {
                self.accelerating = !self.accelerating;
            }
            // 0.2–0.5 s pause before the next phase
            self.pause_steps = rng.random_range(4..=10);
        }

        self.ratio
    }

    fn begin_phase(&mut self) {
        let mut rng = rand::rng();
        let target: f32 = if self.accelerating {
            rng.random_range(0.3..1.0)
        } else {
            rng.random_range(0.0..0.7)
        };
        let duration: f32 = rng.random_range(1.5..2.0);
        let steps = (duration / ACCEL_STEP_SECS) as u32;
        self.steps_left = steps.max(1);
        self.delta = (target - self.ratio) / self.steps_left as f32;
    }
}

impl Default for AccelSim {
    fn default() -> Self {
        Self::new()
    }
}
