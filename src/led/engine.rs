//! Display engine
//!
//! Owns the frame buffer and the render loop. Each iteration reads the
//! shared mode snapshot; when the generation moved since the running
//! handler was dispatched, the handler is cancelled (its scratch state
//! dropped), the strip is blanked, and the new mode's handler starts
//! under the new generation. Step sleeps are sliced so a mode switch is
//! picked up within 25 ms even in the middle of a slow cadence.

use super::frame::FrameBuffer;
use super::modes::{render_step, AnimState};
use super::strip::SharedStrip;
use crate::state::{Mode, ModeState, ThrottleCache};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on one sleep slice; keeps mode-switch latency well
/// under 100 ms even in the middle of a slow cadence
const SLEEP_SLICE: Duration = Duration::from_millis(25);

/// Ratio source for the acceleration handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatioSource {
    /// Live throttle position from the vehicle
    Throttle,
    /// Internal smoothed random walk
    Simulated,
}

/// Continuously renders frames for the active mode
pub struct DisplayEngine {
    mode_state: Arc<ModeState>,
    throttle: Arc<ThrottleCache>,
    strip: SharedStrip,
    frame: FrameBuffer,
    ratio_source: RatioSource,
    running: Arc<AtomicBool>,
}

impl DisplayEngine {
    pub fn new(
        mode_state: Arc<ModeState>,
        throttle: Arc<ThrottleCache>,
        strip: SharedStrip,
        led_count: usize,
        ratio_source: RatioSource,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            mode_state,
            throttle,
            strip,
            frame: FrameBuffer::new(led_count),
            ratio_source,
            running,
        }
    }

    /// Run the render loop until shutdown
    ///
    /// Always leaves the hardware blank on exit.
    pub fn run(&mut self) {
        log::info!(
            "Display engine started ({} pixels, ratio source {:?})",
            self.frame.len(),
            self.ratio_source
        );

        // Rendering state: the generation the current handler was
        // dispatched under, or None while idle
        let mut rendering: Option<(Mode, u64)> = None;
        let mut anim = AnimState::new();

        while self.running.load(Ordering::Relaxed) {
            let snap = self.mode_state.snapshot();

            let stale = match rendering {
                Some((_, generation)) => generation != snap.generation,
                None => true,
            };
            if stale {
                if let Some((old_mode, _)) = rendering {
                    log::info!(
                        "Preempting {} for {} (generation {})",
                        old_mode.token(),
                        snap.mode.token(),
                        snap.generation
                    );
                } else {
                    log::info!(
                        "Dispatching {} (generation {})",
                        snap.mode.token(),
                        snap.generation
                    );
                }
                // Known-blank start for the new handler: no bleed-through
                // from whatever the previous mode left on the strip
                self.frame.clear();
                self.flush();
                anim.reset();
                rendering = Some((snap.mode, snap.generation));
            }

            let live_ratio = match self.ratio_source {
                RatioSource::Throttle => Some(self.throttle.load()),
                RatioSource::Simulated => None,
            };

            let cadence = render_step(snap.mode, &mut anim, &mut self.frame, live_ratio);
            self.flush();

            self.sleep_step(cadence, snap.generation);
        }

        // Shutdown: never leave a half-painted animation on the strip
        self.frame.clear();
        self.flush();
        log::info!("Display engine stopped");
    }

    fn flush(&mut self) {
        if let Err(e) = self.strip.lock().show(self.frame.pixels()) {
            log::error!("Strip write failed: {}", e);
        }
    }

    /// Sleep one animation step, waking early on shutdown or when the
    /// generation moves
    fn sleep_step(&self, cadence: Duration, generation: u64) {
        let mut remaining = cadence;
        while !remaining.is_zero() {
            if !self.running.load(Ordering::Relaxed) {
                return;
            }
            if self.mode_state.snapshot().generation != generation {
                return;
            }
            let slice = remaining.min(SLEEP_SLICE);
            std::thread::sleep(slice);
            remaining -= slice;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::led::color::{AMBER, BLACK, BLUE, RED};
    use crate::led::strip::MockStrip;
    use std::thread;
    use std::time::Instant;

    const LED_COUNT: usize = 10;

    struct Harness {
        mode_state: Arc<ModeState>,
        mock: MockStrip,
        running: Arc<AtomicBool>,
        handle: thread::JoinHandle<()>,
    }

    fn start_engine(initial: Mode, source: RatioSource, throttle: f32) -> Harness {
        let mode_state = Arc::new(ModeState::new(initial));
        let cache = Arc::new(ThrottleCache::new());
        cache.store(throttle);
        let mock = MockStrip::new();
        let running = Arc::new(AtomicBool::new(true));

        let mut engine = DisplayEngine::new(
            Arc::clone(&mode_state),
            cache,
            mock.shared(),
            LED_COUNT,
            source,
            Arc::clone(&running),
        );
        let handle = thread::spawn(move || engine.run());

        Harness {
            mode_state,
            mock,
            running,
            handle,
        }
    }

    impl Harness {
        fn stop(self) {
            self.running.store(false, Ordering::Relaxed);
            self.handle.join().unwrap();
        }

        /// Wait until the most recent frame satisfies the predicate
        fn wait_for_frame<F: Fn(&[crate::led::color::Rgb]) -> bool>(
            &self,
            what: &str,
            predicate: F,
        ) {
            let deadline = Instant::now() + Duration::from_secs(2);
            loop {
                if let Some(frame) = self.mock.last_frame() {
                    if predicate(&frame) {
                        return;
                    }
                }
                assert!(Instant::now() < deadline, "timed out waiting for {}", what);
                thread::sleep(Duration::from_millis(5));
            }
        }
    }

    #[test]
    fn test_renders_initial_mode() {
        let harness = start_engine(Mode::Hazard, RatioSource::Throttle, 0.0);
        harness.wait_for_frame("amber flash", |f| f.iter().all(|&p| p == AMBER));
        harness.stop();
    }

    #[test]
    fn test_mode_switch_preempts_and_blanks() {
        let harness = start_engine(Mode::Police, RatioSource::Throttle, 0.0);
        harness.wait_for_frame("red flash", |f| f[..LED_COUNT / 2].iter().all(|&p| p == RED));

        let frames_before = harness.mock.frame_count();
        harness.mode_state.select(Mode::Hazard);
        harness.wait_for_frame("amber after switch", |f| f.iter().all(|&p| p == AMBER));

        // The first frame written after the switch is the blank
        let frames = harness.mock.frames();
        let post_switch = &frames[frames_before..];
        let first_amber = post_switch
            .iter()
            .position(|f| f.iter().all(|&p| p == AMBER))
            .unwrap();
        assert!(
            post_switch[..first_amber]
                .iter()
                .any(|f| f.iter().all(|&p| p == BLACK)),
            "no blank frame between police and hazard output"
        );
        harness.stop();
    }

    #[test]
    fn test_command_sequence_drives_three_transitions() {
        let harness = start_engine(Mode::Chase, RatioSource::Throttle, 0.0);
        harness.wait_for_frame("chase dot", |f| f.iter().any(|&p| p.b > 0));

        harness.mode_state.select(Mode::Police);
        harness.wait_for_frame("police", |f| {
            f[..LED_COUNT / 2].iter().all(|&p| p == RED)
                || f[LED_COUNT / 2..].iter().all(|&p| p == BLUE)
        });

        harness.mode_state.select(Mode::Hazard);
        harness.wait_for_frame("hazard", |f| f.iter().all(|&p| p == AMBER));

        harness.mode_state.select(Mode::Off);
        harness.wait_for_frame("off", |f| f.iter().all(|&p| p == BLACK));
        harness.stop();
    }

    #[test]
    fn test_reselection_restarts_handler() {
        let harness = start_engine(Mode::Chase, RatioSource::Throttle, 0.0);
        harness.wait_for_frame("chase running", |f| f.iter().any(|&p| p.b > 0));

        // Re-selecting the same mode bumps the generation, which must
        // blank and restart the sweep from pixel 0
        let frames_before = harness.mock.frame_count();
        harness.mode_state.select(Mode::Chase);
        harness.wait_for_frame("restarted dot at origin", |f| {
            f[0].b == 255 && f[1..].iter().all(|&p| p == BLACK)
        });
        assert!(harness.mock.frame_count() > frames_before);
        harness.stop();
    }

    #[test]
    fn test_live_throttle_drives_bar() {
        let harness = start_engine(Mode::Acceleration, RatioSource::Throttle, 0.5);
        harness.wait_for_frame("half bar", |f| {
            f[..LED_COUNT / 2].iter().all(|&p| p != BLACK)
                && f[LED_COUNT / 2..].iter().all(|&p| p == BLACK)
        });
        harness.stop();
    }

    #[test]
    fn test_shutdown_leaves_strip_blank() {
        let harness = start_engine(Mode::Hazard, RatioSource::Throttle, 0.0);
        harness.wait_for_frame("rendering", |f| f.iter().all(|&p| p == AMBER));

        let mock = harness.mock.clone();
        harness.stop();
        assert_eq!(mock.last_frame().unwrap(), vec![BLACK; LED_COUNT]);
    }
}
