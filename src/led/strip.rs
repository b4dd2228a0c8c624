//! Strip device abstraction
//!
//! The pixel-to-hardware write primitive lives behind [`StripDevice`]:
//! one call displays a complete frame. The daemon shares a single
//! device handle between the render thread and the command channel
//! (which blanks the strip on mode switches), so the handle is wrapped
//! in a mutex and only one writer touches the hardware at a time.

use super::color::{Rgb, BLACK};
use crate::config::StripConfig;
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Hardware write primitive: display one complete frame
pub trait StripDevice: Send {
    fn show(&mut self, pixels: &[Rgb]) -> Result<()>;
}

/// Shared handle to the strip device
pub type SharedStrip = Arc<Mutex<Box<dyn StripDevice>>>;

/// Create a strip device based on configuration
pub fn create_strip(config: &StripConfig) -> Result<SharedStrip> {
    let device: Box<dyn StripDevice> = match config.driver.as_str() {
        "none" => Box::new(NullStrip),
        "console" => Box::new(ConsoleStrip::new()),
        other => {
            return Err(Error::InvalidParameter(format!(
                "unknown strip driver: {}",
                other
            )))
        }
    };
    Ok(Arc::new(Mutex::new(device)))
}

/// Write one all-black frame through a shared strip handle
pub fn blank(strip: &SharedStrip, led_count: usize) -> Result<()> {
    let frame = vec![BLACK; led_count];
    strip.lock().show(&frame)
}

/// No hardware attached; frames are discarded
pub struct NullStrip;

impl StripDevice for NullStrip {
    fn show(&mut self, _pixels: &[Rgb]) -> Result<()> {
        Ok(())
    }
}

/// Logs rendered frames at debug level, for bench runs without a strip
pub struct ConsoleStrip {
    frame_count: u64,
}

impl ConsoleStrip {
    pub fn new() -> Self {
        Self { frame_count: 0 }
    }
}

impl StripDevice for ConsoleStrip {
    fn show(&mut self, pixels: &[Rgb]) -> Result<()> {
        self.frame_count += 1;
        if log::log_enabled!(log::Level::Debug) {
            let lit = pixels.iter().filter(|&&p| p != BLACK).count();
            log::debug!("frame #{}: {}/{} pixels lit", self.frame_count, lit, pixels.len());
        }
        Ok(())
    }
}

impl Default for ConsoleStrip {
    fn default() -> Self {
        Self::new()
    }
}

/// Recording strip for tests: keeps every flushed frame
#[derive(Clone)]
pub struct MockStrip {
    frames: Arc<Mutex<Vec<Vec<Rgb>>>>,
}

impl MockStrip {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wrap a clone of this recorder as a shared device handle
    pub fn shared(&self) -> SharedStrip {
        Arc::new(Mutex::new(Box::new(self.clone())))
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn last_frame(&self) -> Option<Vec<Rgb>> {
        self.frames.lock().last().cloned()
    }

    pub fn frames(&self) -> Vec<Vec<Rgb>> {
        self.frames.lock().clone()
    }
}

impl StripDevice for MockStrip {
    fn show(&mut self, pixels: &[Rgb]) -> Result<()> {
        self.frames.lock().push(pixels.to_vec());
        Ok(())
    }
}

impl Default for MockStrip {
    fn default() -> Self {
        Self::new()
    }
}
