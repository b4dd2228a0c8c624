//! Light strip rendering
//!
//! The display engine owns the frame buffer and renders the active mode
//! continuously; animation behaviors live in one dispatch table in
//! [`modes`]; the hardware write primitive sits behind the
//! [`strip::StripDevice`] seam.

pub mod color;
pub mod engine;
pub mod frame;
pub mod modes;
pub mod strip;

pub use color::{color_ramp, Rgb};
pub use engine::{DisplayEngine, RatioSource};
pub use frame::FrameBuffer;
pub use strip::{create_strip, MockStrip, SharedStrip, StripDevice};
