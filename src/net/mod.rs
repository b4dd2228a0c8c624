//! Remote endpoint communication
//!
//! One bidirectional TCP connection: readings flow out as JSON frames,
//! mode commands flow in as single-token frames.

pub mod link;
pub mod wire;

pub use link::NetLink;
