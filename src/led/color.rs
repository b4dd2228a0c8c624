//! Pixel color type and the throttle color ramp

use serde::{Deserialize, Serialize};

/// One RGB pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// All channels off
pub const BLACK: Rgb = Rgb::new(0, 0, 0);

/// Hazard amber
pub const AMBER: Rgb = Rgb::new(255, 120, 0);

/// Police red / pit-crew red
pub const RED: Rgb = Rgb::new(255, 0, 0);

/// Police blue
pub const BLUE: Rgb = Rgb::new(0, 0, 255);

/// Pit-crew white
pub const WHITE: Rgb = Rgb::new(255, 255, 255);

/// Map a ratio in [0, 1] to a green→yellow→red gradient
///
/// Below 0.4 green is fixed and red scales up; from 0.4 to 0.8 red is
/// fixed and green scales down; at and above 0.8 the output is pure
/// red. Out-of-range input is clamped, so every channel is always a
/// valid [0, 255] value.
pub fn color_ramp(ratio: f32) -> Rgb {
    let ratio = if ratio.is_finite() {
        ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };

    if ratio < 0.4 {
        let r = (ratio / 0.4 * 255.0) as u8;
        Rgb::new(r, 255, 0)
    } else if ratio < 0.8 {
        let g = ((0.8 - ratio) / 0.4 * 255.0).clamp(0.0, 255.0) as u8;
        Rgb::new(255, g, 0)
    } else {
        RED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints() {
        assert_eq!(color_ramp(0.0), Rgb::new(0, 255, 0)); // pure green
        assert_eq!(color_ramp(0.4), Rgb::new(255, 255, 0)); // pure yellow
        assert_eq!(color_ramp(0.8), RED);
        assert_eq!(color_ramp(1.0), RED);
    }

    #[test]
    fn test_ramp_clamps_out_of_range() {
        assert_eq!(color_ramp(-3.0), color_ramp(0.0));
        assert_eq!(color_ramp(42.0), RED);
        assert_eq!(color_ramp(f32::NAN), color_ramp(0.0));
    }

    #[test]
    fn test_ramp_monotonic_red_then_falling_green() {
        // Red channel never decreases as the ratio climbs
        let mut last_r = 0u8;
        for i in 0..=100 {
            let c = color_ramp(i as f32 / 100.0);
            assert!(c.r >= last_r);
            assert_eq!(c.b, 0);
            last_r = c.r;
        }
        // Green falls across the yellow-to-red band
        assert!(color_ramp(0.5).g > color_ramp(0.7).g);
    }
}
