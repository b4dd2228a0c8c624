//! Simulated vehicle backend
//!
//! Produces plausible engine telemetry without a car on the bench.
//! Values follow bounded random walks; the throttle drives RPM so the
//! acceleration display mode has something meaningful to show.

use super::commands::ObdCommand;
use super::{ObdBackend, ReadingValue};
use crate::error::Result;
use rand::Rng;

const IDLE_RPM: f64 = 800.0;
const MAX_RPM: f64 = 6500.0;

/// Simulated vehicle state
pub struct SimVehicle {
    throttle_pct: f64,
    rpm: f64,
    speed_kph: f64,
    coolant_c: f64,
}

impl SimVehicle {
    pub fn new() -> Self {
        Self {
            throttle_pct: 15.0,
            rpm: IDLE_RPM,
            speed_kph: 0.0,
            coolant_c: 20.0, // cold start, warms toward 90
        }
    }

    /// Advance the walks one poll cycle
    fn tick(&mut self) {
        let mut rng = rand::rng();

        self.throttle_pct = (self.throttle_pct + rng.random_range(-8.0..8.0)).clamp(0.0, 100.0);

        // RPM chases the throttle position
        let target_rpm = IDLE_RPM + (MAX_RPM - IDLE_RPM) * self.throttle_pct / 100.0;
        self.rpm += (target_rpm - self.rpm) * 0.3;

        let target_speed = self.throttle_pct * 1.8;
        self.speed_kph = (self.speed_kph + (target_speed - self.speed_kph) * 0.1).max(0.0);

        if self.coolant_c < 90.0 {
            self.coolant_c += 0.2;
        }
    }
}

impl ObdBackend for SimVehicle {
    fn query(&mut self, command: ObdCommand) -> Result<Option<ReadingValue>> {
        let mut rng = rand::rng();
        let value = match command {
            ObdCommand::Rpm => {
                // One tick per poll cycle, keyed off the first command
                self.tick();
                ReadingValue::Scalar(self.rpm.round())
            }
            ObdCommand::Speed => ReadingValue::Scalar(self.speed_kph.round()),
            ObdCommand::CoolantTemp => ReadingValue::Scalar(self.coolant_c.round()),
            ObdCommand::ThrottlePos => ReadingValue::Scalar(self.throttle_pct),
            ObdCommand::EngineLoad => ReadingValue::Scalar(self.throttle_pct * 0.8),
            ObdCommand::Maf => ReadingValue::Scalar(self.rpm / 100.0),
            ObdCommand::IntakeTemp => ReadingValue::Scalar(25.0),
            ObdCommand::ElmVoltage => {
                ReadingValue::Scalar(14.2 + rng.random_range(-0.1..0.1))
            }
            ObdCommand::CurrentDtc => ReadingValue::Codes(Vec::new()),
        };
        Ok(Some(value))
    }
}

impl Default for SimVehicle {
    fn default() -> Self {
        Self::new()
    }
}
