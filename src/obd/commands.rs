//! OBD-II command set and response decoding
//!
//! The watch list matches the original deployment: engine vitals plus
//! the adapter voltage and current trouble codes. Scalar decodes follow
//! the SAE J1979 mode-01 formulas; values are unit-stripped magnitudes.

use super::ReadingValue;

/// Commands polled each cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObdCommand {
    Rpm,
    Speed,
    CoolantTemp,
    ThrottlePos,
    EngineLoad,
    Maf,
    IntakeTemp,
    ElmVoltage,
    CurrentDtc,
}

impl ObdCommand {
    /// The full watch list, in poll order
    pub const ALL: [ObdCommand; 9] = [
        ObdCommand::Rpm,
        ObdCommand::Speed,
        ObdCommand::CoolantTemp,
        ObdCommand::ThrottlePos,
        ObdCommand::EngineLoad,
        ObdCommand::Maf,
        ObdCommand::IntakeTemp,
        ObdCommand::ElmVoltage,
        ObdCommand::CurrentDtc,
    ];

    /// Command identifier used in outbound messages
    pub fn name(&self) -> &'static str {
        match self {
            ObdCommand::Rpm => "RPM",
            ObdCommand::Speed => "SPEED",
            ObdCommand::CoolantTemp => "COOLANT_TEMP",
            ObdCommand::ThrottlePos => "THROTTLE_POS",
            ObdCommand::EngineLoad => "ENGINE_LOAD",
            ObdCommand::Maf => "MAF",
            ObdCommand::IntakeTemp => "INTAKE_TEMP",
            ObdCommand::ElmVoltage => "ELM_VOLTAGE",
            ObdCommand::CurrentDtc => "GET_CURRENT_DTC",
        }
    }

    /// Look up a command by its identifier (used for the config watch list)
    pub fn from_name(name: &str) -> Option<ObdCommand> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Request string sent to the adapter (PID query or AT command)
    pub fn request(&self) -> &'static str {
        match self {
            ObdCommand::Rpm => "010C",
            ObdCommand::Speed => "010D",
            ObdCommand::CoolantTemp => "0105",
            ObdCommand::ThrottlePos => "0111",
            ObdCommand::EngineLoad => "0104",
            ObdCommand::Maf => "0110",
            ObdCommand::IntakeTemp => "010F",
            ObdCommand::ElmVoltage => "ATRV",
            ObdCommand::CurrentDtc => "03",
        }
    }

    /// Mode-01 PID byte for scalar commands
    fn pid(&self) -> Option<u8> {
        match self {
            ObdCommand::Rpm => Some(0x0C),
            ObdCommand::Speed => Some(0x0D),
            ObdCommand::CoolantTemp => Some(0x05),
            ObdCommand::ThrottlePos => Some(0x11),
            ObdCommand::EngineLoad => Some(0x04),
            ObdCommand::Maf => Some(0x10),
            ObdCommand::IntakeTemp => Some(0x0F),
            ObdCommand::ElmVoltage | ObdCommand::CurrentDtc => None,
        }
    }

    /// Decode an adapter response into a reading value
    ///
    /// Returns `None` for null responses (`NO DATA`, `?`, empty, or a
    /// reply that does not echo the queried PID); the caller suppresses
    /// the reading for this cycle.
    pub fn decode(&self, response: &str) -> Option<ReadingValue> {
        if is_null_response(response) {
            return None;
        }
        match self {
            ObdCommand::ElmVoltage => decode_voltage(response).map(ReadingValue::Scalar),
            ObdCommand::CurrentDtc => decode_dtc(response).map(ReadingValue::Codes),
            _ => {
                let data = pid_payload(response, self.pid()?)?;
                self.apply_formula(&data).map(ReadingValue::Scalar)
            }
        }
    }

    fn apply_formula(&self, data: &[u8]) -> Option<f64> {
        let a = *data.first()? as f64;
        match self {
            ObdCommand::Rpm => {
                let b = *data.get(1)? as f64;
                Some((a * 256.0 + b) / 4.0)
            }
            ObdCommand::Speed => Some(a),
            ObdCommand::CoolantTemp | ObdCommand::IntakeTemp => Some(a - 40.0),
            ObdCommand::ThrottlePos | ObdCommand::EngineLoad => Some(a * 100.0 / 255.0),
            ObdCommand::Maf => {
                let b = *data.get(1)? as f64;
                Some((a * 256.0 + b) / 100.0)
            }
            ObdCommand::ElmVoltage | ObdCommand::CurrentDtc => None,
        }
    }
}

fn is_null_response(response: &str) -> bool {
    let trimmed = response.trim();
    trimmed.is_empty()
        || trimmed.contains("NO DATA")
        || trimmed.contains("UNABLE TO CONNECT")
        || trimmed == "?"
}

/// Strip the trailing volt unit and parse the magnitude.
///
/// `"12.6V"` and `"12.6"` both decode to 12.6; stripping is idempotent.
fn decode_voltage(response: &str) -> Option<f64> {
    let token = response.split_whitespace().next()?;
    token.trim_end_matches('V').parse().ok()
}

/// Extract the mode-01 response payload following the `41 <pid>` echo
fn pid_payload(response: &str, pid: u8) -> Option<Vec<u8>> {
    let bytes = hex_bytes(response)?;
    let echo_at = bytes.windows(2).position(|w| w == [0x41, pid])?;
    let payload = &bytes[echo_at + 2..];
    if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    }
}

/// Decode a mode-03 stored-DTC response into code strings
///
/// Handles both framings seen in the field: `43` followed directly by
/// DTC byte pairs (ISO 9141 style) and `43 NN` with a leading count
/// (CAN style). Zero pairs decode to an empty list, which is still a
/// valid reading.
fn decode_dtc(response: &str) -> Option<Vec<String>> {
    let bytes = hex_bytes(response)?;
    let echo_at = bytes.iter().position(|&b| b == 0x43)?;
    let mut rest = &bytes[echo_at + 1..];

    // CAN framing carries a pair count right after the service byte
    if rest.len() % 2 == 1 {
        rest = &rest[1..];
    }

    let mut codes = Vec::new();
    for pair in rest.chunks_exact(2) {
        if pair == [0x00, 0x00] {
            continue; // padding
        }
        codes.push(format_dtc(pair[0], pair[1]));
    }
    Some(codes)
}

/// Format a DTC byte pair as the conventional code string (e.g. `P0133`)
fn format_dtc(hi: u8, lo: u8) -> String {
    let system = match (hi >> 6) & 0x03 {
        0 => 'P',
        1 => 'C',
        2 => 'B',
        _ => 'U',
    };
    format!(
        "{}{}{:X}{:X}{:X}",
        system,
        (hi >> 4) & 0x03,
        hi & 0x0F,
        (lo >> 4) & 0x0F,
        lo & 0x0F
    )
}

/// Collect hex digit pairs from a response, ignoring spaces and newlines
fn hex_bytes(response: &str) -> Option<Vec<u8>> {
    let digits: String = response.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if digits.len() < 2 {
        return None;
    }
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    let chars: Vec<char> = digits.chars().collect();
    for pair in chars.chunks_exact(2) {
        let s: String = pair.iter().collect();
        bytes.push(u8::from_str_radix(&s, 16).ok()?);
    }
    Some(bytes)
}
