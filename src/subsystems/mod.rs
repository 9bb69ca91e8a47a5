//! Lower level component (LLC) state machines.
//!
//! Each subsystem owns its own discrete state, configuration and telemetry.
//! State is mutated only by the command router and by the polling tick; both
//! run inside the controller's single mutual-exclusion domain.

pub mod amcs;
pub mod apscs;
pub mod cbcs;
pub mod lcs;
pub mod lwscs;
pub mod moncs;
pub mod thcs;

pub use amcs::Amcs;
pub use apscs::Apscs;
pub use cbcs::Cbcs;
pub use lcs::Lcs;
pub use lwscs::Lwscs;
pub use moncs::Moncs;
pub use thcs::Thcs;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of lower level components.
pub const LLC_COUNT: usize = 7;

/// Azimuth position tolerance [rad] for duplicate-command detection,
/// equivalent to 0.25 degrees.
pub const POSITION_TOLERANCE: f64 = 0.25 * std::f64::consts::PI / 180.0;

/// Nominal dome supply voltage [V], used to derive drive currents from the
/// vendor power draw figures.
pub const DOME_VOLTAGE: f64 = 660.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LlcName {
    #[serde(rename = "AMCS")]
    Amcs,
    #[serde(rename = "ApSCS")]
    Apscs,
    #[serde(rename = "CBCS")]
    Cbcs,
    #[serde(rename = "LCS")]
    Lcs,
    #[serde(rename = "LWSCS")]
    Lwscs,
    #[serde(rename = "MonCS")]
    Moncs,
    #[serde(rename = "ThCS")]
    Thcs,
}

impl LlcName {
    pub const ALL: [LlcName; LLC_COUNT] = [
        LlcName::Amcs,
        LlcName::Apscs,
        LlcName::Cbcs,
        LlcName::Lcs,
        LlcName::Lwscs,
        LlcName::Moncs,
        LlcName::Thcs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LlcName::Amcs => "AMCS",
            LlcName::Apscs => "ApSCS",
            LlcName::Cbcs => "CBCS",
            LlcName::Lcs => "LCS",
            LlcName::Lwscs => "LWSCS",
            LlcName::Moncs => "MonCS",
            LlcName::Thcs => "ThCS",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            LlcName::Amcs => 0,
            LlcName::Apscs => 1,
            LlcName::Cbcs => 2,
            LlcName::Lcs => 3,
            LlcName::Lwscs => 4,
            LlcName::Moncs => 5,
            LlcName::Thcs => 6,
        }
    }
}

impl std::fmt::Display for LlcName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational mode of a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationalMode {
    Normal,
    Degraded,
}

/// ON/OFF argument used by the inflate and fans commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnOff {
    On,
    Off,
}

/// Discrete motion state shared by the motion-capable subsystems. ThCS only
/// uses SETTING and STOPPED; read-only subsystems report none of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionState {
    Parked,
    Parking,
    Stationary,
    Stopped,
    Stopping,
    Moving,
    Crawling,
    Configuring,
    Setting,
    Error,
}

impl MotionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MotionState::Parked => "PARKED",
            MotionState::Parking => "PARKING",
            MotionState::Stationary => "STATIONARY",
            MotionState::Stopped => "STOPPED",
            MotionState::Stopping => "STOPPING",
            MotionState::Moving => "MOVING",
            MotionState::Crawling => "CRAWLING",
            MotionState::Configuring => "CONFIGURING",
            MotionState::Setting => "SETTING",
            MotionState::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for MotionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a subsystem's error message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub code: i64,
    pub description: String,
}

impl StatusMessage {
    pub fn new(code: i64, description: &str) -> Self {
        Self {
            code,
            description: description.to_string(),
        }
    }
}

/// The message list reported while no errors are present.
pub fn default_messages() -> Vec<StatusMessage> {
    vec![StatusMessage::new(0, "No Errors")]
}

/// The message list reported while in fault state.
pub fn fault_messages() -> Vec<StatusMessage> {
    vec![StatusMessage::new(1001, "Drives in error state")]
}

/// Errors a subsystem can raise while handling a command. The router maps
/// these onto wire response codes.
#[derive(Debug, Error, PartialEq)]
pub enum LlcError {
    #[error("command not allowed in {state} state")]
    InvalidState { state: MotionState },
    #[error("subsystem is being configured")]
    Configuring,
    #[error("target position {position} outside range [{min}, {max}]")]
    PositionOutOfRange { position: f64, min: f64, max: f64 },
    #[error("drives are in error state and need a reset first")]
    DrivesInError,
    #[error("parameter {name} is invalid: {reason}")]
    InvalidParameter { name: &'static str, reason: &'static str },
}

/// Behavior common to every lower level component.
pub trait Llc {
    fn name(&self) -> LlcName;

    fn operational_mode(&self) -> OperationalMode;

    fn set_normal(&mut self);

    fn set_degraded(&mut self);

    /// Power drawn from the slip ring [kW] at the given time. Only the
    /// rotating-part subsystems report a non-zero draw.
    fn power_draw_kw(&self, tai: f64) -> f64 {
        let _ = tai;
        0.0
    }
}

/// Wrap an angle [rad] into [0, 2pi).
pub fn wrap_angle(angle: f64) -> f64 {
    let two_pi = 2.0 * std::f64::consts::PI;
    let wrapped = angle % two_pi;
    if wrapped < 0.0 {
        wrapped + two_pi
    } else {
        wrapped
    }
}

/// Smallest signed angular distance [rad] from `from` to `to`, in
/// [-pi, pi).
pub fn angle_diff(to: f64, from: f64) -> f64 {
    let pi = std::f64::consts::PI;
    let diff = (to - from + pi).rem_euclid(2.0 * pi) - pi;
    if diff == pi {
        -pi
    } else {
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_wrap_angle() {
        assert!((wrap_angle(2.5 * PI) - 0.5 * PI).abs() < 1e-12);
        assert!((wrap_angle(-0.5 * PI) - 1.5 * PI).abs() < 1e-12);
        assert_eq!(wrap_angle(0.0), 0.0);
    }

    #[test]
    fn test_angle_diff_takes_shortest_path() {
        assert!((angle_diff(0.1, 2.0 * PI - 0.1) - 0.2).abs() < 1e-12);
        assert!((angle_diff(2.0 * PI - 0.1, 0.1) + 0.2).abs() < 1e-12);
        assert!((angle_diff(1.0, 0.25) - 0.75).abs() < 1e-12);
    }
}
