//! Aperture Shutter Control System.
//!
//! Two independent shutter position channels driven against one commanded
//! position, bounded to [0, 100] percent open and never negative. The
//! shutters move at a fixed rate; no jerk profiling is involved.

use serde::{Deserialize, Serialize};

use super::{
    default_messages, fault_messages, Llc, LlcError, LlcName, MotionState, OperationalMode,
    StatusMessage, DOME_VOLTAGE,
};

/// The number of shutters.
pub const NUM_SHUTTERS: usize = 2;
/// The number of motors per shutter.
pub const NUM_MOTORS_PER_SHUTTER: usize = 2;
const NUM_MOTORS: usize = NUM_SHUTTERS * NUM_MOTORS_PER_SHUTTER;

/// The shutter is 0% open.
pub const CLOSED_POSITION: f64 = 0.0;
/// The shutter is 100% open.
pub const OPEN_POSITION: f64 = 100.0;
/// The shutter speed [%/s], such that a full travel takes 10 seconds.
pub const SHUTTER_SPEED: f64 = 10.0;

/// Total power draw of the aperture shutter [kW].
pub const APS_POWER_DRAW_KW: f64 = 5.6;

/// One linear position channel.
#[derive(Debug, Clone, Copy)]
struct ShutterChannel {
    start_position: f64,
    target: f64,
    start_tai: f64,
}

impl ShutterChannel {
    fn new(position: f64, tai: f64) -> Self {
        Self {
            start_position: position,
            target: position,
            start_tai: tai,
        }
    }

    fn duration(&self) -> f64 {
        (self.target - self.start_position).abs() / SHUTTER_SPEED
    }

    fn position(&self, tai: f64) -> f64 {
        let t = (tai - self.start_tai).max(0.0);
        let travel = SHUTTER_SPEED * t;
        let distance = self.target - self.start_position;
        let position = if travel >= distance.abs() {
            self.target
        } else {
            self.start_position + distance.signum() * travel
        };
        position.clamp(CLOSED_POSITION, OPEN_POSITION)
    }

    fn moving(&self, tai: f64) -> bool {
        tai - self.start_tai < self.duration()
    }

    fn halt(&mut self, tai: f64) {
        let position = self.position(tai);
        self.start_position = position;
        self.target = position;
        self.start_tai = tai;
    }

    fn drive_to(&mut self, target: f64, tai: f64) {
        self.start_position = self.position(tai);
        self.target = target;
        self.start_tai = tai;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApscsStatusHeader {
    pub messages: Vec<StatusMessage>,
    pub status: MotionState,
    pub operational_mode: OperationalMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApscsStatus {
    pub status: ApscsStatusHeader,
    pub position_actual: [f64; NUM_SHUTTERS],
    pub position_commanded: f64,
    pub drive_torque_actual: [f64; NUM_MOTORS],
    pub drive_torque_commanded: [f64; NUM_MOTORS],
    pub drive_current_actual: [f64; NUM_MOTORS],
    pub drive_temperature: [f64; NUM_MOTORS],
    pub resolver_head_raw: [f64; NUM_MOTORS],
    pub resolver_head_calibrated: [f64; NUM_MOTORS],
    pub power_draw: f64,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: f64,
}

#[derive(Debug)]
pub struct Apscs {
    channels: [ShutterChannel; NUM_SHUTTERS],
    position_commanded: f64,
    stopping: bool,
    stationary: bool,
    operational_mode: OperationalMode,
    messages: Vec<StatusMessage>,
    in_error: bool,
    drives_in_error: [bool; NUM_MOTORS],
}

impl Apscs {
    pub fn new(start_tai: f64) -> Self {
        Self {
            channels: [ShutterChannel::new(CLOSED_POSITION, start_tai); NUM_SHUTTERS],
            position_commanded: CLOSED_POSITION,
            stopping: false,
            stationary: false,
            operational_mode: OperationalMode::Normal,
            messages: default_messages(),
            in_error: false,
            drives_in_error: [false; NUM_MOTORS],
        }
    }

    pub fn motion_state(&self, tai: f64) -> MotionState {
        if self.in_error {
            return MotionState::Error;
        }
        if self.channels.iter().any(|c| c.moving(tai)) {
            if self.stopping {
                MotionState::Stopping
            } else {
                MotionState::Moving
            }
        } else if self.stationary {
            MotionState::Stationary
        } else {
            MotionState::Stopped
        }
    }

    pub fn positions(&self, tai: f64) -> [f64; NUM_SHUTTERS] {
        let mut positions = [0.0; NUM_SHUTTERS];
        for (out, channel) in positions.iter_mut().zip(self.channels.iter()) {
            *out = channel.position(tai);
        }
        positions
    }

    fn ensure_commandable(&self) -> Result<(), LlcError> {
        if self.in_error {
            return Err(LlcError::InvalidState {
                state: MotionState::Error,
            });
        }
        Ok(())
    }

    fn drive_all_to(&mut self, target: f64, tai: f64) -> f64 {
        let mut duration: f64 = 0.0;
        for channel in &mut self.channels {
            channel.drive_to(target, tai);
            duration = duration.max(channel.duration());
        }
        self.position_commanded = target;
        self.stopping = false;
        self.stationary = false;
        duration
    }

    /// Open both shutters fully.
    pub fn open_shutter(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        Ok(self.drive_all_to(OPEN_POSITION, tai))
    }

    /// Close both shutters fully.
    pub fn close_shutter(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        Ok(self.drive_all_to(CLOSED_POSITION, tai))
    }

    /// Stop shutter motion where it is.
    pub fn stop_shutter(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        for channel in &mut self.channels {
            channel.halt(tai);
        }
        self.stopping = false;
        self.stationary = false;
        Ok(0.0)
    }

    /// Seek the closed position to re-zero the shutters. Needed when the
    /// system was shut down with the shutters neither fully open nor fully
    /// closed.
    pub fn home(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        Ok(self.drive_all_to(CLOSED_POSITION, tai))
    }

    /// Stop shutter motion and engage the brakes.
    pub fn go_stationary(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        for channel in &mut self.channels {
            channel.halt(tai);
        }
        self.stopping = false;
        self.stationary = true;
        Ok(0.0)
    }

    /// Reset the flagged shutter drives; 1 means reset.
    pub fn reset_drives(&mut self, reset: &[i64], tai: f64) -> Result<f64, LlcError> {
        let _ = tai;
        for (drive, &value) in self.drives_in_error.iter_mut().zip(reset.iter()) {
            if value == 1 {
                *drive = false;
            }
        }
        Ok(0.0)
    }

    /// Clear the fault state.
    pub fn exit_fault(&mut self, tai: f64) -> Result<f64, LlcError> {
        if self.drives_in_error.iter().any(|&d| d) {
            return Err(LlcError::DrivesInError);
        }
        if self.in_error {
            for channel in &mut self.channels {
                channel.halt(tai);
            }
            self.stationary = true;
            self.in_error = false;
            self.messages = default_messages();
        }
        Ok(0.0)
    }

    /// Fault injection hook for tests.
    pub fn set_fault(&mut self, drives_in_error: &[i64], tai: f64) {
        for channel in &mut self.channels {
            channel.halt(tai);
        }
        for (drive, &value) in self.drives_in_error.iter_mut().zip(drives_in_error.iter()) {
            if value == 1 {
                *drive = true;
            }
        }
        self.in_error = true;
        self.messages = fault_messages();
    }

    pub fn determine_status(&mut self, tai: f64) -> ApscsStatus {
        let positions = self.positions(tai);
        let power_draw = self.power_draw_kw(tai);
        let per_motor_current = power_draw * 1000.0 / DOME_VOLTAGE / NUM_MOTORS as f64;
        let mut resolver = [0.0; NUM_MOTORS];
        for (index, value) in resolver.iter_mut().enumerate() {
            *value = positions[index / NUM_MOTORS_PER_SHUTTER];
        }
        ApscsStatus {
            status: ApscsStatusHeader {
                messages: self.messages.clone(),
                status: self.motion_state(tai),
                operational_mode: self.operational_mode,
            },
            position_actual: positions,
            position_commanded: self.position_commanded,
            drive_torque_actual: [0.0; NUM_MOTORS],
            drive_torque_commanded: [0.0; NUM_MOTORS],
            drive_current_actual: [per_motor_current; NUM_MOTORS],
            drive_temperature: [20.0; NUM_MOTORS],
            resolver_head_raw: resolver,
            resolver_head_calibrated: resolver,
            power_draw,
            timestamp_utc: tai,
        }
    }
}

impl Llc for Apscs {
    fn name(&self) -> LlcName {
        LlcName::Apscs
    }

    fn operational_mode(&self) -> OperationalMode {
        self.operational_mode
    }

    fn set_normal(&mut self) {
        self.operational_mode = OperationalMode::Normal;
    }

    fn set_degraded(&mut self) {
        self.operational_mode = OperationalMode::Degraded;
    }

    fn power_draw_kw(&self, tai: f64) -> f64 {
        if self.in_error {
            return 0.0;
        }
        if self.channels.iter().any(|c| c.moving(tai)) {
            APS_POWER_DRAW_KW
        } else {
            0.0
        }
    }
}
