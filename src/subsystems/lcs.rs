//! Louvers Control System.
//!
//! An ordered set of independent louvers, each 0-100% open, moving at a
//! fixed rate. All louvers report status simultaneously as arrays.

use serde::{Deserialize, Serialize};

use super::{
    default_messages, fault_messages, Llc, LlcError, LlcName, MotionState, OperationalMode,
    StatusMessage, DOME_VOLTAGE,
};

/// The number of louvers.
pub const NUM_LOUVERS: usize = 34;
/// The number of motors per louver.
pub const NUM_MOTORS_PER_LOUVER: usize = 2;
const NUM_MOTORS: usize = NUM_LOUVERS * NUM_MOTORS_PER_LOUVER;

/// A louver is 0% open.
pub const CLOSED_POSITION: f64 = 0.0;
/// A louver is 100% open.
pub const OPEN_POSITION: f64 = 100.0;
/// Louver speed [%/s].
pub const LOUVER_SPEED: f64 = 10.0;

/// A setLouvers position value of -1 means "do not move this louver".
pub const DO_NOT_MOVE: f64 = -1.0;

/// Total power draw of the louvers [kW].
pub const LOUVERS_POWER_DRAW_KW: f64 = 69.0;

#[derive(Debug, Clone, Copy)]
struct LouverChannel {
    start_position: f64,
    target: f64,
    start_tai: f64,
}

impl LouverChannel {
    fn new(position: f64, tai: f64) -> Self {
        Self {
            start_position: position,
            target: position,
            start_tai: tai,
        }
    }

    fn duration(&self) -> f64 {
        (self.target - self.start_position).abs() / LOUVER_SPEED
    }

    fn position(&self, tai: f64) -> f64 {
        let t = (tai - self.start_tai).max(0.0);
        let travel = LOUVER_SPEED * t;
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
pub struct LcsStatusHeader {
    pub messages: Vec<StatusMessage>,
    pub status: Vec<MotionState>,
    pub operational_mode: OperationalMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LcsStatus {
    pub status: LcsStatusHeader,
    pub position_actual: Vec<f64>,
    pub position_commanded: Vec<f64>,
    pub drive_torque_actual: Vec<f64>,
    pub drive_torque_commanded: Vec<f64>,
    pub drive_current_actual: Vec<f64>,
    pub drive_temperature: Vec<f64>,
    pub power_draw: f64,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: f64,
}

#[derive(Debug)]
pub struct Lcs {
    channels: [LouverChannel; NUM_LOUVERS],
    position_commanded: [f64; NUM_LOUVERS],
    stationary: bool,
    operational_mode: OperationalMode,
    messages: Vec<StatusMessage>,
    in_error: bool,
}

impl Lcs {
    pub fn new(start_tai: f64) -> Self {
        Self {
            channels: [LouverChannel::new(CLOSED_POSITION, start_tai); NUM_LOUVERS],
            position_commanded: [CLOSED_POSITION; NUM_LOUVERS],
            stationary: false,
            operational_mode: OperationalMode::Normal,
            messages: default_messages(),
            in_error: false,
        }
    }

    fn louver_state(&self, index: usize, tai: f64) -> MotionState {
        if self.in_error {
            MotionState::Error
        } else if self.channels[index].moving(tai) {
            MotionState::Moving
        } else if self.stationary {
            MotionState::Stationary
        } else {
            MotionState::Stopped
        }
    }

    pub fn positions(&self, tai: f64) -> [f64; NUM_LOUVERS] {
        let mut positions = [0.0; NUM_LOUVERS];
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

    /// Apply one target per louver. A value of -1 leaves that louver alone.
    /// The position array must hold exactly one value per louver.
    pub fn set_louvers(&mut self, position: &[f64], tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        if position.len() != NUM_LOUVERS {
            return Err(LlcError::InvalidParameter {
                name: "position",
                reason: "expected one position per louver",
            });
        }
        if position
            .iter()
            .any(|&p| p != DO_NOT_MOVE && !(CLOSED_POSITION..=OPEN_POSITION).contains(&p))
        {
            return Err(LlcError::InvalidParameter {
                name: "position",
                reason: "louver positions must be -1 or within [0, 100]",
            });
        }
        let mut duration: f64 = 0.0;
        for (index, &target) in position.iter().enumerate() {
            if target == DO_NOT_MOVE {
                continue;
            }
            self.channels[index].drive_to(target, tai);
            self.position_commanded[index] = target;
            duration = duration.max(self.channels[index].duration());
        }
        self.stationary = false;
        Ok(duration)
    }

    /// Close all louvers.
    pub fn close_louvers(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        let mut duration: f64 = 0.0;
        for channel in &mut self.channels {
            channel.drive_to(CLOSED_POSITION, tai);
            duration = duration.max(channel.duration());
        }
        self.position_commanded = [CLOSED_POSITION; NUM_LOUVERS];
        self.stationary = false;
        Ok(duration)
    }

    /// Stop the motion of all louvers.
    pub fn stop_louvers(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        for channel in &mut self.channels {
            channel.halt(tai);
        }
        self.stationary = false;
        Ok(0.0)
    }

    /// Stop louver motion and engage the brakes.
    pub fn go_stationary(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        for channel in &mut self.channels {
            channel.halt(tai);
        }
        self.stationary = true;
        Ok(0.0)
    }

    /// Clear the fault state.
    pub fn exit_fault(&mut self, tai: f64) -> Result<f64, LlcError> {
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
    pub fn set_fault(&mut self, tai: f64) {
        for channel in &mut self.channels {
            channel.halt(tai);
        }
        self.in_error = true;
        self.messages = fault_messages();
    }

    pub fn determine_status(&mut self, tai: f64) -> LcsStatus {
        let positions = self.positions(tai);
        let mut status = Vec::with_capacity(NUM_LOUVERS);
        let mut drive_current = vec![0.0; NUM_MOTORS];
        let per_motor_current =
            LOUVERS_POWER_DRAW_KW * 1000.0 / NUM_LOUVERS as f64 / NUM_MOTORS_PER_LOUVER as f64
                / DOME_VOLTAGE;
        for index in 0..NUM_LOUVERS {
            let state = self.louver_state(index, tai);
            if state == MotionState::Moving {
                for motor in 0..NUM_MOTORS_PER_LOUVER {
                    drive_current[index * NUM_MOTORS_PER_LOUVER + motor] = per_motor_current;
                }
            }
            status.push(state);
        }
        LcsStatus {
            status: LcsStatusHeader {
                messages: self.messages.clone(),
                status,
                operational_mode: self.operational_mode,
            },
            position_actual: positions.to_vec(),
            position_commanded: self.position_commanded.to_vec(),
            drive_torque_actual: vec![0.0; NUM_MOTORS],
            drive_torque_commanded: vec![0.0; NUM_MOTORS],
            drive_current_actual: drive_current,
            drive_temperature: vec![20.0; NUM_MOTORS],
            power_draw: self.power_draw_kw(tai),
            timestamp_utc: tai,
        }
    }
}

impl Llc for Lcs {
    fn name(&self) -> LlcName {
        LlcName::Lcs
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
            LOUVERS_POWER_DRAW_KW
        } else {
            0.0
        }
    }
}
