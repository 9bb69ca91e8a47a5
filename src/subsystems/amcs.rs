//! Azimuth Motion Control System.
//!
//! Owns the azimuth motion profile plus the auxiliary state machines for the
//! inflatable seal, the brakes, the locking pins and the motor power. The
//! discrete motion state is derived from the active profile and the elapsed
//! time, so commands and the polling tick share one source of truth.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config;
use crate::motion::{MotionLimits, MotionProfile};

use super::{
    angle_diff, default_messages, fault_messages, wrap_angle, Llc, LlcError, LlcName, MotionState,
    OnOff, OperationalMode, StatusMessage, POSITION_TOLERANCE,
};

/// The number of azimuth drives.
pub const NUM_MOTORS: usize = 5;

const NUM_MOTOR_TEMPERATURES: usize = 13;
const NUM_ENCODERS: usize = 5;

/// Current consumption per motor when moving [A], assuming no acceleration
/// and no wind gust.
pub const CURRENT_PER_MOTOR_MOVING: f64 = 40.0;
/// Current consumption per motor when crawling [A].
pub const CURRENT_PER_MOTOR_CRAWLING: f64 = 4.1;

/// The dome parks at azimuth 0.
pub const PARK_POSITION: f64 = 0.0;

/// Simulated duration of a seal inflate/deflate transition [s].
const SEAL_TRANSITION_DURATION: f64 = 1.0;
/// Simulated duration of a brake engage/disengage transition [s].
const BRAKE_TRANSITION_DURATION: f64 = 0.5;
/// Simulated duration of a configuration cycle [s].
pub const CONFIG_DURATION: f64 = 2.0;

const CONFIG_ERROR_CODE: i64 = 2001;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SealState {
    Inflated,
    Deflating,
    Deflated,
    Inflating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BrakeState {
    Engaged,
    Disengaging,
    Disengaged,
    Engaging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockingPinState {
    Engaged,
    Disengaged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotorPowerState {
    On,
    Off,
}

/// What the active profile is working towards. Determines the reported state
/// while the profile runs and once it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    Move,
    Crawl,
    Stop,
    GoStationary,
    Park,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmcsStatusHeader {
    pub messages: Vec<StatusMessage>,
    pub status: MotionState,
    pub seal_state: SealState,
    pub brake_state: BrakeState,
    pub locking_pins: LockingPinState,
    pub motor_power: MotorPowerState,
    pub operational_mode: OperationalMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AppliedConfiguration {
    pub jmax: f64,
    pub amax: f64,
    pub vmax: f64,
}

impl From<MotionLimits> for AppliedConfiguration {
    fn from(limits: MotionLimits) -> Self {
        Self {
            jmax: limits.jmax,
            amax: limits.amax,
            vmax: limits.vmax,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmcsStatus {
    pub status: AmcsStatusHeader,
    pub position_actual: f64,
    pub position_commanded: f64,
    pub velocity_actual: f64,
    pub velocity_commanded: f64,
    pub drive_torque_actual: [f64; NUM_MOTORS],
    pub drive_torque_commanded: [f64; NUM_MOTORS],
    pub drive_current_actual: [f64; NUM_MOTORS],
    pub drive_temperature: [f64; NUM_MOTOR_TEMPERATURES],
    pub encoder_head_raw: [f64; NUM_ENCODERS],
    pub encoder_head_calibrated: [f64; NUM_ENCODERS],
    pub applied_configuration: AppliedConfiguration,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: f64,
}

#[derive(Debug)]
pub struct Amcs {
    limits: MotionLimits,
    profile: MotionProfile,
    profile_start_tai: f64,
    goal: Goal,
    /// State reported once the bounded part of the profile has completed and
    /// no crawl velocity is held.
    resting_state: MotionState,
    position_commanded: f64,
    velocity_commanded: f64,
    operational_mode: OperationalMode,
    messages: Vec<StatusMessage>,
    config_error: Option<StatusMessage>,
    configuring_until: f64,
    in_error: bool,
    error_position: f64,
    drives_in_error: [bool; NUM_MOTORS],
    seal: SealState,
    seal_until: f64,
    brakes: BrakeState,
    brakes_until: f64,
    locking_pins: LockingPinState,
    motor_power: MotorPowerState,
    drive_temperature: [f64; NUM_MOTOR_TEMPERATURES],
}

impl Amcs {
    pub fn new(start_tai: f64) -> Self {
        Self {
            limits: config::default_limits(LlcName::Amcs)
                .expect("AMCS has a configuration limit table"),
            profile: MotionProfile::hold(PARK_POSITION),
            profile_start_tai: start_tai,
            goal: Goal::Stop,
            resting_state: MotionState::Parked,
            position_commanded: PARK_POSITION,
            velocity_commanded: 0.0,
            operational_mode: OperationalMode::Normal,
            messages: default_messages(),
            config_error: None,
            configuring_until: 0.0,
            in_error: false,
            error_position: 0.0,
            drives_in_error: [false; NUM_MOTORS],
            seal: SealState::Inflated,
            seal_until: 0.0,
            brakes: BrakeState::Engaged,
            brakes_until: 0.0,
            locking_pins: LockingPinState::Engaged,
            motor_power: MotorPowerState::Off,
            drive_temperature: [20.0; NUM_MOTOR_TEMPERATURES],
        }
    }

    /// The discrete motion state at the given time.
    pub fn motion_state(&self, tai: f64) -> MotionState {
        if self.in_error {
            return MotionState::Error;
        }
        if tai < self.configuring_until {
            return MotionState::Configuring;
        }
        let t = tai - self.profile_start_tai;
        if t < self.profile.duration() {
            match self.goal {
                Goal::Stop => MotionState::Stopping,
                Goal::GoStationary => MotionState::Stopping,
                Goal::Park => MotionState::Parking,
                Goal::Crawl => MotionState::Crawling,
                Goal::Move => MotionState::Moving,
            }
        } else if self.profile.crawl_velocity().is_some() {
            MotionState::Crawling
        } else {
            self.resting_state
        }
    }

    /// Azimuth position [rad] wrapped into [0, 2pi).
    pub fn position(&self, tai: f64) -> f64 {
        if self.in_error {
            return wrap_angle(self.error_position);
        }
        wrap_angle(self.profile.sample(tai - self.profile_start_tai).position)
    }

    /// Azimuth velocity [rad/s].
    pub fn velocity(&self, tai: f64) -> f64 {
        if self.in_error {
            return 0.0;
        }
        self.profile.sample(tai - self.profile_start_tai).velocity
    }

    fn unwrapped_position(&self, tai: f64) -> f64 {
        self.profile.sample(tai - self.profile_start_tai).position
    }

    fn at_rest(&self, tai: f64) -> bool {
        self.profile.sample(tai - self.profile_start_tai).done
    }

    fn ensure_commandable(&self, tai: f64) -> Result<(), LlcError> {
        if self.in_error {
            return Err(LlcError::InvalidState {
                state: MotionState::Error,
            });
        }
        if tai < self.configuring_until {
            return Err(LlcError::Configuring);
        }
        Ok(())
    }

    fn begin_motion_aux(&mut self, tai: f64) {
        if self.seal != SealState::Deflated {
            self.seal = SealState::Deflating;
            self.seal_until = tai + SEAL_TRANSITION_DURATION;
        }
        if self.brakes != BrakeState::Disengaged {
            self.brakes = BrakeState::Disengaging;
            self.brakes_until = tai + BRAKE_TRANSITION_DURATION;
        }
        self.locking_pins = LockingPinState::Disengaged;
        self.motor_power = MotorPowerState::On;
    }

    /// Advance the auxiliary state machines to the given time. Called by the
    /// polling tick and before every status determination.
    pub fn advance(&mut self, tai: f64) {
        if self.seal == SealState::Deflating && tai >= self.seal_until {
            self.seal = SealState::Deflated;
        }
        if self.seal == SealState::Inflating && tai >= self.seal_until {
            self.seal = SealState::Inflated;
        }
        if self.brakes == BrakeState::Disengaging && tai >= self.brakes_until {
            self.brakes = BrakeState::Disengaged;
        }
        if self.brakes == BrakeState::Engaging && tai >= self.brakes_until {
            self.brakes = BrakeState::Engaged;
        }

        // Entering a braked resting state re-engages the brakes, re-inflates
        // the seal and powers the motors down.
        let state = self.motion_state(tai);
        if matches!(state, MotionState::Stationary | MotionState::Parked) {
            if self.brakes == BrakeState::Disengaged {
                self.brakes = BrakeState::Engaging;
                self.brakes_until = tai + BRAKE_TRANSITION_DURATION;
            }
            if self.seal == SealState::Deflated {
                self.seal = SealState::Inflating;
                self.seal_until = tai + SEAL_TRANSITION_DURATION;
            }
            if state == MotionState::Parked {
                self.locking_pins = LockingPinState::Engaged;
            }
            self.motor_power = MotorPowerState::Off;
        }
    }

    /// Move the dome to `azimuth` [rad] and start crawling at `az_rate`
    /// [rad/s] once there. Returns the expected duration of the move.
    pub fn move_az(&mut self, azimuth: f64, az_rate: f64, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        if az_rate.abs() > self.limits.vmax {
            return Err(LlcError::InvalidParameter {
                name: "azRate",
                reason: "crawl velocity exceeds vmax",
            });
        }

        let position = self.unwrapped_position(tai);
        if az_rate == 0.0
            && self.at_rest(tai)
            && angle_diff(azimuth, wrap_angle(position)).abs() < POSITION_TOLERANCE
        {
            // Deliberate suppression of a duplicate command, not a fault.
            info!(azimuth, "ignoring duplicate moveAz to the current position");
            return Ok(0.0);
        }

        let velocity = self.velocity(tai);
        let target = position + angle_diff(azimuth, wrap_angle(position));
        self.profile = MotionProfile::new_move(position, velocity, target, az_rate, self.limits);
        self.profile_start_tai = tai;
        self.goal = Goal::Move;
        self.resting_state = MotionState::Stopped;
        self.position_commanded = wrap_angle(azimuth);
        self.velocity_commanded = az_rate;
        self.begin_motion_aux(tai);
        debug!(azimuth, az_rate, "moveAz accepted");
        Ok(self.profile.duration())
    }

    /// Crawl at the signed `az_rate` [rad/s] with no target position.
    pub fn crawl_az(&mut self, az_rate: f64, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        if az_rate.abs() > self.limits.vmax {
            return Err(LlcError::InvalidParameter {
                name: "azRate",
                reason: "crawl velocity exceeds vmax",
            });
        }
        let position = self.unwrapped_position(tai);
        let velocity = self.velocity(tai);
        self.profile = MotionProfile::new_crawl(position, velocity, az_rate, self.limits);
        self.profile_start_tai = tai;
        self.goal = Goal::Crawl;
        self.resting_state = MotionState::Stopped;
        self.velocity_commanded = az_rate;
        self.begin_motion_aux(tai);
        Ok(self.profile.duration())
    }

    /// Stop all azimuth motion.
    pub fn stop_az(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        self.enter_stop(Goal::Stop, MotionState::Stopped, tai);
        Ok(self.profile.duration())
    }

    /// Stop azimuth motion, engage the brakes and inflate the seal.
    pub fn go_stationary(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        self.enter_stop(Goal::GoStationary, MotionState::Stationary, tai);
        Ok(self.profile.duration())
    }

    fn enter_stop(&mut self, goal: Goal, resting: MotionState, tai: f64) {
        let position = self.unwrapped_position(tai);
        let velocity = self.velocity(tai);
        self.profile = MotionProfile::new_stop(position, velocity, self.limits);
        self.profile_start_tai = tai;
        self.goal = goal;
        self.resting_state = resting;
        self.position_commanded = wrap_angle(position);
        self.velocity_commanded = 0.0;
    }

    /// Park the dome by moving it to azimuth 0.
    pub fn park(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        let position = self.unwrapped_position(tai);
        let velocity = self.velocity(tai);
        let target = position + angle_diff(PARK_POSITION, wrap_angle(position));
        self.profile = MotionProfile::new_move(position, velocity, target, 0.0, self.limits);
        self.profile_start_tai = tai;
        self.goal = Goal::Park;
        self.resting_state = MotionState::Parked;
        self.position_commanded = PARK_POSITION;
        self.velocity_commanded = 0.0;
        self.begin_motion_aux(tai);
        Ok(self.profile.duration())
    }

    /// Take the current position as azimuth zero. Only allowed at rest.
    pub fn set_zero_az(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        let state = self.motion_state(tai);
        if !matches!(
            state,
            MotionState::Parked | MotionState::Stationary | MotionState::Stopped
        ) {
            return Err(LlcError::InvalidState { state });
        }
        self.profile = MotionProfile::hold(0.0);
        self.profile_start_tai = tai;
        self.position_commanded = 0.0;
        self.velocity_commanded = 0.0;
        Ok(0.0)
    }

    /// Reset the flagged drives; 1 means reset, 0 means leave as-is.
    pub fn reset_drives(&mut self, reset: &[i64], tai: f64) -> Result<f64, LlcError> {
        let _ = tai;
        for (drive, &value) in self.drives_in_error.iter_mut().zip(reset.iter()) {
            if value == 1 {
                *drive = false;
            }
        }
        Ok(0.0)
    }

    /// Clear the fault state. Refused while any drive is still flagged.
    pub fn exit_fault(&mut self, tai: f64) -> Result<f64, LlcError> {
        if self.drives_in_error.iter().any(|&d| d) {
            return Err(LlcError::DrivesInError);
        }
        if self.in_error {
            self.profile = MotionProfile::hold(self.error_position);
            self.profile_start_tai = tai;
            self.goal = Goal::GoStationary;
            self.resting_state = MotionState::Stationary;
            self.position_commanded = wrap_angle(self.error_position);
            self.velocity_commanded = 0.0;
            self.in_error = false;
            self.messages = default_messages();
        }
        Ok(0.0)
    }

    /// Inflate or deflate the inflatable seal.
    pub fn inflate(&mut self, action: OnOff, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        match action {
            OnOff::On => {
                if self.seal != SealState::Inflated {
                    self.seal = SealState::Inflating;
                    self.seal_until = tai + SEAL_TRANSITION_DURATION;
                }
            }
            OnOff::Off => {
                if self.seal != SealState::Deflated {
                    self.seal = SealState::Deflating;
                    self.seal_until = tai + SEAL_TRANSITION_DURATION;
                }
            }
        }
        Ok(SEAL_TRANSITION_DURATION)
    }

    /// Start a configuration cycle. All non-status commands are rejected
    /// until the cycle completes.
    pub fn begin_configuring(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        self.configuring_until = tai + CONFIG_DURATION;
        Ok(CONFIG_DURATION)
    }

    /// Apply a validated batch of kinematic limits.
    pub fn apply_limits(&mut self, limits: MotionLimits) {
        self.limits = limits;
        self.config_error = None;
    }

    /// Record a rejected configuration batch; the failure surfaces via the
    /// next status reply.
    pub fn record_config_error(&mut self, description: &str) {
        self.config_error = Some(StatusMessage::new(CONFIG_ERROR_CODE, description));
    }

    /// Restore the default configuration.
    pub fn restore(&mut self) {
        self.limits = config::default_limits(LlcName::Amcs)
            .expect("AMCS has a configuration limit table");
        self.config_error = None;
    }

    pub fn limits(&self) -> MotionLimits {
        self.limits
    }

    /// Put the subsystem into fault state with the given drives flagged.
    /// Not reachable via a protocol command; used for fault injection.
    pub fn set_fault(&mut self, drives_in_error: &[i64], tai: f64) {
        self.error_position = self.unwrapped_position(tai);
        for (drive, &value) in self.drives_in_error.iter_mut().zip(drives_in_error.iter()) {
            if value == 1 {
                *drive = true;
            }
        }
        self.in_error = true;
        self.messages = fault_messages();
    }

    pub fn drives_in_error(&self) -> &[bool; NUM_MOTORS] {
        &self.drives_in_error
    }

    /// Determine the full status payload at the given time.
    pub fn determine_status(&mut self, tai: f64) -> AmcsStatus {
        self.advance(tai);
        let state = self.motion_state(tai);
        let per_motor_current = match state {
            MotionState::Moving | MotionState::Parking => CURRENT_PER_MOTOR_MOVING,
            MotionState::Crawling => CURRENT_PER_MOTOR_CRAWLING,
            _ => 0.0,
        };
        let mut messages = self.messages.clone();
        if let Some(config_error) = &self.config_error {
            messages.push(config_error.clone());
        }
        let position = self.position(tai);
        AmcsStatus {
            status: AmcsStatusHeader {
                messages,
                status: state,
                seal_state: self.seal,
                brake_state: self.brakes,
                locking_pins: self.locking_pins,
                motor_power: self.motor_power,
                operational_mode: self.operational_mode,
            },
            position_actual: position,
            position_commanded: self.position_commanded,
            velocity_actual: self.velocity(tai),
            velocity_commanded: self.velocity_commanded,
            drive_torque_actual: [0.0; NUM_MOTORS],
            drive_torque_commanded: [0.0; NUM_MOTORS],
            drive_current_actual: [per_motor_current; NUM_MOTORS],
            drive_temperature: self.drive_temperature,
            encoder_head_raw: [position; NUM_ENCODERS],
            encoder_head_calibrated: [position; NUM_ENCODERS],
            applied_configuration: self.limits.into(),
            timestamp_utc: tai,
        }
    }
}

impl Llc for Amcs {
    fn name(&self) -> LlcName {
        LlcName::Amcs
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
}
