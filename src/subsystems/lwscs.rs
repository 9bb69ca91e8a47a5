//! Light and Wind Screen Control System.
//!
//! Elevation analog of the azimuth drive without the seal, brake and parking
//! machinery. The elevation range is [0, pi/2]; a crawl that reaches a range
//! boundary holds there.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config;
use crate::motion::{MotionLimits, MotionProfile};

use super::{
    default_messages, fault_messages, Llc, LlcError, LlcName, MotionState, OperationalMode,
    StatusMessage, DOME_VOLTAGE,
};

/// The number of light/wind screen drives.
pub const NUM_MOTORS: usize = 2;

/// Elevation range [rad].
pub const MIN_POSITION: f64 = 0.0;
pub const MAX_POSITION: f64 = std::f64::consts::FRAC_PI_2;

/// Maximum power draw of the light/wind screen [kW].
pub const LWS_POWER_DRAW_KW: f64 = 67.5;

/// Simulated duration of a configuration cycle [s].
pub const CONFIG_DURATION: f64 = 2.0;

const CONFIG_ERROR_CODE: i64 = 2001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Goal {
    Move,
    Crawl,
    Stop,
    GoStationary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LwscsStatusHeader {
    pub messages: Vec<StatusMessage>,
    pub status: MotionState,
    pub operational_mode: OperationalMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LwscsStatus {
    pub status: LwscsStatusHeader,
    pub position_actual: f64,
    pub position_commanded: f64,
    pub velocity_actual: f64,
    pub velocity_commanded: f64,
    pub drive_torque_actual: [f64; NUM_MOTORS],
    pub drive_torque_commanded: [f64; NUM_MOTORS],
    pub drive_current_actual: [f64; NUM_MOTORS],
    pub drive_temperature: [f64; NUM_MOTORS],
    pub power_draw: f64,
    pub applied_configuration: super::amcs::AppliedConfiguration,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: f64,
}

#[derive(Debug)]
pub struct Lwscs {
    limits: MotionLimits,
    profile: MotionProfile,
    profile_start_tai: f64,
    goal: Goal,
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
}

impl Lwscs {
    pub fn new(start_tai: f64) -> Self {
        Self {
            limits: config::default_limits(LlcName::Lwscs)
                .expect("LWSCS has a configuration limit table"),
            profile: MotionProfile::hold(MIN_POSITION),
            profile_start_tai: start_tai,
            goal: Goal::Stop,
            resting_state: MotionState::Stopped,
            position_commanded: MIN_POSITION,
            velocity_commanded: 0.0,
            operational_mode: OperationalMode::Normal,
            messages: default_messages(),
            config_error: None,
            configuring_until: 0.0,
            in_error: false,
            error_position: 0.0,
            drives_in_error: [false; NUM_MOTORS],
        }
    }

    /// Raw profile sample clamped to the elevation range. The boolean is
    /// true when the raw position lies outside the range (crawl ran into a
    /// boundary).
    fn clamped_sample(&self, tai: f64) -> (f64, f64, bool) {
        let sample = self.profile.sample(tai - self.profile_start_tai);
        if sample.position < MIN_POSITION {
            (MIN_POSITION, 0.0, true)
        } else if sample.position > MAX_POSITION {
            (MAX_POSITION, 0.0, true)
        } else {
            (sample.position, sample.velocity, false)
        }
    }

    pub fn motion_state(&self, tai: f64) -> MotionState {
        if self.in_error {
            return MotionState::Error;
        }
        if tai < self.configuring_until {
            return MotionState::Configuring;
        }
        let (_, _, at_boundary) = self.clamped_sample(tai);
        if at_boundary {
            return MotionState::Stopped;
        }
        let t = tai - self.profile_start_tai;
        if t < self.profile.duration() {
            match self.goal {
                Goal::Stop | Goal::GoStationary => MotionState::Stopping,
                Goal::Crawl => MotionState::Crawling,
                Goal::Move => MotionState::Moving,
            }
        } else if self.profile.crawl_velocity().is_some() {
            MotionState::Crawling
        } else {
            self.resting_state
        }
    }

    pub fn position(&self, tai: f64) -> f64 {
        if self.in_error {
            return self.error_position;
        }
        self.clamped_sample(tai).0
    }

    pub fn velocity(&self, tai: f64) -> f64 {
        if self.in_error {
            return 0.0;
        }
        self.clamped_sample(tai).1
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

    /// Move the screen to `elevation` [rad].
    pub fn move_el(&mut self, elevation: f64, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        if !(MIN_POSITION..=MAX_POSITION).contains(&elevation) {
            return Err(LlcError::PositionOutOfRange {
                position: elevation,
                min: MIN_POSITION,
                max: MAX_POSITION,
            });
        }
        let (position, velocity, _) = self.clamped_sample(tai);
        self.profile = MotionProfile::new_move(position, velocity, elevation, 0.0, self.limits);
        self.profile_start_tai = tai;
        self.goal = Goal::Move;
        self.resting_state = MotionState::Stopped;
        self.position_commanded = elevation;
        self.velocity_commanded = 0.0;
        debug!(elevation, "moveEl accepted");
        Ok(self.profile.duration())
    }

    /// Crawl at the signed `el_rate` [rad/s].
    pub fn crawl_el(&mut self, el_rate: f64, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        if el_rate.abs() > self.limits.vmax {
            return Err(LlcError::InvalidParameter {
                name: "elRate",
                reason: "crawl velocity exceeds vmax",
            });
        }
        let (position, velocity, _) = self.clamped_sample(tai);
        self.profile = MotionProfile::new_crawl(position, velocity, el_rate, self.limits);
        self.profile_start_tai = tai;
        self.goal = Goal::Crawl;
        self.resting_state = MotionState::Stopped;
        self.velocity_commanded = el_rate;
        Ok(self.profile.duration())
    }

    /// Stop all screen motion.
    pub fn stop_el(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        self.enter_stop(Goal::Stop, MotionState::Stopped, tai);
        Ok(self.profile.duration())
    }

    /// Stop screen motion and engage the brakes.
    pub fn go_stationary(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        self.enter_stop(Goal::GoStationary, MotionState::Stationary, tai);
        Ok(self.profile.duration())
    }

    fn enter_stop(&mut self, goal: Goal, resting: MotionState, tai: f64) {
        let (position, velocity, _) = self.clamped_sample(tai);
        self.profile = MotionProfile::new_stop(position, velocity, self.limits);
        self.profile_start_tai = tai;
        self.goal = goal;
        self.resting_state = resting;
        self.position_commanded = position.clamp(MIN_POSITION, MAX_POSITION);
        self.velocity_commanded = 0.0;
    }

    /// Clear the fault state.
    pub fn exit_fault(&mut self, tai: f64) -> Result<f64, LlcError> {
        if self.drives_in_error.iter().any(|&d| d) {
            return Err(LlcError::DrivesInError);
        }
        if self.in_error {
            self.profile = MotionProfile::hold(self.error_position);
            self.profile_start_tai = tai;
            self.goal = Goal::GoStationary;
            self.resting_state = MotionState::Stationary;
            self.position_commanded = self.error_position;
            self.velocity_commanded = 0.0;
            self.in_error = false;
            self.messages = default_messages();
        }
        Ok(0.0)
    }

    /// Start a configuration cycle.
    pub fn begin_configuring(&mut self, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable(tai)?;
        self.configuring_until = tai + CONFIG_DURATION;
        Ok(CONFIG_DURATION)
    }

    pub fn apply_limits(&mut self, limits: MotionLimits) {
        self.limits = limits;
        self.config_error = None;
    }

    pub fn record_config_error(&mut self, description: &str) {
        self.config_error = Some(StatusMessage::new(CONFIG_ERROR_CODE, description));
    }

    pub fn restore(&mut self) {
        self.limits = config::default_limits(LlcName::Lwscs)
            .expect("LWSCS has a configuration limit table");
        self.config_error = None;
    }

    pub fn limits(&self) -> MotionLimits {
        self.limits
    }

    /// Fault injection hook for tests.
    pub fn set_fault(&mut self, drives_in_error: &[i64], tai: f64) {
        self.error_position = self.position(tai);
        for (drive, &value) in self.drives_in_error.iter_mut().zip(drives_in_error.iter()) {
            if value == 1 {
                *drive = true;
            }
        }
        self.in_error = true;
        self.messages = fault_messages();
    }

    pub fn determine_status(&mut self, tai: f64) -> LwscsStatus {
        let state = self.motion_state(tai);
        let power_draw = self.power_draw_kw(tai);
        let per_motor_current = power_draw * 1000.0 / DOME_VOLTAGE / NUM_MOTORS as f64;
        let mut messages = self.messages.clone();
        if let Some(config_error) = &self.config_error {
            messages.push(config_error.clone());
        }
        LwscsStatus {
            status: LwscsStatusHeader {
                messages,
                status: state,
                operational_mode: self.operational_mode,
            },
            position_actual: self.position(tai),
            position_commanded: self.position_commanded,
            velocity_actual: self.velocity(tai),
            velocity_commanded: self.velocity_commanded,
            drive_torque_actual: [0.0; NUM_MOTORS],
            drive_torque_commanded: [0.0; NUM_MOTORS],
            drive_current_actual: [per_motor_current; NUM_MOTORS],
            drive_temperature: [20.0; NUM_MOTORS],
            power_draw,
            applied_configuration: self.limits.into(),
            timestamp_utc: tai,
        }
    }
}

impl Llc for Lwscs {
    fn name(&self) -> LlcName {
        LlcName::Lwscs
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
        match self.motion_state(tai) {
            MotionState::Moving | MotionState::Crawling | MotionState::Stopping => {
                LWS_POWER_DRAW_KW
            }
            _ => 0.0,
        }
    }
}
