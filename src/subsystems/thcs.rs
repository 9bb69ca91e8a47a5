//! Thermal Control System.
//!
//! Tracks a commanded dome temperature and the fan state. Setting a
//! temperature holds the SETTING state for a fixed settle time, then the
//! sensors converge to the commanded value. The fans draw slip-ring power
//! and are therefore under power management.

use serde::{Deserialize, Serialize};

use super::{
    default_messages, fault_messages, Llc, LlcError, LlcName, MotionState, OnOff, OperationalMode,
    StatusMessage,
};

/// The number of thermometer channels.
pub const NUM_THERMO_SENSORS: usize = 13;

/// Simulated settle time after a setTemperature command [s].
pub const TEMPERATURE_SETTLE_TIME: f64 = 10.0;

/// Power draw of the fans [kW] while switched on.
pub const FANS_POWER_DRAW_KW: f64 = 25.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThcsStatusHeader {
    pub messages: Vec<StatusMessage>,
    pub status: MotionState,
    pub fans: OnOff,
    pub operational_mode: OperationalMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThcsStatus {
    pub status: ThcsStatusHeader,
    pub temperature: [f64; NUM_THERMO_SENSORS],
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: f64,
}

#[derive(Debug)]
pub struct Thcs {
    start_temperature: f64,
    target_temperature: f64,
    setting_start_tai: f64,
    fans: OnOff,
    operational_mode: OperationalMode,
    messages: Vec<StatusMessage>,
    in_error: bool,
}

impl Thcs {
    pub fn new(start_tai: f64) -> Self {
        Self {
            start_temperature: 0.0,
            target_temperature: 0.0,
            setting_start_tai: start_tai - TEMPERATURE_SETTLE_TIME,
            fans: OnOff::Off,
            operational_mode: OperationalMode::Normal,
            messages: default_messages(),
            in_error: false,
        }
    }

    pub fn motion_state(&self, tai: f64) -> MotionState {
        if self.in_error {
            MotionState::Error
        } else if tai - self.setting_start_tai < TEMPERATURE_SETTLE_TIME {
            MotionState::Setting
        } else {
            MotionState::Stopped
        }
    }

    /// The sensor temperature at the given time: linear convergence from the
    /// previous value to the commanded one over the settle time.
    pub fn temperature(&self, tai: f64) -> f64 {
        let t = (tai - self.setting_start_tai).max(0.0);
        if t >= TEMPERATURE_SETTLE_TIME {
            return self.target_temperature;
        }
        let fraction = t / TEMPERATURE_SETTLE_TIME;
        self.start_temperature + (self.target_temperature - self.start_temperature) * fraction
    }

    pub fn fans_on(&self) -> bool {
        self.fans == OnOff::On
    }

    fn ensure_commandable(&self) -> Result<(), LlcError> {
        if self.in_error {
            return Err(LlcError::InvalidState {
                state: MotionState::Error,
            });
        }
        Ok(())
    }

    /// Set the preferred temperature [C] in the dome.
    pub fn set_temperature(&mut self, temperature: f64, tai: f64) -> Result<f64, LlcError> {
        self.ensure_commandable()?;
        self.start_temperature = self.temperature(tai);
        self.target_temperature = temperature;
        self.setting_start_tai = tai;
        Ok(TEMPERATURE_SETTLE_TIME)
    }

    /// Switch the dome fans on or off.
    pub fn fans(&mut self, action: OnOff, tai: f64) -> Result<f64, LlcError> {
        let _ = tai;
        self.ensure_commandable()?;
        self.fans = action;
        Ok(0.0)
    }

    /// Clear the fault state.
    pub fn exit_fault(&mut self, tai: f64) -> Result<f64, LlcError> {
        let _ = tai;
        if self.in_error {
            self.in_error = false;
            self.messages = default_messages();
        }
        Ok(0.0)
    }

    /// Fault injection hook for tests. Faulting switches the fans off.
    pub fn set_fault(&mut self) {
        self.fans = OnOff::Off;
        self.in_error = true;
        self.messages = fault_messages();
    }

    pub fn determine_status(&mut self, tai: f64) -> ThcsStatus {
        ThcsStatus {
            status: ThcsStatusHeader {
                messages: self.messages.clone(),
                status: self.motion_state(tai),
                fans: self.fans,
                operational_mode: self.operational_mode,
            },
            temperature: [self.temperature(tai); NUM_THERMO_SENSORS],
            timestamp_utc: tai,
        }
    }
}

impl Llc for Thcs {
    fn name(&self) -> LlcName {
        LlcName::Thcs
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

    fn power_draw_kw(&self, _tai: f64) -> f64 {
        if self.fans == OnOff::On {
            FANS_POWER_DRAW_KW
        } else {
            0.0
        }
    }
}
