//! Monitoring Control System.
//!
//! Read-only interface to the dome interlock system: reports NORMAL or
//! ALARM based on injected interlock conditions together with the raw
//! sensor channels.

use serde::{Deserialize, Serialize};

use super::{
    default_messages, Llc, LlcName, OperationalMode, StatusMessage,
};

/// The number of interlock sensor channels.
pub const NUM_MON_SENSORS: usize = 16;

/// Interlock state reported by the monitoring system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterlockState {
    Normal,
    Alarm,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoncsStatusHeader {
    pub messages: Vec<StatusMessage>,
    pub status: InterlockState,
    pub operational_mode: OperationalMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoncsStatus {
    pub status: MoncsStatusHeader,
    pub data: [f64; NUM_MON_SENSORS],
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: f64,
}

#[derive(Debug)]
pub struct Moncs {
    state: InterlockState,
    data: [f64; NUM_MON_SENSORS],
    operational_mode: OperationalMode,
    messages: Vec<StatusMessage>,
}

impl Moncs {
    pub fn new() -> Self {
        Self {
            state: InterlockState::Normal,
            data: [0.0; NUM_MON_SENSORS],
            operational_mode: OperationalMode::Normal,
            messages: default_messages(),
        }
    }

    pub fn interlock_state(&self) -> InterlockState {
        self.state
    }

    /// Raise an interlock alarm on the given sensor channel. Fault injection
    /// hook; there is no protocol command for this.
    pub fn raise_alarm(&mut self, channel: usize, code: i64, description: &str) {
        if channel < NUM_MON_SENSORS {
            self.data[channel] = 1.0;
        }
        self.state = InterlockState::Alarm;
        self.messages = vec![StatusMessage::new(code, description)];
    }

    /// Clear all interlock conditions.
    pub fn exit_fault(&mut self, tai: f64) -> Result<f64, super::LlcError> {
        let _ = tai;
        self.state = InterlockState::Normal;
        self.data = [0.0; NUM_MON_SENSORS];
        self.messages = default_messages();
        Ok(0.0)
    }

    pub fn determine_status(&mut self, tai: f64) -> MoncsStatus {
        MoncsStatus {
            status: MoncsStatusHeader {
                messages: self.messages.clone(),
                status: self.state,
                operational_mode: self.operational_mode,
            },
            data: self.data,
            timestamp_utc: tai,
        }
    }
}

impl Default for Moncs {
    fn default() -> Self {
        Self::new()
    }
}

impl Llc for Moncs {
    fn name(&self) -> LlcName {
        LlcName::Moncs
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
