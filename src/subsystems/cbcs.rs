//! Capacitor Bank Control System.
//!
//! Read-only telemetry for the capacitor banks on the rotating part: DC bus
//! voltage, charge state and the discrete health flags.

use serde::{Deserialize, Serialize};

use super::{default_messages, Llc, LlcName, OperationalMode, StatusMessage};

/// The number of capacitor banks.
pub const NUM_CAPACITOR_BANKS: usize = 2;

/// Nominal DC bus voltage [V].
pub const NOMINAL_DC_BUS_VOLTAGE: f64 = 700.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CbcsStatusHeader {
    pub messages: Vec<StatusMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CbcsStatus {
    pub status: CbcsStatusHeader,
    pub dc_bus_voltage: f64,
    pub capacitor_charge: [f64; NUM_CAPACITOR_BANKS],
    pub fuse_intervention: [bool; NUM_CAPACITOR_BANKS],
    pub smoke_detected: [bool; NUM_CAPACITOR_BANKS],
    pub high_temperature: [bool; NUM_CAPACITOR_BANKS],
    pub low_residual_voltage: [bool; NUM_CAPACITOR_BANKS],
    pub door_open: [bool; NUM_CAPACITOR_BANKS],
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: f64,
}

#[derive(Debug)]
pub struct Cbcs {
    dc_bus_voltage: f64,
    capacitor_charge: [f64; NUM_CAPACITOR_BANKS],
    fuse_intervention: [bool; NUM_CAPACITOR_BANKS],
    smoke_detected: [bool; NUM_CAPACITOR_BANKS],
    high_temperature: [bool; NUM_CAPACITOR_BANKS],
    low_residual_voltage: [bool; NUM_CAPACITOR_BANKS],
    door_open: [bool; NUM_CAPACITOR_BANKS],
    operational_mode: OperationalMode,
    messages: Vec<StatusMessage>,
}

impl Cbcs {
    pub fn new() -> Self {
        Self {
            dc_bus_voltage: NOMINAL_DC_BUS_VOLTAGE,
            capacitor_charge: [100.0; NUM_CAPACITOR_BANKS],
            fuse_intervention: [false; NUM_CAPACITOR_BANKS],
            smoke_detected: [false; NUM_CAPACITOR_BANKS],
            high_temperature: [false; NUM_CAPACITOR_BANKS],
            low_residual_voltage: [false; NUM_CAPACITOR_BANKS],
            door_open: [false; NUM_CAPACITOR_BANKS],
            operational_mode: OperationalMode::Normal,
            messages: default_messages(),
        }
    }

    /// Telemetry injection hook for tests.
    pub fn set_bank_health(&mut self, bank: usize, charge: f64, low_residual_voltage: bool) {
        if bank < NUM_CAPACITOR_BANKS {
            self.capacitor_charge[bank] = charge.clamp(0.0, 100.0);
            self.low_residual_voltage[bank] = low_residual_voltage;
        }
    }

    pub fn determine_status(&mut self, tai: f64) -> CbcsStatus {
        CbcsStatus {
            status: CbcsStatusHeader {
                messages: self.messages.clone(),
            },
            dc_bus_voltage: self.dc_bus_voltage,
            capacitor_charge: self.capacitor_charge,
            fuse_intervention: self.fuse_intervention,
            smoke_detected: self.smoke_detected,
            high_temperature: self.high_temperature,
            low_residual_voltage: self.low_residual_voltage,
            door_open: self.door_open,
            timestamp_utc: tai,
        }
    }
}

impl Default for Cbcs {
    fn default() -> Self {
        Self::new()
    }
}

impl Llc for Cbcs {
    fn name(&self) -> LlcName {
        LlcName::Cbcs
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
