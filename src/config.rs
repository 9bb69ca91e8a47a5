//! Configuration parameter limits for the configurable subsystems.
//!
//! The limits are kept as data so parameter changes do not require touching
//! the validation code. A configuration batch is all-or-nothing: every
//! parameter of a system must be present, within range and scalar, or the
//! whole batch is rejected and nothing is applied.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::motion::MotionLimits;
use crate::subsystems::LlcName;

use std::f64::consts::PI;

/// Inclusive range for one configuration parameter.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLimit {
    pub target: &'static str,
    pub min: f64,
    pub max: f64,
}

/// AMCS kinematic limits. The maxima are the vendor-documented values; the
/// defaults equal the maxima.
pub const AMCS_LIMITS: &[ConfigLimit] = &[
    ConfigLimit { target: "jmax", min: 0.0, max: 3.0 * PI / 180.0 },
    ConfigLimit { target: "amax", min: 0.0, max: 0.75 * PI / 180.0 },
    ConfigLimit { target: "vmax", min: 0.0, max: 1.5 * PI / 180.0 },
];

/// LWSCS kinematic limits.
pub const LWSCS_LIMITS: &[ConfigLimit] = &[
    ConfigLimit { target: "jmax", min: 0.0, max: 3.5 * PI / 180.0 },
    ConfigLimit { target: "amax", min: 0.0, max: 0.875 * PI / 180.0 },
    ConfigLimit { target: "vmax", min: 0.0, max: 1.75 * PI / 180.0 },
];

/// One entry of a configuration batch as received on the wire. The setting
/// value is always an array, even for scalar parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSetting {
    pub target: String,
    pub setting: Vec<f64>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("system {0} is not configurable")]
    NotConfigurable(LlcName),
    #[error("configuration parameter {target} is missing from the batch")]
    MissingParameter { target: &'static str },
    #[error("unknown configuration parameter {target}")]
    UnknownParameter { target: String },
    #[error("configuration parameter {target} must hold exactly one value")]
    WrongArity { target: String },
    #[error("value {value} for {target} is outside [{min}, {max}]")]
    OutOfRange {
        target: String,
        value: f64,
        min: f64,
        max: f64,
    },
}

/// The limit table for a configurable system, if it has one.
pub fn limits_for(system: LlcName) -> Option<&'static [ConfigLimit]> {
    match system {
        LlcName::Amcs => Some(AMCS_LIMITS),
        LlcName::Lwscs => Some(LWSCS_LIMITS),
        _ => None,
    }
}

/// Default kinematic limits for a configurable system: the table maxima.
pub fn default_limits(system: LlcName) -> Option<MotionLimits> {
    let table = limits_for(system)?;
    Some(MotionLimits {
        jmax: find(table, "jmax"),
        amax: find(table, "amax"),
        vmax: find(table, "vmax"),
    })
}

fn find(table: &[ConfigLimit], target: &str) -> f64 {
    table
        .iter()
        .find(|l| l.target == target)
        .map(|l| l.max)
        .unwrap_or(0.0)
}

/// Validate a full batch against the table for `system` and, on success,
/// return the kinematic limits it encodes. No value is applied on failure.
pub fn validate_batch(
    system: LlcName,
    settings: &[ConfigSetting],
) -> Result<MotionLimits, ConfigError> {
    let table = limits_for(system).ok_or(ConfigError::NotConfigurable(system))?;

    let mut validated = Vec::with_capacity(table.len());
    for setting in settings {
        let limit = table
            .iter()
            .find(|l| l.target == setting.target)
            .ok_or_else(|| ConfigError::UnknownParameter {
                target: setting.target.clone(),
            })?;
        if setting.setting.len() != 1 {
            return Err(ConfigError::WrongArity {
                target: setting.target.clone(),
            });
        }
        let value = setting.setting[0];
        if !(limit.min..=limit.max).contains(&value) {
            return Err(ConfigError::OutOfRange {
                target: setting.target.clone(),
                value,
                min: limit.min,
                max: limit.max,
            });
        }
        if validated.iter().any(|(t, _)| *t == limit.target) {
            return Err(ConfigError::WrongArity {
                target: setting.target.clone(),
            });
        }
        validated.push((limit.target, value));
    }

    for limit in table {
        if !validated.iter().any(|(t, _)| *t == limit.target) {
            return Err(ConfigError::MissingParameter {
                target: limit.target,
            });
        }
    }

    let get = |target: &str| -> f64 {
        validated
            .iter()
            .find(|(t, _)| *t == target)
            .map(|(_, v)| *v)
            .unwrap_or(0.0)
    };
    Ok(MotionLimits {
        jmax: get("jmax"),
        amax: get("amax"),
        vmax: get("vmax"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_batch(jmax: f64, amax: f64, vmax: f64) -> Vec<ConfigSetting> {
        vec![
            ConfigSetting { target: "jmax".into(), setting: vec![jmax] },
            ConfigSetting { target: "amax".into(), setting: vec![amax] },
            ConfigSetting { target: "vmax".into(), setting: vec![vmax] },
        ]
    }

    #[test]
    fn test_valid_batch_is_accepted() {
        let limits = validate_batch(LlcName::Amcs, &full_batch(0.01, 0.005, 0.02)).unwrap();
        assert_eq!(limits.jmax, 0.01);
        assert_eq!(limits.amax, 0.005);
        assert_eq!(limits.vmax, 0.02);
    }

    #[test]
    fn test_out_of_range_value_rejects_batch() {
        let err = validate_batch(LlcName::Amcs, &full_batch(0.01, 0.005, 99.0)).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_missing_parameter_rejects_batch() {
        let batch = vec![ConfigSetting { target: "vmax".into(), setting: vec![0.01] }];
        let err = validate_batch(LlcName::Amcs, &batch).unwrap_err();
        assert!(matches!(err, ConfigError::MissingParameter { .. }));
    }

    #[test]
    fn test_unknown_parameter_rejects_batch() {
        let mut batch = full_batch(0.01, 0.005, 0.02);
        batch.push(ConfigSetting { target: "wmax".into(), setting: vec![1.0] });
        let err = validate_batch(LlcName::Lwscs, &batch).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownParameter { .. }));
    }

    #[test]
    fn test_non_scalar_setting_rejects_batch() {
        let mut batch = full_batch(0.01, 0.005, 0.02);
        batch[0].setting = vec![0.01, 0.02];
        let err = validate_batch(LlcName::Amcs, &batch).unwrap_err();
        assert!(matches!(err, ConfigError::WrongArity { .. }));
    }

    #[test]
    fn test_only_amcs_and_lwscs_are_configurable() {
        assert!(limits_for(LlcName::Lcs).is_none());
        assert!(limits_for(LlcName::Moncs).is_none());
        assert!(default_limits(LlcName::Amcs).is_some());
        assert!(default_limits(LlcName::Lwscs).is_some());
    }
}
