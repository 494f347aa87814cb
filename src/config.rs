//! Per-session rig configuration.
//!
//! The host application loads and validates its settings, then hands
//! the core an immutable `RigConfig` value scoped to one session —
//! there is no process-global settings state in this crate.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matrix::TIMER_EVENT;

/// Which device channel implementation to connect.
///
/// Hardware link types live with their drivers, outside this crate; the
/// core ships an in-process simulator and a no-op dummy server.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServerType {
    /// In-process controller that executes the uploaded table.
    Simulator,
    /// Accepts every command, never reports events. For wiring tests
    /// and dry runs.
    Dummy,
}

/// Errors raised by [`RigConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("poll interval must be positive")]
    ZeroPollInterval,

    #[error("duplicate label '{label}' in the rig vocabulary")]
    DuplicateLabel { label: String },

    #[error("input label '{label}' collides with the reserved timer event")]
    ReservedLabel { label: String },

    #[error("{count} outputs configured but the wire format carries at most 32")]
    TooManyOutputs { count: usize },
}

/// Validated configuration for one experiment session.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use operant::config::{RigConfig, ServerType};
///
/// let config = RigConfig {
///     inputs: vec!["Cin".into(), "Cout".into()],
///     outputs: vec!["CenterWater".into()],
///     server_type: ServerType::Simulator,
///     poll_interval: Duration::from_millis(300),
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigConfig {
    /// Legal input event labels, in column order.
    pub inputs: Vec<String>,
    /// Legal output channel labels, in bitmask order.
    pub outputs: Vec<String>,
    /// Device channel implementation to connect.
    pub server_type: ServerType,
    /// Fixed polling interval.
    pub poll_interval: Duration,
}

impl RigConfig {
    /// Check the invariants the dispatcher and device rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        if let Some(label) = self.inputs.iter().find(|l| *l == TIMER_EVENT) {
            return Err(ConfigError::ReservedLabel {
                label: label.clone(),
            });
        }
        let mut seen = std::collections::BTreeSet::new();
        for label in self.inputs.iter().chain(self.outputs.iter()) {
            if !seen.insert(label.as_str()) {
                return Err(ConfigError::DuplicateLabel {
                    label: label.clone(),
                });
            }
        }
        if self.outputs.len() > 32 {
            return Err(ConfigError::TooManyOutputs {
                count: self.outputs.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RigConfig {
        RigConfig {
            inputs: vec!["Cin".into(), "Lin".into()],
            outputs: vec!["CenterWater".into()],
            server_type: ServerType::Simulator,
            poll_interval: Duration::from_millis(300),
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut c = config();
        c.poll_interval = Duration::ZERO;
        assert_eq!(c.validate(), Err(ConfigError::ZeroPollInterval));
    }

    #[test]
    fn reserved_input_label_is_rejected() {
        let mut c = config();
        c.inputs.push("Tup".into());
        assert!(matches!(
            c.validate(),
            Err(ConfigError::ReservedLabel { .. })
        ));
    }

    #[test]
    fn cross_vocabulary_duplicates_are_rejected() {
        let mut c = config();
        c.outputs.push("Cin".into());
        assert!(matches!(
            c.validate(),
            Err(ConfigError::DuplicateLabel { label }) if label == "Cin"
        ));
    }

    #[test]
    fn oversized_output_vocabulary_is_rejected() {
        let mut c = config();
        c.outputs = (0..33).map(|i| format!("out{i}")).collect();
        assert_eq!(c.validate(), Err(ConfigError::TooManyOutputs { count: 33 }));
    }

    #[test]
    fn server_type_deserializes_from_snake_case() {
        let t: ServerType = serde_json::from_str("\"simulator\"").unwrap();
        assert_eq!(t, ServerType::Simulator);
    }
}
