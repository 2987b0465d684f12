//! System configuration - root configuration structure.

use heapless::{FnvIndexMap, String};
use serde::Deserialize;

use super::motor::MotorConfig;
use super::timing::{CoordinationConfig, SchedulerConfig};
use crate::hal::MotorId;

/// Root configuration structure from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Named motor configurations.
    pub motors: FnvIndexMap<String<32>, MotorConfig, 8>,

    /// Scheduler tick rates and fault thresholds.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Coordinator thresholds.
    #[serde(default)]
    pub coordination: CoordinationConfig,
}

impl SystemConfig {
    /// Get a motor configuration by name.
    pub fn motor(&self, name: &str) -> Option<&MotorConfig> {
        self.motors
            .iter()
            .find(|(k, _)| k.as_str() == name)
            .map(|(_, v)| v)
    }

    /// Get a motor configuration by id.
    pub fn motor_by_id(&self, id: MotorId) -> Option<&MotorConfig> {
        self.motors.values().find(|m| m.id == id)
    }

    /// List all motor names.
    pub fn motor_names(&self) -> impl Iterator<Item = &str> {
        self.motors.keys().map(|s| s.as_str())
    }

    /// Add a motor under the given key.
    ///
    /// Returns the configuration back if the table is full or the key is too long.
    pub fn insert_motor(&mut self, key: &str, motor: MotorConfig) -> Result<(), MotorConfig> {
        let Ok(key) = String::try_from(key) else {
            return Err(motor);
        };
        self.motors
            .insert(key, motor)
            .map(|_| ())
            .map_err(|(_, motor)| motor)
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            motors: FnvIndexMap::new(),
            scheduler: SchedulerConfig::default(),
            coordination: CoordinationConfig::default(),
        }
    }
}
