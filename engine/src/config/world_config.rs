//! World Configuration
//!
//! Simulation parameters for a [`World`](crate::physics::World): gravity,
//! fixed time step, frame clamp, bounding-box margins and the broad-phase
//! strategy. Every field has a default, so a JSON file only needs to list
//! what it changes.

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::physics::broad_phase::aabb_tree::DEFAULT_TREE_MARGIN;
use crate::physics::broad_phase::spatial_hash::DEFAULT_CELL_SIZE;
use crate::physics::collision::CONTACT_EPSILON;

/// Errors from loading or validating a [`WorldConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// A field holds a value the simulation cannot run with.
    InvalidValue { field: &'static str, reason: String },
    /// Standard I/O error.
    Io(std::io::Error),
    /// JSON deserialization error.
    Json(serde_json::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue { field, reason } => write!(f, "invalid {field}: {reason}"),
            ConfigError::Io(e) => write!(f, "IO error: {e}"),
            ConfigError::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidValue { .. } => None,
            ConfigError::Io(e) => Some(e),
            ConfigError::Json(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Which broad-phase strategy the world uses.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BroadPhaseConfig {
    /// Dynamic AABB tree; `margin` pads branches over two leaves
    AabbTree { margin: f32 },
    /// Sort-and-sweep along X
    SweepAndPrune,
    /// Uniform grid with cubic cells of `cell_size` meters
    SpatialHash { cell_size: f32 },
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        BroadPhaseConfig::AabbTree {
            margin: DEFAULT_TREE_MARGIN,
        }
    }
}

/// Central configuration for a physics world.
///
/// `Default` gives earth gravity and a 1 ms physics step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Uniform gravitational acceleration (m/s²)
    pub gravity: Vec3,
    /// Length of one physics sub-step (seconds)
    pub fixed_time_step: f32,
    /// Longest frame delta fed to the accumulator (seconds)
    pub max_frame_time: f32,
    /// Padding added around every body's bounds (meters)
    pub aabb_margin: f32,
    /// Broad-phase strategy
    pub broad_phase: BroadPhaseConfig,
    /// Contacts no deeper than this are treated as touching
    pub contact_epsilon: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            fixed_time_step: 0.001,
            max_frame_time: 0.25,
            aabb_margin: 0.05,
            broad_phase: BroadPhaseConfig::default(),
            contact_epsilon: CONTACT_EPSILON,
        }
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

impl WorldConfig {
    /// Config without gravity.
    pub fn zero_gravity() -> Self {
        Self {
            gravity: Vec3::ZERO,
            ..Default::default()
        }
    }

    /// Builder-style helper for a different gravity.
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_broad_phase(mut self, broad_phase: BroadPhaseConfig) -> Self {
        self.broad_phase = broad_phase;
        self
    }

    /// Parses a JSON document and validates it.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WorldConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks that every field is usable, reporting the first bad one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.gravity.is_finite() {
            return Err(invalid("gravity", "must be finite"));
        }
        if !(self.fixed_time_step.is_finite() && self.fixed_time_step > 0.0) {
            return Err(invalid(
                "fixed_time_step",
                format!("must be positive, got {}", self.fixed_time_step),
            ));
        }
        if !(self.max_frame_time.is_finite() && self.max_frame_time >= self.fixed_time_step) {
            return Err(invalid(
                "max_frame_time",
                format!("must be at least one time step, got {}", self.max_frame_time),
            ));
        }
        if !(self.aabb_margin.is_finite() && self.aabb_margin >= 0.0) {
            return Err(invalid(
                "aabb_margin",
                format!("must not be negative, got {}", self.aabb_margin),
            ));
        }
        if !(self.contact_epsilon.is_finite() && self.contact_epsilon >= 0.0) {
            return Err(invalid(
                "contact_epsilon",
                format!("must not be negative, got {}", self.contact_epsilon),
            ));
        }
        match self.broad_phase {
            BroadPhaseConfig::AabbTree { margin } if !(margin.is_finite() && margin >= 0.0) => Err(
                invalid("broad_phase.margin", format!("must not be negative, got {margin}")),
            ),
            BroadPhaseConfig::SpatialHash { cell_size } if !(cell_size.is_finite() && cell_size > 0.0) => {
                Err(invalid(
                    "broad_phase.cell_size",
                    format!("must be positive, got {cell_size}"),
                ))
            }
            _ => Ok(()),
        }
    }

    /// Copy with every invalid field replaced by its default, logging each
    /// replacement.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let mut config = self.clone();
        // One pass per field at most; a default can still clash with a
        // custom field (a huge time step), so give up after that
        for _ in 0..7 {
            let Err(err) = config.validate() else {
                return config;
            };
            tracing::warn!("{}; using the default", err);
            match err {
                ConfigError::InvalidValue { field, .. } => match field {
                    "gravity" => config.gravity = defaults.gravity,
                    "fixed_time_step" => config.fixed_time_step = defaults.fixed_time_step,
                    "max_frame_time" => config.max_frame_time = defaults.max_frame_time,
                    "aabb_margin" => config.aabb_margin = defaults.aabb_margin,
                    "contact_epsilon" => config.contact_epsilon = defaults.contact_epsilon,
                    "broad_phase.margin" => {
                        config.broad_phase = BroadPhaseConfig::AabbTree {
                            margin: DEFAULT_TREE_MARGIN,
                        }
                    }
                    "broad_phase.cell_size" => {
                        config.broad_phase = BroadPhaseConfig::SpatialHash {
                            cell_size: DEFAULT_CELL_SIZE,
                        }
                    }
                    _ => return defaults,
                },
                _ => return defaults,
            }
        }
        tracing::warn!("config still invalid, using defaults");
        defaults
    }
}
