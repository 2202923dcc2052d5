//! Config Module
//!
//! Simulation parameters, with JSON loading and validation.

pub mod world_config;

pub use world_config::{BroadPhaseConfig, ConfigError, WorldConfig};
