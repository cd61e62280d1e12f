//! Engine configuration surface (§6.4, §6.6).
//!
//! A plain struct with sensible defaults, validated eagerly rather than
//! field-by-field as it is mutated. Validation returns `ConfigError` per
//! §7 — the core rejects at the boundary, never partially applies.

use crate::boundary::{BoundaryShape, CollisionMode};
use crate::error::ConfigError;
use crate::uniforms::{GravityMode, TransferMode};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub transfer_mode: TransferMode,
    pub flip_ratio: f32,
    pub vorticity_enabled: bool,
    pub vorticity_epsilon: f32,
    pub sparse_grid: bool,
    pub adaptive_timestep: bool,
    pub cfl_target: f32,
    pub gravity_mode: GravityMode,
    pub particle_count: u32,
    pub particle_size: f32,
    pub boundary_shape: BoundaryShape,
    pub boundary_enabled: bool,
    pub collision_mode: CollisionMode,
    pub auto_adapt: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            transfer_mode: TransferMode::Hybrid,
            flip_ratio: 0.95,
            vorticity_enabled: true,
            vorticity_epsilon: 0.0,
            sparse_grid: false,
            adaptive_timestep: true,
            cfl_target: 0.7,
            gravity_mode: GravityMode::Down,
            particle_count: 32_768,
            particle_size: 1.0,
            boundary_shape: BoundaryShape::Box,
            boundary_enabled: true,
            collision_mode: CollisionMode::Reflect,
            auto_adapt: true,
        }
    }
}

impl EngineConfig {
    /// Rejects the whole config on the first violation (§9: no partial
    /// apply). Call before construction and again on every preset import.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("flipRatio", self.flip_ratio as f64, 0.0, 1.0)?;
        check_range("vorticityEpsilon", self.vorticity_epsilon as f64, 0.0, 1.0)?;
        check_range("cflTarget", self.cfl_target as f64, f64::EPSILON, 1.0)?;
        check_range("particleCount", self.particle_count as f64, 1.0, 131_072.0)?;
        check_range("particleSize", self.particle_size as f64, 1e-3, 100.0)?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_flip_ratio_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.flip_ratio = 1.5;
        assert!(matches!(cfg.validate(), Err(ConfigError::OutOfRange { field: "flipRatio", .. })));
    }

    #[test]
    fn zero_cfl_target_is_rejected() {
        let mut cfg = EngineConfig::default();
        cfg.cfl_target = 0.0;
        assert!(cfg.validate().is_err());
    }
}
