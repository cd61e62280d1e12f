//! Preset (scene configuration) (de)serialization (§6.3).
//!
//! Plain `serde`/`serde_json` (de)serialization, the same approach
//! `sequence.rs` uses for the other §6.3 document.

use crate::boundary::{BoundaryShape, CollisionMode};
use crate::error::ConfigError;
use crate::forcefield::{FalloffMode, ForceField, ForceFieldKind};
use crate::material::MaterialKind;
use crate::uniforms::{GravityMode, TransferMode};
use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SimulationFields {
    #[serde(rename = "transferMode")]
    pub transfer_mode: String,
    #[serde(rename = "flipRatio")]
    pub flip_ratio: f32,
    #[serde(rename = "vorticityEnabled")]
    pub vorticity_enabled: bool,
    #[serde(rename = "vorticityEpsilon")]
    pub vorticity_epsilon: f32,
    #[serde(rename = "sparseGrid")]
    pub sparse_grid: bool,
    #[serde(rename = "adaptiveTimestep")]
    pub adaptive_timestep: bool,
    #[serde(rename = "cflTarget")]
    pub cfl_target: f32,
    #[serde(rename = "gravityMode")]
    pub gravity_mode: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticlesField {
    pub count: u32,
    #[serde(rename = "defaultMaterial")]
    pub default_material: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialEntry {
    pub name: String,
    pub density: f32,
    pub stiffness: f32,
    pub viscosity: f32,
    pub friction: f32,
    pub cohesion: f32,
    pub elasticity: f32,
    #[serde(rename = "baseColor")]
    pub base_color: [f32; 3],
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForceFieldEntry {
    pub kind: String,
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub strength: f32,
    pub radius: f32,
    #[serde(rename = "falloffMode")]
    pub falloff_mode: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmitterEntry {
    pub kind: String,
    pub pattern: String,
    pub position: [f32; 3],
    pub direction: [f32; 3],
    pub rate: f32,
    pub velocity: f32,
    pub lifetime: f32,
    #[serde(rename = "materialType")]
    pub material_type: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoundariesField {
    pub shape: String,
    pub enabled: bool,
    pub stiffness: f32,
    pub restitution: f32,
    pub friction: f32,
    #[serde(rename = "collisionMode")]
    pub collision_mode: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AudioMacrosField {
    pub intensity: f32,
    pub chaos: f32,
    pub smoothness: f32,
    pub responsiveness: f32,
    pub density: f32,
    pub energy: f32,
    pub coherence: f32,
    pub complexity: f32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresetMetadata {
    pub name: String,
    #[serde(rename = "createdAt")]
    pub created_at: u64,
}

/// §6.3 `Preset` document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresetFile {
    pub version: u32,
    pub simulation: SimulationFields,
    pub particles: ParticlesField,
    pub materials: Vec<MaterialEntry>,
    #[serde(rename = "forceFields")]
    pub force_fields: Vec<ForceFieldEntry>,
    pub emitters: Vec<EmitterEntry>,
    pub boundaries: BoundariesField,
    #[serde(rename = "audioMacros")]
    pub audio_macros: AudioMacrosField,
    pub metadata: PresetMetadata,
}

impl PresetFile {
    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(ConfigError::Deserialize)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(ConfigError::Deserialize)
    }
}

/// A resolved, in-engine preset: `EngineConfig` plus the collections that
/// `EngineConfig` itself doesn't own (materials/fields/emitters/boundary).
/// §9: rejected wholesale on the first invalid field, never partially
/// applied.
pub struct ResolvedPreset {
    pub config: crate::config::EngineConfig,
    pub default_material: u32,
    pub force_fields: Vec<ForceField>,
}

impl TryFrom<&PresetFile> for ResolvedPreset {
    type Error = ConfigError;

    fn try_from(file: &PresetFile) -> Result<Self, ConfigError> {
        let transfer_mode = match file.simulation.transfer_mode.as_str() {
            "PIC" => TransferMode::Pic,
            "FLIP" => TransferMode::Flip,
            "Hybrid" => TransferMode::Hybrid,
            other => {
                return Err(ConfigError::InvalidEnum { field: "simulation.transferMode", value: other.to_string() });
            }
        };
        let gravity_mode = match file.simulation.gravity_mode.as_str() {
            "Down" => GravityMode::Down,
            "Center" => GravityMode::Center,
            "Device" => GravityMode::Device,
            "Off" => GravityMode::Off,
            other => {
                return Err(ConfigError::InvalidEnum { field: "simulation.gravityMode", value: other.to_string() });
            }
        };
        let boundary_shape = match file.boundaries.shape.as_str() {
            "None" => BoundaryShape::None,
            "Box" => BoundaryShape::Box,
            "Sphere" => BoundaryShape::Sphere,
            "Tube" => BoundaryShape::Tube,
            "Dodecahedron" => BoundaryShape::Dodecahedron,
            other => return Err(ConfigError::InvalidEnum { field: "boundaries.shape", value: other.to_string() }),
        };
        let collision_mode = match file.boundaries.collision_mode.as_str() {
            "Reflect" => CollisionMode::Reflect,
            "Clamp" => CollisionMode::Clamp,
            "Wrap" => CollisionMode::Wrap,
            "Kill" => CollisionMode::Kill,
            other => {
                return Err(ConfigError::InvalidEnum { field: "boundaries.collisionMode", value: other.to_string() });
            }
        };

        if file.particles.default_material as usize >= crate::material::MATERIAL_COUNT {
            return Err(ConfigError::OutOfRange {
                field: "particles.defaultMaterial",
                value: file.particles.default_material as f64,
                min: 0.0,
                max: (crate::material::MATERIAL_COUNT - 1) as f64,
            });
        }

        let mut force_fields = Vec::with_capacity(file.force_fields.len());
        for entry in &file.force_fields {
            let kind = match entry.kind.as_str() {
                "Attractor" => ForceFieldKind::Attractor,
                "Repeller" => ForceFieldKind::Repeller,
                "Vortex" => ForceFieldKind::Vortex,
                "Turbulence" => ForceFieldKind::Turbulence,
                "Directional" => ForceFieldKind::Directional,
                "VortexTube" => ForceFieldKind::VortexTube,
                "Spherical" => ForceFieldKind::Spherical,
                "CurlNoise" => ForceFieldKind::CurlNoise,
                other => return Err(ConfigError::InvalidEnum { field: "forceFields[].kind", value: other.to_string() }),
            };
            let falloff = match entry.falloff_mode.as_str() {
                "Constant" => FalloffMode::Constant,
                "Linear" => FalloffMode::Linear,
                "Quadratic" => FalloffMode::Quadratic,
                "SmoothHermite" => FalloffMode::SmoothHermite,
                other => {
                    return Err(ConfigError::InvalidEnum { field: "forceFields[].falloffMode", value: other.to_string() });
                }
            };
            force_fields.push(ForceField {
                kind,
                position: Vec3::from_array(entry.position),
                direction: Vec3::from_array(entry.direction),
                strength: entry.strength,
                radius: entry.radius,
                falloff,
                axis: Vec3::Y,
            });
        }

        let config = crate::config::EngineConfig {
            transfer_mode,
            flip_ratio: file.simulation.flip_ratio,
            vorticity_enabled: file.simulation.vorticity_enabled,
            vorticity_epsilon: file.simulation.vorticity_epsilon,
            sparse_grid: file.simulation.sparse_grid,
            adaptive_timestep: file.simulation.adaptive_timestep,
            cfl_target: file.simulation.cfl_target,
            gravity_mode,
            particle_count: file.particles.count,
            particle_size: 1.0,
            boundary_shape,
            boundary_enabled: file.boundaries.enabled,
            collision_mode,
            auto_adapt: true,
        };
        config.validate()?;

        Ok(ResolvedPreset { config, default_material: file.particles.default_material, force_fields })
    }
}

/// Maps a material kind to its §6.3 preset name, the inverse of the
/// `TryFrom` string matches above (kept for export round-trips).
pub fn material_kind_name(kind: MaterialKind) -> &'static str {
    match kind {
        MaterialKind::Fluid => "Fluid",
        MaterialKind::Elastic => "Elastic",
        MaterialKind::Sand => "Sand",
        MaterialKind::Snow => "Snow",
        MaterialKind::Foam => "Foam",
        MaterialKind::Viscous => "Viscous",
        MaterialKind::Rigid => "Rigid",
        MaterialKind::Plasma => "Plasma",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> PresetFile {
        PresetFile {
            version: 1,
            simulation: SimulationFields {
                transfer_mode: "Hybrid".into(),
                flip_ratio: 0.95,
                vorticity_enabled: true,
                vorticity_epsilon: 0.1,
                sparse_grid: false,
                adaptive_timestep: true,
                cfl_target: 0.7,
                gravity_mode: "Down".into(),
            },
            particles: ParticlesField { count: 4096, default_material: 0 },
            materials: vec![],
            force_fields: vec![ForceFieldEntry {
                kind: "Attractor".into(),
                position: [0.0, 0.0, 0.0],
                direction: [0.0, 1.0, 0.0],
                strength: 2.0,
                radius: 10.0,
                falloff_mode: "Quadratic".into(),
            }],
            emitters: vec![],
            boundaries: BoundariesField {
                shape: "Box".into(),
                enabled: true,
                stiffness: 50.0,
                restitution: 0.3,
                friction: 0.1,
                collision_mode: "Reflect".into(),
            },
            audio_macros: AudioMacrosField {
                intensity: 0.5, chaos: 0.2, smoothness: 0.5, responsiveness: 0.5,
                density: 0.5, energy: 0.5, coherence: 0.5, complexity: 0.3,
            },
            metadata: PresetMetadata { name: "test".into(), created_at: 0 },
        }
    }

    #[test]
    fn round_trips_through_json() {
        let file = sample_file();
        let json = file.to_json().unwrap();
        let back = PresetFile::from_json(&json).unwrap();
        assert_eq!(back.simulation.transfer_mode, "Hybrid");
        assert_eq!(back.force_fields.len(), 1);
    }

    #[test]
    fn resolves_into_engine_config() {
        let file = sample_file();
        let resolved = ResolvedPreset::try_from(&file).unwrap();
        assert_eq!(resolved.config.transfer_mode, TransferMode::Hybrid);
        assert_eq!(resolved.force_fields.len(), 1);
    }

    #[test]
    fn unknown_enum_is_rejected() {
        let mut file = sample_file();
        file.simulation.transfer_mode = "Bogus".into();
        assert!(matches!(ResolvedPreset::try_from(&file), Err(ConfigError::InvalidEnum { .. })));
    }

    #[test]
    fn out_of_range_default_material_is_rejected() {
        let mut file = sample_file();
        file.particles.default_material = 99;
        assert!(ResolvedPreset::try_from(&file).is_err());
    }
}
