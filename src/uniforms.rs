//! The dense per-frame uniform block `U` (§4.H "Final output of the
//! mapper", consumed by the solver and renderer).
//!
//! The schema is fixed and known up front, so this is one concrete
//! `#[repr(C)] Pod` struct rather than a dynamic name/value registry, with
//! manual std140-style byte packing (explicit padding, 16-byte rounding).

use bytemuck::{Pod, Zeroable};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum TransferMode {
    Pic = 0,
    Flip = 1,
    Hybrid = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum GravityMode {
    Down = 0,
    Center = 1,
    Device = 2,
    Off = 3,
}

/// Global, non-per-particle portion of `U` (§4.H "Global:" list).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GlobalUniforms {
    pub dt: f32,
    pub substep_count: u32,
    pub gravity_mode: u32,
    pub flip_ratio: f32,
    pub transfer_mode: u32,
    pub vorticity_enabled: u32,
    pub vorticity_epsilon: f32,
    pub sparse_grid: u32,
    pub gravity_vector: [f32; 3],
    pub grid_size: f32,
    // Audio drive (§4.H "Audio drive:" list).
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub beat_pulse: f32,
    pub flux: f32,
    pub stereo_balance: f32,
    pub energy: f32,
    pub anticipation: f32,
    pub force_field_count: u32,
    /// Camera-aware dynamics (§4.H step 3): `(lateral, vertical,
    /// approach_retreat)`, applied in G2P as a uniform additive force scaled
    /// per-particle by the depth-layer force multiplier.
    pub camera_force: [f32; 3],
}

pub const GLOBAL_UNIFORMS_WGSL_STRUCT: &str = r#"
struct GlobalUniforms {
    dt: f32,
    substep_count: u32,
    gravity_mode: u32,
    flip_ratio: f32,
    transfer_mode: u32,
    vorticity_enabled: u32,
    vorticity_epsilon: f32,
    sparse_grid: u32,
    gravity_vector: vec3<f32>,
    grid_size: f32,
    bass: f32,
    mid: f32,
    treble: f32,
    beat_pulse: f32,
    flux: f32,
    stereo_balance: f32,
    energy: f32,
    anticipation: f32,
    force_field_count: u32,
    camera_force: vec3<f32>,
};
"#;

/// Per-particle mapper output (§4.H "Per-particle (SoA):" list), uploaded
/// as a parallel storage buffer indexed by particle id. Kept distinct from
/// `ParticleGpu` because it is written exclusively by the mapper (CPU) while
/// `ParticleGpu` is written exclusively by the solver kernels (§9: no two
/// components hold mutable references to the same buffer).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PerParticleMapperGpu {
    pub role: u32,
    pub personality_primary: u32,
    pub personality_secondary: u32,
    pub personality_blend: f32,
    pub gesture_kind: [u32; 3],
    pub gesture_phase: [f32; 3],
    pub gesture_intensity: [f32; 3],
    pub layer: u32,
    pub macro_force_scale: f32,
    pub macro_speed_scale: f32,
    /// Formation attraction target in grid space, and the spring strength
    /// toward it (§4.H step 2) — for Support particles within follow range
    /// this is the delayed nearest-Lead position instead of the formation
    /// offset.
    pub formation_target: [f32; 3],
    pub formation_strength: f32,
    /// `(brightness, saturation)` from `DepthLayer::visual_scalars` (§4.H
    /// step 3), folded into particle color in G2P.
    pub visual_brightness: f32,
    pub visual_saturation: f32,
    /// `(scale, opacity)` from the same scalars, passed through unused by
    /// the solver for the external renderer to apply per-particle.
    pub visual_scale: f32,
    pub visual_opacity: f32,
}

pub const PER_PARTICLE_MAPPER_WGSL_STRUCT: &str = r#"
struct PerParticleMapper {
    role: u32,
    personality_primary: u32,
    personality_secondary: u32,
    personality_blend: f32,
    gesture_kind: vec3<u32>,
    gesture_phase: vec3<f32>,
    gesture_intensity: vec3<f32>,
    layer: u32,
    macro_force_scale: f32,
    macro_speed_scale: f32,
    formation_target: vec3<f32>,
    formation_strength: f32,
    visual_brightness: f32,
    visual_saturation: f32,
    visual_scale: f32,
    visual_opacity: f32,
};
"#;

/// Rounds a byte count up to the 16-byte alignment `wgpu` uniform buffers
/// require.
pub fn round_to_16(size: usize) -> usize {
    (size + 15) & !15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_to_16_rounds_up() {
        assert_eq!(round_to_16(1), 16);
        assert_eq!(round_to_16(16), 16);
        assert_eq!(round_to_16(17), 32);
    }

    #[test]
    fn global_uniforms_size_is_multiple_of_4() {
        assert_eq!(std::mem::size_of::<GlobalUniforms>() % 4, 0);
    }
}
