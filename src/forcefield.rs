//! Force-field array (§3.4, §4.D): up to 16 active fields, uploaded each
//! frame as a uniform array and accumulated per-particle inside G2P.
//!
//! A registry-of-configs -> WGSL-declarations pattern: each field kind
//! carries its own closed-form falloff and force law, frozen into a
//! fixed-size GPU array rather than a diffusible scalar/vector field.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

pub const MAX_FORCE_FIELDS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ForceFieldKind {
    Attractor = 0,
    Repeller = 1,
    Vortex = 2,
    Turbulence = 3,
    Directional = 4,
    VortexTube = 5,
    Spherical = 6,
    CurlNoise = 7,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum FalloffMode {
    Constant = 0,
    Linear = 1,
    Quadratic = 2,
    SmoothHermite = 3,
}

#[derive(Clone, Copy, Debug)]
pub struct ForceField {
    pub kind: ForceFieldKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub strength: f32,
    pub radius: f32,
    pub falloff: FalloffMode,
    pub axis: Vec3,
}

impl ForceField {
    pub fn attractor(position: Vec3, strength: f32, radius: f32) -> Self {
        Self { kind: ForceFieldKind::Attractor, position, direction: Vec3::ZERO, strength, radius, falloff: FalloffMode::Quadratic, axis: Vec3::Y }
    }

    pub fn vortex_tube(position: Vec3, axis: Vec3, strength: f32, radius: f32) -> Self {
        Self { kind: ForceFieldKind::VortexTube, position, direction: Vec3::ZERO, strength, radius, falloff: FalloffMode::Linear, axis }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ForceFieldGpu {
    pub kind: u32,
    pub falloff: u32,
    pub strength: f32,
    pub radius: f32,
    pub position: [f32; 3],
    pub _pad0: f32,
    pub direction: [f32; 3],
    pub _pad1: f32,
    pub axis: [f32; 3],
    pub _pad2: f32,
}

impl From<ForceField> for ForceFieldGpu {
    fn from(f: ForceField) -> Self {
        Self {
            kind: f.kind as u32,
            falloff: f.falloff as u32,
            strength: f.strength,
            radius: f.radius,
            position: f.position.to_array(),
            _pad0: 0.0,
            direction: f.direction.to_array(),
            _pad1: 0.0,
            axis: f.axis.to_array(),
            _pad2: 0.0,
        }
    }
}

pub const FORCE_FIELD_WGSL_STRUCT: &str = r#"
struct ForceField {
    kind: u32,
    falloff: u32,
    strength: f32,
    radius: f32,
    position: vec3<f32>,
    direction: vec3<f32>,
    axis: vec3<f32>,
};
"#;

/// Owned collection on the engine struct (§9: no global singletons). At
/// most `MAX_FORCE_FIELDS` are considered active per frame; extras beyond
/// the cap are simply not uploaded (oldest-first truncation), which is
/// logged once via `tracing` by the orchestrator rather than silently
/// dropped without trace.
#[derive(Clone, Debug, Default)]
pub struct ForceFieldSet {
    fields: Vec<ForceField>,
}

impl ForceFieldSet {
    pub fn push(&mut self, field: ForceField) {
        self.fields.push(field);
    }

    pub fn active(&self) -> &[ForceField] {
        let n = self.fields.len().min(MAX_FORCE_FIELDS);
        &self.fields[..n]
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_gpu_array(&self) -> ([ForceFieldGpu; MAX_FORCE_FIELDS], u32) {
        let mut arr = [ForceFieldGpu::from(ForceField::attractor(Vec3::ZERO, 0.0, 0.0)); MAX_FORCE_FIELDS];
        let active = self.active();
        for (i, f) in active.iter().enumerate() {
            arr[i] = ForceFieldGpu::from(*f);
        }
        (arr, active.len() as u32)
    }
}

/// Falloff curve evaluation, mirrored 1:1 by `FORCE_ACCUMULATION_WGSL`.
pub fn falloff(mode: FalloffMode, dist: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    let t = (dist / radius).clamp(0.0, 1.0);
    match mode {
        FalloffMode::Constant => 1.0,
        FalloffMode::Linear => (1.0 - t).max(0.0),
        FalloffMode::Quadratic => (1.0 - t * t).max(0.0),
        FalloffMode::SmoothHermite => {
            let s = 1.0 - t;
            s * s * (3.0 - 2.0 * s)
        }
    }
}

/// Per-particle accumulation loop over the active-field array, inlined into
/// G2P (§4.D: "bounded loop, length K <= 16"). `num_fields` is a uniform
/// scalar uploaded alongside the array.
pub const FORCE_ACCUMULATION_WGSL: &str = r#"
fn falloff_curve(mode: u32, dist: f32, radius: f32) -> f32 {
    if radius <= 0.0 {
        return 0.0;
    }
    let t = clamp(dist / radius, 0.0, 1.0);
    if mode == 0u {
        return 1.0;
    } else if mode == 1u {
        return max(0.0, 1.0 - t);
    } else if mode == 2u {
        return max(0.0, 1.0 - t * t);
    } else {
        let s = 1.0 - t;
        return s * s * (3.0 - 2.0 * s);
    }
}

fn accumulate_force_fields(position: vec3<f32>, num_fields: u32) -> vec3<f32> {
    var total = vec3<f32>(0.0);
    for (var i = 0u; i < num_fields; i = i + 1u) {
        let f = force_fields[i];
        let to_field = f.position - position;
        let dist = length(to_field);
        let fall = falloff_curve(f.falloff, dist, f.radius);
        var contribution = vec3<f32>(0.0);

        if f.kind == 0u {
            // Attractor
            contribution = normalize(to_field + vec3<f32>(1e-6, 0.0, 0.0)) * f.strength * fall;
        } else if f.kind == 1u {
            // Repeller
            contribution = -normalize(to_field + vec3<f32>(1e-6, 0.0, 0.0)) * f.strength * fall;
        } else if f.kind == 2u {
            // Vortex: tangential force about `axis` through `position` of the field.
            let radial = position - f.position;
            let tangent = cross(f.axis, radial);
            contribution = normalize(tangent + vec3<f32>(1e-6, 0.0, 0.0)) * f.strength * fall;
        } else if f.kind == 3u {
            // Turbulence: curl-noise-like perturbation (uses hash-based pseudo-noise).
            let seed = vec3<u32>(u32(position.x * 97.0), u32(position.y * 97.0), u32(position.z * 97.0));
            contribution = (rand_vec3(hash3(seed))) * f.strength * fall;
        } else if f.kind == 4u {
            // Directional: uniform force in `direction`, falloff by distance from `position`.
            contribution = f.direction * f.strength * fall;
        } else if f.kind == 5u {
            // VortexTube: tangential about `axis`, falloff by radial distance to the tube line.
            let to_line = position - f.position;
            let along = dot(to_line, f.axis) * f.axis;
            let radial = to_line - along;
            let radial_dist = length(radial);
            let fall_tube = falloff_curve(f.falloff, radial_dist, f.radius);
            let tangent = cross(f.axis, radial);
            contribution = normalize(tangent + vec3<f32>(1e-6, 0.0, 0.0)) * f.strength * fall_tube;
        } else if f.kind == 6u {
            // Spherical: radial push/pull scaled by (radius - dist).
            contribution = normalize(to_field + vec3<f32>(1e-6, 0.0, 0.0)) * f.strength * fall * sign(f.strength);
        } else if f.kind == 7u {
            // CurlNoise: divergence-free perturbation via noise gradient cross product.
            let n1 = noise3(position * 0.1 + vec3<f32>(0.0, 0.0, 0.0));
            let n2 = noise3(position * 0.1 + vec3<f32>(31.4, 0.0, 0.0));
            let n3 = noise3(position * 0.1 + vec3<f32>(0.0, 59.2, 0.0));
            contribution = vec3<f32>(n2 - n3, n3 - n1, n1 - n2) * f.strength * fall;
        }

        total += contribution;
    }
    return total;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falloff_constant_is_always_one() {
        assert_eq!(falloff(FalloffMode::Constant, 100.0, 5.0), 1.0);
    }

    #[test]
    fn falloff_linear_reaches_zero_at_radius() {
        assert_eq!(falloff(FalloffMode::Linear, 5.0, 5.0), 0.0);
        assert!(falloff(FalloffMode::Linear, 0.0, 5.0) > 0.99);
    }

    #[test]
    fn active_caps_at_sixteen() {
        let mut set = ForceFieldSet::default();
        for _ in 0..20 {
            set.push(ForceField::attractor(Vec3::ZERO, 1.0, 1.0));
        }
        assert_eq!(set.active().len(), MAX_FORCE_FIELDS);
        assert_eq!(set.len(), 20);
    }

    #[test]
    fn gpu_array_count_matches_active_len() {
        let mut set = ForceFieldSet::default();
        set.push(ForceField::attractor(Vec3::ONE, 2.0, 3.0));
        let (_, count) = set.to_gpu_array();
        assert_eq!(count, 1);
    }
}
