//! Particle state: CPU-authoritative bookkeeping plus the GPU-resident layout.
//!
//! A concrete CPU/GPU split rather than a generic trait pair: the schema is
//! fixed by the simulation, not supplied by a downstream user.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Vec3};

/// Lead / Support / Ambient, per §3.1 and §4.H.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Role {
    Lead = 0,
    Support = 1,
    Ambient = 2,
}

impl Role {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => Role::Lead,
            1 => Role::Support,
            _ => Role::Ambient,
        }
    }
}

/// CPU-side particle record used during initialization and free-list
/// bookkeeping. The solver itself only ever touches `ParticleGpu`.
#[derive(Clone, Debug)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub affine_c: Mat3,
    pub mass: f32,
    pub density: f32,
    pub direction: Vec3,
    pub color: Vec3,
    pub material_type: u8,
    pub age: f32,
    pub lifetime: f32,
    pub role: Role,
    pub personality_primary: u8,
    pub personality_secondary: u8,
    pub personality_blend: f32,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            affine_c: Mat3::ZERO,
            mass: 1.0,
            density: 0.0,
            direction: Vec3::Y,
            color: Vec3::ONE,
            material_type: 0,
            age: 0.0,
            lifetime: -1.0,
            role: Role::Ambient,
            personality_primary: 0,
            personality_secondary: 0,
            personality_blend: 0.0,
        }
    }
}

impl Particle {
    /// A particle is dead once its mass has been zeroed (by expiry or by
    /// the NaN-guard in G2P). Dead particles are skipped in P2G and are
    /// eligible for the emitter free-list. See §3.1 invariants.
    pub fn is_dead(&self) -> bool {
        self.mass <= 0.0
    }

    pub fn is_expired(&self) -> bool {
        self.lifetime >= 0.0 && self.age > self.lifetime
    }

    pub fn to_gpu(&self) -> ParticleGpu {
        ParticleGpu {
            position: self.position.to_array(),
            mass: self.mass,
            velocity: self.velocity.to_array(),
            density: self.density,
            affine_c: [
                [self.affine_c.x_axis.x, self.affine_c.x_axis.y, self.affine_c.x_axis.z, 0.0],
                [self.affine_c.y_axis.x, self.affine_c.y_axis.y, self.affine_c.y_axis.z, 0.0],
                [self.affine_c.z_axis.x, self.affine_c.z_axis.y, self.affine_c.z_axis.z, 0.0],
            ],
            direction: self.direction.to_array(),
            age: self.age,
            color: self.color.to_array(),
            lifetime: self.lifetime,
            material_type: self.material_type as u32,
            role: self.role as u8 as u32,
            personality_primary: self.personality_primary as u32,
            personality_secondary: self.personality_secondary as u32,
            personality_blend: self.personality_blend,
            _pad0: [0.0; 3],
        }
    }

    pub fn from_gpu(g: &ParticleGpu) -> Self {
        Self {
            position: Vec3::from_array(g.position),
            velocity: Vec3::from_array(g.velocity),
            affine_c: Mat3::from_cols(
                Vec3::new(g.affine_c[0][0], g.affine_c[0][1], g.affine_c[0][2]),
                Vec3::new(g.affine_c[1][0], g.affine_c[1][1], g.affine_c[1][2]),
                Vec3::new(g.affine_c[2][0], g.affine_c[2][1], g.affine_c[2][2]),
            ),
            mass: g.mass,
            density: g.density,
            direction: Vec3::from_array(g.direction),
            color: Vec3::from_array(g.color),
            material_type: g.material_type as u8,
            age: g.age,
            lifetime: g.lifetime,
            role: Role::from_u8(g.role as u8),
            personality_primary: g.personality_primary as u8,
            personality_secondary: g.personality_secondary as u8,
            personality_blend: g.personality_blend,
        }
    }
}

/// GPU-resident layout. Field order and padding follow std140-style
/// alignment with explicit `_pad*` fields rather than relying on the
/// compiler to match WGSL rules.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct ParticleGpu {
    pub position: [f32; 3],
    pub mass: f32,
    pub velocity: [f32; 3],
    pub density: f32,
    /// Each column padded to 16 bytes, matching WGSL's `mat3x3<f32>` column stride.
    pub affine_c: [[f32; 4]; 3],
    pub direction: [f32; 3],
    pub age: f32,
    pub color: [f32; 3],
    pub lifetime: f32,
    pub material_type: u32,
    pub role: u32,
    pub personality_primary: u32,
    pub personality_secondary: u32,
    pub personality_blend: f32,
    pub _pad0: [f32; 3],
}

impl Default for ParticleGpu {
    fn default() -> Self {
        Particle::default().to_gpu()
    }
}

/// WGSL struct mirroring `ParticleGpu`: a Rust Pod struct paired with a
/// literal WGSL struct string so the two can never drift silently.
pub const PARTICLE_WGSL_STRUCT: &str = r#"
struct Particle {
    position: vec3<f32>,
    mass: f32,
    velocity: vec3<f32>,
    density: f32,
    affine_c: mat3x3<f32>,
    direction: vec3<f32>,
    age: f32,
    color: vec3<f32>,
    lifetime: f32,
    material_type: u32,
    role: u32,
    personality_primary: u32,
    personality_secondary: u32,
    personality_blend: f32,
};
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_gpu_conversion() {
        let mut p = Particle::default();
        p.position = Vec3::new(1.0, 2.0, 3.0);
        p.velocity = Vec3::new(-0.5, 0.25, 0.0);
        p.material_type = 3;
        p.role = Role::Lead;
        let g = p.to_gpu();
        let back = Particle::from_gpu(&g);
        assert_eq!(back.position, p.position);
        assert_eq!(back.material_type, p.material_type);
        assert_eq!(back.role, Role::Lead);
    }

    #[test]
    fn dead_particle_has_zero_mass() {
        let mut p = Particle::default();
        p.mass = 0.0;
        assert!(p.is_dead());
    }

    #[test]
    fn expiry_respects_immortal_negative_lifetime() {
        let mut p = Particle::default();
        p.lifetime = -1.0;
        p.age = 1e6;
        assert!(!p.is_expired());
        p.lifetime = 1.0;
        p.age = 1.1;
        assert!(p.is_expired());
    }
}
