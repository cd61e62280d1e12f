//! CPU-driven emitters (§3.4, §4.D).
//!
//! Kind/pattern enums plus sphere/disc/box/cone/ring spread sampling, driven
//! by a deterministic CPU-side accumulator:
//! `emissionAccumulator += rate*dt; while >= 1 { spawn }`.

use crate::material::MaterialKind;
use crate::particle::Particle;
use glam::Vec3;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::f32::consts::{PI, TAU};

pub const MAX_EMITTERS: usize = 16;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmitterKind {
    Point,
    Sphere,
    Disc,
    Box,
    Cone,
    Ring,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmissionPattern {
    Continuous,
    Burst,
    Pulse,
    Fountain,
    Explosion,
    Stream,
}

#[derive(Clone, Debug)]
pub struct Emitter {
    pub kind: EmitterKind,
    pub pattern: EmissionPattern,
    pub position: Vec3,
    pub direction: Vec3,
    pub rate: f32,
    pub velocity: f32,
    pub velocity_spread: f32,
    pub lifetime: f32,
    pub material_type: MaterialKind,
    pub size_start: f32,
    pub size_end: f32,
    pub color_start: Vec3,
    pub color_end: Vec3,
    emission_accumulator: f32,
    pulse_phase: f32,
    rng: SmallRng,
}

impl Emitter {
    pub fn new(kind: EmitterKind, pattern: EmissionPattern, position: Vec3) -> Self {
        Self {
            kind,
            pattern,
            position,
            direction: Vec3::Y,
            rate: 20.0,
            velocity: 1.0,
            velocity_spread: 0.1,
            lifetime: 3.0,
            material_type: MaterialKind::Fluid,
            size_start: 1.0,
            size_end: 1.0,
            color_start: Vec3::ONE,
            color_end: Vec3::ONE,
            emission_accumulator: 0.0,
            pulse_phase: 0.0,
            rng: SmallRng::seed_from_u64(0xE117),
        }
    }

    /// Effective instantaneous rate for this frame, accounting for the
    /// emission pattern (§3.4/§4.D).
    fn effective_rate(&mut self, frame_dt: f32) -> f32 {
        match self.pattern {
            EmissionPattern::Continuous => self.rate,
            EmissionPattern::Stream => self.rate,
            EmissionPattern::Fountain => self.rate * (0.8 + 0.2 * (self.pulse_phase * TAU).sin()),
            EmissionPattern::Pulse => {
                self.pulse_phase += frame_dt;
                if (self.pulse_phase % 1.0) < 0.1 { self.rate * 5.0 } else { 0.0 }
            }
            EmissionPattern::Burst | EmissionPattern::Explosion => {
                // One-shot: the whole `rate` count fires on the first update
                // after reset, then goes silent.
                if self.emission_accumulator < 0.0 {
                    0.0
                } else {
                    self.rate
                }
            }
        }
    }

    /// Arms a one-shot burst/explosion pattern to fire `count` particles on
    /// the next `update` call.
    pub fn trigger_burst(&mut self, count: f32) {
        self.emission_accumulator = 0.0;
        self.rate = count;
    }

    /// Runs one frame's worth of emission, returning freshly spawned
    /// particles. `frame_dt` is the orchestrator's frame delta (§4.D: the
    /// accumulator advances once per frame, not per substep).
    pub fn update(&mut self, frame_dt: f32) -> Vec<Particle> {
        let rate = self.effective_rate(frame_dt);
        self.emission_accumulator += rate * frame_dt;

        let mut spawned = Vec::new();
        while self.emission_accumulator >= 1.0 {
            self.emission_accumulator -= 1.0;
            spawned.push(self.spawn_one());
        }

        if matches!(self.pattern, EmissionPattern::Burst | EmissionPattern::Explosion) && !spawned.is_empty() {
            // Burst/explosion fire once; mark accumulator sentinel negative
            // so `effective_rate` goes silent until re-armed.
            self.emission_accumulator = -1.0;
        }

        spawned
    }

    fn spawn_one(&mut self) -> Particle {
        let (local_pos, local_vel_dir) = match self.kind {
            EmitterKind::Point => (Vec3::ZERO, self.direction),
            EmitterKind::Sphere => {
                let theta = self.rng.gen_range(0.0..TAU);
                let phi = self.rng.gen_range(0.0..PI);
                let dir = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                (dir, dir)
            }
            EmitterKind::Disc => {
                let theta = self.rng.gen_range(0.0..TAU);
                let r = self.rng.gen::<f32>().sqrt();
                let pos = Vec3::new(r * theta.cos(), 0.0, r * theta.sin());
                (pos, self.direction)
            }
            EmitterKind::Box => {
                let pos = Vec3::new(
                    self.rng.gen_range(-0.5..0.5),
                    self.rng.gen_range(-0.5..0.5),
                    self.rng.gen_range(-0.5..0.5),
                );
                (pos, self.direction)
            }
            EmitterKind::Cone => {
                let spread = 0.3_f32;
                let theta = self.rng.gen_range(0.0..TAU);
                let r = self.rng.gen_range(0.0..spread);
                let tilt = Vec3::new(r * theta.cos(), 1.0, r * theta.sin()).normalize();
                (Vec3::ZERO, tilt)
            }
            EmitterKind::Ring => {
                let theta = self.rng.gen_range(0.0..TAU);
                let pos = Vec3::new(theta.cos(), 0.0, theta.sin());
                (pos, self.direction)
            }
        };

        let spread = 1.0 + self.rng.gen_range(-self.velocity_spread..self.velocity_spread);
        let mut p = Particle::default();
        p.position = self.position + local_pos;
        p.velocity = local_vel_dir.normalize_or_zero() * self.velocity * spread;
        p.material_type = self.material_type as u8;
        p.lifetime = self.lifetime;
        p.age = 0.0;
        p.color = self.color_start;
        p
    }
}

/// Owned collection on the engine struct (§9: no global singletons).
#[derive(Default)]
pub struct EmitterSet {
    emitters: Vec<Emitter>,
}

impl EmitterSet {
    pub fn push(&mut self, emitter: Emitter) {
        self.emitters.push(emitter);
    }

    pub fn len(&self) -> usize {
        self.emitters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emitters.is_empty()
    }

    /// Runs every emitter for this frame and returns all freshly spawned
    /// particles, coalesced into a single list (§4.D: "coalesced into a
    /// single upload region per frame").
    pub fn update_all(&mut self, frame_dt: f32) -> Vec<Particle> {
        let mut all = Vec::new();
        for e in self.emitters.iter_mut().take(MAX_EMITTERS) {
            all.extend(e.update(frame_dt));
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn continuous_emitter_spawns_proportional_to_rate() {
        let mut e = Emitter::new(EmitterKind::Point, EmissionPattern::Continuous, Vec3::ZERO);
        e.rate = 60.0;
        let mut total = 0;
        for _ in 0..60 {
            total += e.update(1.0 / 60.0).len();
        }
        assert_eq!(total, 60);
    }

    #[test]
    fn burst_fires_once_then_goes_silent() {
        let mut e = Emitter::new(EmitterKind::Sphere, EmissionPattern::Burst, Vec3::ZERO);
        e.trigger_burst(10.0);
        let first = e.update(1.0 / 60.0).len();
        let second = e.update(1.0 / 60.0).len();
        assert_eq!(first, 10);
        assert_eq!(second, 0);
    }

    #[test]
    fn spawned_particles_inherit_material_and_lifetime() {
        let mut e = Emitter::new(EmitterKind::Point, EmissionPattern::Continuous, Vec3::ZERO);
        e.rate = 60.0;
        e.material_type = MaterialKind::Sand;
        e.lifetime = 2.5;
        let spawned = e.update(1.0 / 60.0);
        assert!(!spawned.is_empty());
        assert_eq!(spawned[0].material_type, MaterialKind::Sand as u8);
        assert_eq!(spawned[0].lifetime, 2.5);
    }

    #[test]
    fn emitter_set_coalesces_across_emitters() {
        let mut set = EmitterSet::default();
        let mut a = Emitter::new(EmitterKind::Point, EmissionPattern::Continuous, Vec3::ZERO);
        a.rate = 60.0;
        let mut b = Emitter::new(EmitterKind::Point, EmissionPattern::Continuous, Vec3::ONE);
        b.rate = 30.0;
        set.push(a);
        set.push(b);
        let spawned = set.update_all(1.0);
        assert_eq!(spawned.len(), 90);
    }
}
