//! Ensemble choreography (§4.H step 2): per-particle role assignment and
//! formation selection.
//!
//! Priority-scored top-N partitioning for the role split, with a dwell-time
//! hysteresis timer (same idiom `structure.rs` uses for section transitions)
//! so roles don't flicker frame to frame.

use crate::particle::Role;
use crate::structure::Section;
use glam::Vec3;
use std::collections::VecDeque;

const ROLE_HOLD_SECS: f32 = 2.0;
const FORMATION_BLEND_SECS: f32 = 2.0;

/// Support-follows-Lead lag window (§4.H step 2: "follow with lag 100-300
/// ms"); 200ms is the midpoint used as the fixed default.
const LEAD_FOLLOW_LAG_SECS: f32 = 0.2;
/// Damped intensity applied to the lead-follow target (§4.H step 2:
/// "damped intensity 0.6-0.8x"); 0.7 is the midpoint default.
const LEAD_FOLLOW_INTENSITY: f32 = 0.7;
const LEAD_HISTORY_RETAIN_SECS: f32 = 0.35;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Formation {
    Scattered,
    Clustered,
    Orbiting,
    Flowing,
    Layered,
    Radial,
    Grid,
    Spiral,
}

impl Formation {
    /// §4.H step 2: the formation a section prefers by default.
    pub fn for_section(section: Section) -> Self {
        match section {
            Section::Intro => Formation::Scattered,
            Section::Verse => Formation::Flowing,
            Section::Chorus => Formation::Clustered,
            Section::Bridge => Formation::Layered,
            Section::Breakdown => Formation::Orbiting,
            Section::BuildUp => Formation::Spiral,
            Section::Drop => Formation::Radial,
            Section::Outro => Formation::Grid,
        }
    }

    /// Closed-form attraction target relative to a grid center and radius
    /// (§4.H step 2 "attraction force toward a target position computed in
    /// closed form").
    pub fn target_offset(self, particle_index: usize, total: usize, t: f32, radius: f32) -> Vec3 {
        let n = total.max(1) as f32;
        let i = particle_index as f32;
        match self {
            Formation::Scattered => Vec3::ZERO,
            Formation::Clustered => Vec3::ZERO,
            Formation::Orbiting => {
                let theta = (i / n) * std::f32::consts::TAU + t;
                Vec3::new(theta.cos(), 0.0, theta.sin()) * radius * 0.6
            }
            Formation::Flowing => Vec3::new(0.0, (t + i * 0.01).sin() * radius * 0.2, 0.0),
            Formation::Layered => Vec3::new(0.0, ((i / n) - 0.5) * radius, 0.0),
            Formation::Radial => {
                let theta = (i / n) * std::f32::consts::TAU;
                Vec3::new(theta.cos(), 0.0, theta.sin()) * radius
            }
            Formation::Grid => {
                let side = (n.sqrt().ceil()).max(1.0);
                let row = (i / side).floor();
                let col = i % side;
                Vec3::new((col - side * 0.5) * radius / side, 0.0, (row - side * 0.5) * radius / side)
            }
            Formation::Spiral => {
                let theta = (i / n) * std::f32::consts::TAU * 4.0 + t;
                let r = (i / n) * radius;
                Vec3::new(theta.cos() * r, (i / n - 0.5) * radius * 0.3, theta.sin() * r)
            }
        }
    }
}

/// Weights for the priority score `p_i` (§4.H step 2).
#[derive(Clone, Copy, Debug)]
pub struct RoleWeights {
    pub camera: f32,
    pub energy: f32,
    pub height: f32,
    pub random: f32,
}

impl Default for RoleWeights {
    fn default() -> Self {
        Self { camera: 0.4, energy: 0.3, height: 0.2, random: 0.1 }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct LeadInfluence {
    pub position: Vec3,
    pub velocity: Vec3,
    pub gesture: u32,
    pub phase: f32,
    pub intensity: f32,
}

struct RoleHistory {
    role: Role,
    held_for: f32,
}

/// Owned per-engine, not a singleton (§9).
pub struct EnsembleChoreographer {
    history: Vec<RoleHistory>,
    formation: Formation,
    formation_target: Formation,
    formation_blend: f32,
    rng_state: u64,
    clock: f32,
    /// Snapshots of `(time, [(particle_index, position, velocity)])` for
    /// every Lead, retained for `LEAD_HISTORY_RETAIN_SECS` so a Support
    /// particle can look up where its nearest Lead was a little in the past.
    lead_history: VecDeque<(f32, Vec<(usize, Vec3, Vec3)>)>,
}

impl EnsembleChoreographer {
    pub fn new(particle_capacity: usize) -> Self {
        Self {
            history: (0..particle_capacity).map(|_| RoleHistory { role: Role::Ambient, held_for: 0.0 }).collect(),
            formation: Formation::Scattered,
            formation_target: Formation::Scattered,
            formation_blend: 1.0,
            rng_state: 0x9E3779B97F4A7C15,
            clock: 0.0,
            lead_history: VecDeque::new(),
        }
    }

    pub fn clock(&self) -> f32 {
        self.clock
    }

    pub fn formation(&self) -> Formation {
        self.formation_target
    }

    /// Interpolation factor in `[0,1]` toward `formation_target` (§4.H step
    /// 2 "interpolates between formations over 2 s").
    pub fn formation_blend(&self) -> f32 {
        self.formation_blend
    }

    pub fn set_section(&mut self, section: Section) {
        let desired = Formation::for_section(section);
        if desired != self.formation_target {
            self.formation = self.formation_target;
            self.formation_target = desired;
            self.formation_blend = 0.0;
        }
    }

    fn next_rand(&mut self) -> f32 {
        self.rng_state ^= self.rng_state << 13;
        self.rng_state ^= self.rng_state >> 7;
        self.rng_state ^= self.rng_state << 17;
        (self.rng_state >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Computes roles for all particles and advances formation blending.
    /// `positions`/`velocities` are parallel to the particle buffer;
    /// `camera_position` and grid extents drive the priority score.
    pub fn update(
        &mut self,
        positions: &[Vec3],
        velocities: &[Vec3],
        camera_position: Vec3,
        camera_far: f32,
        weights: RoleWeights,
        frame_dt: f32,
    ) -> Vec<Role> {
        self.formation_blend = (self.formation_blend + frame_dt / FORMATION_BLEND_SECS).min(1.0);
        self.clock += frame_dt;

        let n = positions.len();
        let mut scores: Vec<(usize, f32)> = (0..n)
            .map(|i| {
                let d_cam = (positions[i] - camera_position).length();
                let cam_term = 1.0 - (d_cam / camera_far.max(1e-3)).clamp(0.0, 1.0);
                let energy_term = velocities[i].length();
                let height_term = positions[i].y;
                let rand_term = self.next_rand();
                let score = weights.camera * cam_term + weights.energy * energy_term + weights.height * height_term
                    + weights.random * rand_term;
                (i, score)
            })
            .collect();
        scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let lead_cut = (n as f32 * 0.10).round() as usize;
        let support_cut = lead_cut + (n as f32 * 0.30).round() as usize;

        let mut desired = vec![Role::Ambient; n];
        for (rank, &(idx, _)) in scores.iter().enumerate() {
            desired[idx] = if rank < lead_cut {
                Role::Lead
            } else if rank < support_cut {
                Role::Support
            } else {
                Role::Ambient
            };
        }

        if self.history.len() < n {
            self.history.resize_with(n, || RoleHistory { role: Role::Ambient, held_for: 0.0 });
        }

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let h = &mut self.history[i];
            h.held_for += frame_dt;
            if desired[i] != h.role && h.held_for >= ROLE_HOLD_SECS {
                h.role = desired[i];
                h.held_for = 0.0;
            }
            out.push(h.role);
        }

        let leads: Vec<(usize, Vec3, Vec3)> =
            (0..n).filter(|&i| out[i] == Role::Lead).map(|i| (i, positions[i], velocities[i])).collect();
        self.lead_history.push_back((self.clock, leads));
        while let Some(&(t, _)) = self.lead_history.front() {
            if self.clock - t > LEAD_HISTORY_RETAIN_SECS {
                self.lead_history.pop_front();
            } else {
                break;
            }
        }

        out
    }

    /// Finds the nearest lead particle within `radius` for a support
    /// particle at `position` (§4.H step 2 Support behavior).
    pub fn nearest_lead(position: Vec3, leads: &[(usize, Vec3)], radius: f32) -> Option<usize> {
        leads
            .iter()
            .map(|&(idx, pos)| (idx, (pos - position).length()))
            .filter(|&(_, d)| d <= radius)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(idx, _)| idx)
    }

    /// Support-follows-Lead lookup (§4.H step 2): finds the nearest Lead
    /// within `radius` as it was `LEAD_FOLLOW_LAG_SECS` ago, and returns a
    /// damped `LeadInfluence` a Support particle at `position` should steer
    /// toward. `None` if no Lead is within radius or no history exists yet.
    pub fn lead_follow_target(&self, position: Vec3, radius: f32) -> Option<LeadInfluence> {
        let cutoff = self.clock - LEAD_FOLLOW_LAG_SECS;
        let snapshot = self
            .lead_history
            .iter()
            .filter(|&&(t, _)| t <= cutoff)
            .last()
            .or_else(|| self.lead_history.front())?;
        let pairs: Vec<(usize, Vec3)> = snapshot.1.iter().map(|&(idx, pos, _)| (idx, pos)).collect();
        let idx = Self::nearest_lead(position, &pairs, radius)?;
        let &(_, lead_pos, lead_vel) = snapshot.1.iter().find(|&&(i, _, _)| i == idx)?;
        Some(LeadInfluence { position: lead_pos, velocity: lead_vel, gesture: 0, phase: 0.0, intensity: LEAD_FOLLOW_INTENSITY })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_ten_percent_become_lead() {
        let mut choreographer = EnsembleChoreographer::new(100);
        let positions: Vec<Vec3> = (0..100).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let velocities: Vec<Vec3> = (0..100).map(|i| Vec3::splat(i as f32 * 0.01)).collect();
        let roles = choreographer.update(&positions, &velocities, Vec3::ZERO, 50.0, RoleWeights::default(), 0.016);
        let leads = roles.iter().filter(|&&r| r == Role::Lead).count();
        assert!(leads >= 8 && leads <= 12);
    }

    #[test]
    fn role_does_not_flip_before_hold_time_elapses() {
        let mut choreographer = EnsembleChoreographer::new(4);
        let positions = vec![Vec3::ZERO; 4];
        let velocities = vec![Vec3::ZERO; 4];
        let first = choreographer.update(&positions, &velocities, Vec3::ZERO, 50.0, RoleWeights::default(), 0.1);
        let second = choreographer.update(&positions, &velocities, Vec3::new(1000.0, 0.0, 0.0), 50.0, RoleWeights::default(), 0.1);
        assert_eq!(first, second);
    }

    #[test]
    fn formation_switches_and_blend_resets_on_section_change() {
        let mut choreographer = EnsembleChoreographer::new(4);
        choreographer.set_section(Section::Chorus);
        assert_eq!(choreographer.formation(), Formation::Clustered);
        assert_eq!(choreographer.formation_blend(), 0.0);
    }

    #[test]
    fn radial_target_offset_sits_on_the_circle() {
        let offset = Formation::Radial.target_offset(0, 4, 0.0, 10.0);
        assert!((offset.length() - 10.0).abs() < 1e-3);
    }

    #[test]
    fn support_follows_nearest_lead_once_history_exists() {
        let mut choreographer = EnsembleChoreographer::new(20);
        let camera_position = Vec3::new(5.0, 0.0, -10.0);
        let mut positions = vec![Vec3::new(1000.0, 0.0, 0.0); 20];
        positions[0] = Vec3::new(5.0, 0.0, 0.0);
        let velocities = vec![Vec3::ZERO; 20];
        for _ in 0..50 {
            choreographer.update(&positions, &velocities, camera_position, 50.0, RoleWeights::default(), 0.05);
        }
        let lead = choreographer.lead_follow_target(Vec3::new(6.0, 0.0, 0.0), 20.0);
        assert!(lead.is_some());
        assert!((lead.unwrap().intensity - LEAD_FOLLOW_INTENSITY).abs() < 1e-6);
    }

    #[test]
    fn lead_follow_target_is_none_outside_radius() {
        let mut choreographer = EnsembleChoreographer::new(20);
        let camera_position = Vec3::new(5.0, 0.0, -10.0);
        let mut positions = vec![Vec3::new(1000.0, 0.0, 0.0); 20];
        positions[0] = Vec3::new(5.0, 0.0, 0.0);
        let velocities = vec![Vec3::ZERO; 20];
        for _ in 0..50 {
            choreographer.update(&positions, &velocities, camera_position, 50.0, RoleWeights::default(), 0.05);
        }
        let lead = choreographer.lead_follow_target(Vec3::new(-1000.0, 0.0, 0.0), 5.0);
        assert!(lead.is_none());
    }
}
