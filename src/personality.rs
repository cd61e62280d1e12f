//! Personality archetypes (§3.5 `Personality`, §4.H step 4).
//!
//! 8 archetypes × 18 traits, laid out as a static data table of
//! behavioral coefficients rather than derived at runtime.

use crate::particle::Role;
use rand::Rng;

pub const ARCHETYPE_COUNT: usize = 8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Archetype {
    Calm = 0,
    Energetic = 1,
    Erratic = 2,
    Graceful = 3,
    Aggressive = 4,
    Shy = 5,
    Bold = 6,
    Dreamy = 7,
}

impl Archetype {
    pub fn all() -> [Archetype; ARCHETYPE_COUNT] {
        [
            Archetype::Calm,
            Archetype::Energetic,
            Archetype::Erratic,
            Archetype::Graceful,
            Archetype::Aggressive,
            Archetype::Shy,
            Archetype::Bold,
            Archetype::Dreamy,
        ]
    }
}

/// 18 traits per archetype (§3.5).
#[derive(Clone, Copy, Debug)]
pub struct Traits {
    pub speed: f32,
    pub smoothness: f32,
    pub amplitude: f32,
    pub audio_sensitivity: f32,
    pub bass_response: f32,
    pub treble_response: f32,
    pub beat_response: f32,
    pub independence: f32,
    pub predictability: f32,
    pub energy: f32,
    pub aggression: f32,
    pub brightness: f32,
    pub saturation: f32,
    pub scale_variation: f32,
    pub reaction_speed: f32,
    pub inertia: f32,
    pub rhythmic_alignment: f32,
    /// Role/gesture/formation affinity, collapsed into one scalar per
    /// archetype-to-role weight (role affinity vector, §3.5).
    pub role_affinity: [f32; 3],
}

pub fn traits_for(archetype: Archetype) -> Traits {
    match archetype {
        Archetype::Calm => Traits {
            speed: 0.3, smoothness: 0.9, amplitude: 0.4, audio_sensitivity: 0.3, bass_response: 0.3,
            treble_response: 0.2, beat_response: 0.2, independence: 0.4, predictability: 0.9, energy: 0.2,
            aggression: 0.1, brightness: 0.5, saturation: 0.4, scale_variation: 0.2, reaction_speed: 0.3,
            inertia: 0.8, rhythmic_alignment: 0.5, role_affinity: [0.2, 0.4, 0.4],
        },
        Archetype::Energetic => Traits {
            speed: 0.9, smoothness: 0.4, amplitude: 0.8, audio_sensitivity: 0.8, bass_response: 0.7,
            treble_response: 0.6, beat_response: 0.9, independence: 0.5, predictability: 0.4, energy: 0.9,
            aggression: 0.5, brightness: 0.8, saturation: 0.8, scale_variation: 0.5, reaction_speed: 0.9,
            inertia: 0.2, rhythmic_alignment: 0.8, role_affinity: [0.5, 0.3, 0.2],
        },
        Archetype::Erratic => Traits {
            speed: 0.8, smoothness: 0.1, amplitude: 0.7, audio_sensitivity: 0.9, bass_response: 0.5,
            treble_response: 0.8, beat_response: 0.5, independence: 0.9, predictability: 0.1, energy: 0.7,
            aggression: 0.6, brightness: 0.6, saturation: 0.7, scale_variation: 0.8, reaction_speed: 0.8,
            inertia: 0.1, rhythmic_alignment: 0.2, role_affinity: [0.3, 0.3, 0.4],
        },
        Archetype::Graceful => Traits {
            speed: 0.5, smoothness: 0.95, amplitude: 0.5, audio_sensitivity: 0.5, bass_response: 0.3,
            treble_response: 0.4, beat_response: 0.4, independence: 0.3, predictability: 0.7, energy: 0.4,
            aggression: 0.05, brightness: 0.7, saturation: 0.5, scale_variation: 0.3, reaction_speed: 0.5,
            inertia: 0.6, rhythmic_alignment: 0.7, role_affinity: [0.4, 0.5, 0.1],
        },
        Archetype::Aggressive => Traits {
            speed: 0.95, smoothness: 0.2, amplitude: 0.9, audio_sensitivity: 0.7, bass_response: 0.9,
            treble_response: 0.3, beat_response: 0.8, independence: 0.6, predictability: 0.3, energy: 0.95,
            aggression: 0.95, brightness: 0.6, saturation: 0.9, scale_variation: 0.4, reaction_speed: 0.95,
            inertia: 0.1, rhythmic_alignment: 0.6, role_affinity: [0.6, 0.2, 0.2],
        },
        Archetype::Shy => Traits {
            speed: 0.2, smoothness: 0.7, amplitude: 0.2, audio_sensitivity: 0.2, bass_response: 0.2,
            treble_response: 0.2, beat_response: 0.1, independence: 0.2, predictability: 0.8, energy: 0.15,
            aggression: 0.05, brightness: 0.3, saturation: 0.3, scale_variation: 0.1, reaction_speed: 0.2,
            inertia: 0.9, rhythmic_alignment: 0.3, role_affinity: [0.05, 0.25, 0.7],
        },
        Archetype::Bold => Traits {
            speed: 0.7, smoothness: 0.5, amplitude: 0.75, audio_sensitivity: 0.6, bass_response: 0.6,
            treble_response: 0.5, beat_response: 0.6, independence: 0.7, predictability: 0.5, energy: 0.75,
            aggression: 0.4, brightness: 0.9, saturation: 0.7, scale_variation: 0.4, reaction_speed: 0.7,
            inertia: 0.3, rhythmic_alignment: 0.6, role_affinity: [0.55, 0.3, 0.15],
        },
        Archetype::Dreamy => Traits {
            speed: 0.25, smoothness: 0.85, amplitude: 0.35, audio_sensitivity: 0.4, bass_response: 0.3,
            treble_response: 0.5, beat_response: 0.2, independence: 0.3, predictability: 0.6, energy: 0.25,
            aggression: 0.05, brightness: 0.4, saturation: 0.3, scale_variation: 0.25, reaction_speed: 0.25,
            inertia: 0.85, rhythmic_alignment: 0.4, role_affinity: [0.1, 0.3, 0.6],
        },
    }
}

/// Per-particle assignment (§3.5: primary, secondary, blend).
#[derive(Clone, Copy, Debug)]
pub struct PersonalityAssignment {
    pub primary: Archetype,
    pub secondary: Archetype,
    pub blend: f32,
}

pub struct PersonalityAssigner {
    global: Archetype,
    global_target: Archetype,
    global_blend: f32,
}

impl Default for PersonalityAssigner {
    fn default() -> Self {
        Self { global: Archetype::Calm, global_target: Archetype::Calm, global_blend: 1.0 }
    }
}

impl PersonalityAssigner {
    /// Advances the 2s global-personality crossfade (§3.5).
    pub fn update(&mut self, frame_dt: f32) {
        self.global_blend = (self.global_blend + frame_dt / 2.0).min(1.0);
    }

    pub fn set_global(&mut self, archetype: Archetype) {
        if archetype != self.global_target {
            self.global = self.global_target;
            self.global_target = archetype;
            self.global_blend = 0.0;
        }
    }

    pub fn global(&self) -> (Archetype, Archetype, f32) {
        (self.global, self.global_target, self.global_blend)
    }

    /// `base + role·w_role + audioMatch·w_audio + globalInfluence + rand`,
    /// top two blended (§4.H step 4).
    pub fn assign<R: Rng>(&self, role: Role, audio_match: [f32; ARCHETYPE_COUNT], rng: &mut R) -> PersonalityAssignment {
        let all = Archetype::all();
        let mut scores = [0.0_f32; ARCHETYPE_COUNT];
        for (i, &archetype) in all.iter().enumerate() {
            let traits = traits_for(archetype);
            let role_term = traits.role_affinity[role as usize];
            let global_term = if archetype == self.global_target { self.global_blend } else { 0.0 };
            let rand_term = rng.gen::<f32>() * 0.1;
            scores[i] = 0.2 + role_term * 0.4 + audio_match[i] * 0.3 + global_term * 0.2 + rand_term;
        }

        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
        let (primary_idx, primary_score) = ranked[0];
        let (secondary_idx, secondary_score) = ranked[1];
        let total = (primary_score + secondary_score).max(1e-6);

        PersonalityAssignment { primary: all[primary_idx], secondary: all[secondary_idx], blend: secondary_score / total }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn assignment_picks_two_distinct_archetypes() {
        let assigner = PersonalityAssigner::default();
        let mut rng = rand::rngs::SmallRng::seed_from_u64(1);
        let assignment = assigner.assign(Role::Lead, [0.0; ARCHETYPE_COUNT], &mut rng);
        assert_ne!(assignment.primary, assignment.secondary);
    }

    #[test]
    fn global_transition_takes_two_seconds() {
        let mut assigner = PersonalityAssigner::default();
        assigner.set_global(Archetype::Aggressive);
        assert_eq!(assigner.global().2, 0.0);
        assigner.update(2.0);
        assert_eq!(assigner.global().2, 1.0);
    }

    #[test]
    fn blend_is_at_most_one_half_when_sorted_descending() {
        let assigner = PersonalityAssigner::default();
        let mut rng = rand::rngs::SmallRng::seed_from_u64(2);
        let assignment = assigner.assign(Role::Ambient, [0.0; ARCHETYPE_COUNT], &mut rng);
        assert!(assignment.blend <= 0.5 + 1e-6);
    }
}
