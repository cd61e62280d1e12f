//! Gesture interpretation (§3.5 `ActiveGesture`, §4.H step 1).
//!
//! A rule table promotes audio/timing state into up to 3 simultaneous
//! motion primitives, each carrying its own envelope. Grounded on the base
//! engine's `rules.rs` condition-table idiom (a flat match over named
//! conditions producing weighted outputs), here re-targeted at gestures
//! instead of particle interaction rules.

use crate::groove::GrooveState;
use crate::structure::StructureState;
use crate::timing::{anticipation_window_ms, TimingState};

pub const MAX_ACTIVE_GESTURES: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureKind {
    Swell,
    Attack,
    Release,
    Sustain,
    Accent,
    Breath,
}

impl GestureKind {
    pub fn to_u32(self) -> u32 {
        match self {
            GestureKind::Swell => 0,
            GestureKind::Attack => 1,
            GestureKind::Release => 2,
            GestureKind::Sustain => 3,
            GestureKind::Accent => 4,
            GestureKind::Breath => 5,
        }
    }
}

/// §3.5 `ActiveGesture`.
#[derive(Clone, Copy, Debug)]
pub struct ActiveGesture {
    pub kind: GestureKind,
    pub intensity: f32,
    pub phase: f32,
    pub start_time: f32,
    pub duration: f32,
    pub weight: f32,
}

impl ActiveGesture {
    /// Fade-in/out envelope per primitive (§4.H step 1).
    pub fn envelope(&self) -> f32 {
        let p = self.phase.clamp(0.0, 1.0);
        match self.kind {
            GestureKind::Attack => (-p * 6.0).exp(),
            GestureKind::Swell => smoothstep(0.0, 0.3, p) * (1.0 - smoothstep(0.7, 1.0, p)),
            GestureKind::Release => (-p * 2.5).exp(),
            GestureKind::Sustain => 1.0,
            GestureKind::Accent => (1.0 - p).max(0.0).powi(4),
            GestureKind::Breath => (p * std::f32::consts::TAU).sin().max(0.0),
        }
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// Rolling inputs the rule table consults (§4.H condition column).
pub struct GestureInputs {
    pub onset_energy: f32,
    pub attack_time_ms: f32,
    pub tension_slope: f32,
    pub sustained_energy_secs: f32,
    pub energy: f32,
}

pub struct GestureEngine {
    active: Vec<ActiveGesture>,
    clock: f32,
}

impl Default for GestureEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureEngine {
    pub fn new() -> Self {
        Self { active: Vec::with_capacity(MAX_ACTIVE_GESTURES), clock: 0.0 }
    }

    pub fn active(&self) -> &[ActiveGesture] {
        &self.active
    }

    pub fn update(
        &mut self,
        frame_dt: f32,
        inputs: &GestureInputs,
        groove: &GrooveState,
        structure: &StructureState,
        timing: &TimingState,
    ) {
        self.clock += frame_dt;

        // Decay weights and advance phase for already-active gestures.
        for g in self.active.iter_mut() {
            g.phase = ((self.clock - g.start_time) / g.duration).clamp(0.0, 1.0);
            g.weight *= (-frame_dt / 1.5).exp();
        }
        self.active.retain(|g| g.phase < 1.0 && g.weight > 0.02);

        for (kind, intensity, duration) in self.evaluate_rules(inputs, groove, structure, timing) {
            self.trigger(kind, intensity, duration);
        }
    }

    fn evaluate_rules(
        &self,
        inputs: &GestureInputs,
        groove: &GrooveState,
        _structure: &StructureState,
        timing: &TimingState,
    ) -> Vec<(GestureKind, f32, f32)> {
        let mut out = Vec::new();

        if inputs.onset_energy > 0.7 && inputs.attack_time_ms < 50.0 {
            out.push((GestureKind::Attack, inputs.onset_energy, 0.3));
        }
        if inputs.tension_slope > 0.0 && timing.next_downbeat_in_ms <= anticipation_window_ms::SWELL {
            out.push((GestureKind::Swell, (inputs.tension_slope).min(1.0), 0.6));
        }
        if inputs.tension_slope < 0.0 {
            out.push((GestureKind::Release, (-inputs.tension_slope).min(1.0), 0.8));
        }
        if inputs.sustained_energy_secs >= 2.0 && inputs.energy > 0.5 {
            out.push((GestureKind::Sustain, inputs.energy, 2.0));
        }
        if timing.next_downbeat_in_ms < 200.0 && groove.rhythm_confidence > 0.6 {
            out.push((GestureKind::Accent, groove.rhythm_confidence, 0.15));
        }
        if groove.rhythm_confidence > 0.6 && inputs.onset_energy < 0.2 {
            out.push((GestureKind::Breath, 0.5, 1.2));
        }

        out
    }

    fn trigger(&mut self, kind: GestureKind, intensity: f32, duration: f32) {
        if let Some(existing) = self.active.iter_mut().find(|g| g.kind == kind) {
            existing.intensity = existing.intensity.max(intensity);
            existing.start_time = self.clock;
            existing.weight = 1.0;
            return;
        }

        let gesture = ActiveGesture { kind, intensity, phase: 0.0, start_time: self.clock, duration, weight: 1.0 };

        if self.active.len() < MAX_ACTIVE_GESTURES {
            self.active.push(gesture);
        } else if let Some((idx, _)) =
            self.active.iter().enumerate().min_by(|a, b| a.1.weight.partial_cmp(&b.1.weight).unwrap())
        {
            if self.active[idx].weight < gesture.weight {
                self.active[idx] = gesture;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing_fixture() -> TimingState {
        TimingState { bpm: 120.0, beat_phase: 0.0, next_beat_in_ms: 500.0, next_downbeat_in_ms: 2000.0, tempo_stable: true }
    }

    #[test]
    fn sharp_onset_triggers_attack() {
        let mut e = GestureEngine::new();
        let inputs =
            GestureInputs { onset_energy: 0.9, attack_time_ms: 10.0, tension_slope: 0.0, sustained_energy_secs: 0.0, energy: 0.0 };
        e.update(0.016, &inputs, &GrooveState::default(), &StructureState::default(), &timing_fixture());
        assert!(e.active().iter().any(|g| g.kind == GestureKind::Attack));
    }

    #[test]
    fn cardinality_never_exceeds_three() {
        let mut e = GestureEngine::new();
        let groove = GrooveState { rhythm_confidence: 0.9, ..Default::default() };
        let inputs =
            GestureInputs { onset_energy: 0.9, attack_time_ms: 10.0, tension_slope: 1.0, sustained_energy_secs: 3.0, energy: 0.9 };
        let mut timing = timing_fixture();
        timing.next_downbeat_in_ms = 100.0;
        for _ in 0..10 {
            e.update(0.016, &inputs, &groove, &StructureState::default(), &timing);
        }
        assert!(e.active().len() <= MAX_ACTIVE_GESTURES);
    }

    #[test]
    fn attack_envelope_decays_from_one() {
        let g = ActiveGesture { kind: GestureKind::Attack, intensity: 1.0, phase: 0.0, start_time: 0.0, duration: 0.3, weight: 1.0 };
        let env0 = g.envelope();
        let g_mid = ActiveGesture { phase: 0.5, ..g };
        assert!(env0 > g_mid.envelope());
    }
}
