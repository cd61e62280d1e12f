//! Structure analyzer (§3.5 `StructureState`, §4.G second bullet).
//!
//! Scores 8 section archetypes per frame from a feature vector and commits
//! to a transition only once the winner dominates for ≥ 1s — a dwell-time
//! hysteresis so the section doesn't flicker between two close scores.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    Intro,
    Verse,
    Chorus,
    Bridge,
    Breakdown,
    BuildUp,
    Drop,
    Outro,
}

const SECTIONS: [Section; 8] = [
    Section::Intro,
    Section::Verse,
    Section::Chorus,
    Section::Bridge,
    Section::Breakdown,
    Section::BuildUp,
    Section::Drop,
    Section::Outro,
];

const DOMINANCE_HOLD_SECS: f32 = 1.0;

/// Feature vector §4.G: `(bassEnergy, treblePresence, flux, onsetDensity, harmonicRatio, dynamicRange)`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StructureFeatures {
    pub bass_energy: f32,
    pub treble_presence: f32,
    pub flux: f32,
    pub onset_density: f32,
    pub harmonic_ratio: f32,
    pub dynamic_range: f32,
}

/// §3.5 `StructureState`.
#[derive(Clone, Copy, Debug)]
pub struct StructureState {
    pub section: Section,
    pub section_phase: f32,
    pub energy: f32,
    pub tension: f32,
    pub anticipation: f32,
}

impl Default for StructureState {
    fn default() -> Self {
        Self { section: Section::Intro, section_phase: 0.0, energy: 0.0, tension: 0.0, anticipation: 0.0 }
    }
}

pub struct StructureAnalyzer {
    state: StructureState,
    candidate: Section,
    candidate_dwell: f32,
    section_entered_at: f32,
    clock: f32,
    energy_ema: f32,
    flux_mean_ema: f32,
    tension_lowpass: f32,
}

impl Default for StructureAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl StructureAnalyzer {
    pub fn new() -> Self {
        Self {
            state: StructureState::default(),
            candidate: Section::Intro,
            candidate_dwell: 0.0,
            section_entered_at: 0.0,
            clock: 0.0,
            energy_ema: 0.0,
            flux_mean_ema: 0.0,
            tension_lowpass: 0.0,
        }
    }

    pub fn state(&self) -> StructureState {
        self.state
    }

    pub fn update(&mut self, features: StructureFeatures, rms: f32, frame_dt: f32) {
        self.clock += frame_dt;

        let scores: Vec<(Section, f32)> = SECTIONS.iter().map(|&s| (s, score(s, features))).collect();
        let (winner, _) = scores
            .iter()
            .copied()
            .fold((Section::Intro, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if winner == self.candidate {
            self.candidate_dwell += frame_dt;
        } else {
            self.candidate = winner;
            self.candidate_dwell = 0.0;
        }

        if self.candidate_dwell >= DOMINANCE_HOLD_SECS && self.candidate != self.state.section {
            self.state.section = self.candidate;
            self.section_entered_at = self.clock;
        }

        self.state.section_phase = ((self.clock - self.section_entered_at) / 8.0).fract().clamp(0.0, 1.0);

        let alpha = (frame_dt / 1.0).clamp(0.0, 1.0);
        self.energy_ema += (rms - self.energy_ema) * alpha;
        self.state.energy = self.energy_ema;

        self.flux_mean_ema += (features.flux - self.flux_mean_ema) * alpha;
        let flux_centered = features.flux - self.flux_mean_ema;
        self.tension_lowpass += (flux_centered - self.tension_lowpass) * alpha;
        self.state.tension = self.tension_lowpass.max(0.0);

        self.state.anticipation = if self.state.section == Section::BuildUp {
            self.state.tension * self.state.section_phase
        } else {
            0.0
        };
    }
}

fn score(section: Section, f: StructureFeatures) -> f32 {
    match section {
        Section::Intro => (1.0 - f.bass_energy) + (1.0 - f.onset_density) * 0.5,
        Section::Verse => f.harmonic_ratio * 0.7 + (1.0 - f.flux) * 0.3,
        Section::Chorus => f.bass_energy * 0.5 + f.onset_density * 0.5,
        Section::Bridge => f.treble_presence * 0.6 + f.dynamic_range * 0.4,
        Section::Breakdown => (1.0 - f.onset_density) * 0.6 + f.bass_energy * 0.4,
        Section::BuildUp => f.flux * 0.6 + f.dynamic_range * 0.4,
        Section::Drop => f.bass_energy * 0.6 + f.onset_density * 0.4,
        Section::Outro => (1.0 - f.bass_energy) * 0.5 + (1.0 - f.harmonic_ratio) * 0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sustained_drop_features_eventually_win_the_section() {
        let mut a = StructureAnalyzer::new();
        let features = StructureFeatures { bass_energy: 1.0, onset_density: 1.0, ..Default::default() };
        for _ in 0..200 {
            a.update(features, 0.9, 1.0 / 30.0);
        }
        assert_eq!(a.state().section, Section::Drop);
    }

    #[test]
    fn brief_spike_does_not_flip_the_section() {
        let mut a = StructureAnalyzer::new();
        let intro = StructureFeatures::default();
        for _ in 0..30 {
            a.update(intro, 0.1, 1.0 / 30.0);
        }
        let drop = StructureFeatures { bass_energy: 1.0, onset_density: 1.0, ..Default::default() };
        a.update(drop, 0.9, 1.0 / 30.0);
        assert_eq!(a.state().section, Section::Intro);
    }

    #[test]
    fn anticipation_is_zero_outside_buildup() {
        let mut a = StructureAnalyzer::new();
        a.update(StructureFeatures::default(), 0.0, 1.0 / 30.0);
        assert_eq!(a.state().anticipation, 0.0);
    }
}
