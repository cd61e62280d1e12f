//! Groove engine (§3.5 `GrooveState`, §4.G first bullet).
//!
//! A fixed-capacity ring buffer of recent beat inter-onset intervals, the
//! same bounded-history shape used elsewhere in this crate for rolling
//! statistics.

use std::collections::VecDeque;

const HISTORY_CAPACITY: usize = 32;
const EMA_TAU_SECS: f32 = 0.5;

/// §3.5 `GrooveState`.
#[derive(Clone, Copy, Debug, Default)]
pub struct GrooveState {
    pub swing_ratio: f32,
    pub micro_timing_variance: f32,
    pub syncopation: f32,
    pub density: f32,
    pub rhythm_confidence: f32,
    pub pattern_period: f32,
}

pub struct GrooveEngine {
    beat_times: VecDeque<f32>,
    state: GrooveState,
}

impl Default for GrooveEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GrooveEngine {
    pub fn new() -> Self {
        Self { beat_times: VecDeque::with_capacity(HISTORY_CAPACITY), state: GrooveState::default() }
    }

    pub fn state(&self) -> GrooveState {
        self.state
    }

    /// Registers a detected beat event at `time_secs` (monotonic).
    pub fn on_beat(&mut self, time_secs: f32) {
        if self.beat_times.len() >= HISTORY_CAPACITY {
            self.beat_times.pop_front();
        }
        self.beat_times.push_back(time_secs);
    }

    /// Recomputes the groove state from the current history, blending the
    /// previous value in with an EMA (τ ≈ 500 ms per §4.G).
    pub fn update(&mut self, frame_dt: f32) {
        if self.beat_times.len() < 4 {
            return;
        }

        let iois: Vec<f32> = self.beat_times.iter().zip(self.beat_times.iter().skip(1)).map(|(a, b)| b - a).collect();
        if iois.is_empty() {
            return;
        }

        let odd: Vec<f32> = iois.iter().step_by(2).copied().collect();
        let even: Vec<f32> = iois.iter().skip(1).step_by(2).copied().collect();
        let mean_odd = mean(&odd);
        let mean_even = mean(&even);
        let raw_swing = if mean_odd + mean_even > 1e-6 { mean_odd / (mean_odd + mean_even) } else { 0.5 };
        let swing_ratio = raw_swing.clamp(0.0, 1.0);

        let mean_ioi = mean(&iois);
        let variance = iois.iter().map(|ioi| (ioi - mean_ioi).powi(2)).sum::<f32>() / iois.len() as f32;
        let std_dev = variance.sqrt();
        let micro_timing_variance = if mean_ioi > 1e-6 { std_dev / mean_ioi } else { 0.0 };

        let pattern_period = mean_ioi * 2.0;
        let syncopation = off_beat_fraction(&self.beat_times, mean_ioi);

        let density = 1.0 / mean_ioi.max(1e-3);
        let rhythm_confidence = (1.0 - micro_timing_variance.min(1.0)).clamp(0.0, 1.0);

        let alpha = 1.0 - (-frame_dt / EMA_TAU_SECS).exp();
        self.state.swing_ratio += (swing_ratio - self.state.swing_ratio) * alpha;
        self.state.micro_timing_variance += (micro_timing_variance - self.state.micro_timing_variance) * alpha;
        self.state.syncopation += (syncopation - self.state.syncopation) * alpha;
        self.state.density += (density - self.state.density) * alpha;
        self.state.rhythm_confidence += (rhythm_confidence - self.state.rhythm_confidence) * alpha;
        self.state.pattern_period += (pattern_period - self.state.pattern_period) * alpha;
    }
}

fn mean(v: &[f32]) -> f32 {
    if v.is_empty() {
        0.0
    } else {
        v.iter().sum::<f32>() / v.len() as f32
    }
}

/// Fraction of onsets whose phase within a beat period falls outside the
/// `[-0.15, 0.15]` neighborhood of an on-beat subdivision.
fn off_beat_fraction(beats: &VecDeque<f32>, period: f32) -> f32 {
    if period <= 1e-6 || beats.is_empty() {
        return 0.0;
    }
    let off_beat = beats
        .iter()
        .filter(|&&t| {
            let phase = (t / period).fract();
            let dist_to_grid = (phase * 2.0).fract().min(1.0 - (phase * 2.0).fract());
            dist_to_grid > 0.15
        })
        .count();
    off_beat as f32 / beats.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_beats_have_low_micro_timing_variance() {
        let mut g = GrooveEngine::new();
        for i in 0..16 {
            g.on_beat(i as f32 * 0.5);
        }
        g.update(1.0);
        assert!(g.state().micro_timing_variance < 0.1);
    }

    #[test]
    fn swing_ratio_stays_in_unit_range() {
        let mut g = GrooveEngine::new();
        let mut t = 0.0;
        for i in 0..16 {
            t += if i % 2 == 0 { 0.3 } else { 0.5 };
            g.on_beat(t);
        }
        g.update(1.0);
        assert!(g.state().swing_ratio >= 0.0 && g.state().swing_ratio <= 1.0);
    }

    #[test]
    fn sparse_history_leaves_state_at_default() {
        let mut g = GrooveEngine::new();
        g.on_beat(0.0);
        g.update(1.0);
        assert_eq!(g.state().pattern_period, 0.0);
    }
}
