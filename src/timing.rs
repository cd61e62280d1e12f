//! Predictive timing (§3.5 `TimingState`, §4.G third bullet).
//!
//! Tracks tempo from beat events and projects future beats/downbeats so
//! gestures can open ahead of the event they respond to (§4.H anticipation
//! windows). The tempo-from-IOI-median approach follows the same "robust
//! central tendency over a bounded history" idiom `groove.rs` uses for its
//! swing computation.

use std::collections::VecDeque;

const HISTORY_CAPACITY: usize = 16;
const STABILITY_VARIANCE_THRESHOLD: f32 = 0.04;
const MAX_PREDICTED_BEATS: usize = 8;

/// §3.5 `TimingState`.
#[derive(Clone, Copy, Debug)]
pub struct TimingState {
    pub bpm: f32,
    pub beat_phase: f32,
    pub next_beat_in_ms: f32,
    pub next_downbeat_in_ms: f32,
    pub tempo_stable: bool,
}

impl Default for TimingState {
    fn default() -> Self {
        Self { bpm: 120.0, beat_phase: 0.0, next_beat_in_ms: 500.0, next_downbeat_in_ms: 2000.0, tempo_stable: false }
    }
}

/// §4.H anticipation windows by gesture primitive.
pub mod anticipation_window_ms {
    pub const SWELL: f32 = 400.0;
    pub const ACCENT: f32 = 200.0;
    pub const BREATH: f32 = 300.0;
    pub const ATTACK: f32 = 50.0;
}

pub struct TimingTracker {
    beat_times: VecDeque<f32>,
    strong_beat_time: f32,
    state: TimingState,
    clock: f32,
}

impl Default for TimingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingTracker {
    pub fn new() -> Self {
        Self {
            beat_times: VecDeque::with_capacity(HISTORY_CAPACITY),
            strong_beat_time: 0.0,
            state: TimingState::default(),
            clock: 0.0,
        }
    }

    pub fn state(&self) -> TimingState {
        self.state
    }

    pub fn on_beat(&mut self, time_secs: f32, intensity: f32) {
        if self.beat_times.len() >= HISTORY_CAPACITY {
            self.beat_times.pop_front();
        }
        self.beat_times.push_back(time_secs);

        // The strongest beat in a short recent window anchors the downbeat grid.
        if intensity > 0.8 {
            self.strong_beat_time = time_secs;
        }
    }

    /// Advances the wall clock and recomputes phase/predictions (called once
    /// per frame regardless of whether a beat landed this frame).
    pub fn update(&mut self, frame_dt: f32) {
        self.clock += frame_dt;

        if self.beat_times.len() >= 4 {
            let iois: Vec<f32> =
                self.beat_times.iter().zip(self.beat_times.iter().skip(1)).map(|(a, b)| b - a).collect();
            let mut sorted = iois.clone();
            sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let median = sorted[sorted.len() / 2];
            if median > 1e-3 {
                self.state.bpm = 60.0 / median;
            }

            let mean = iois.iter().sum::<f32>() / iois.len() as f32;
            let variance = iois.iter().map(|ioi| (ioi - mean).powi(2)).sum::<f32>() / iois.len() as f32;
            let coefficient_of_variation = if mean > 1e-6 { variance.sqrt() / mean } else { 1.0 };
            self.state.tempo_stable = coefficient_of_variation < STABILITY_VARIANCE_THRESHOLD;
        } else {
            self.state.tempo_stable = false;
        }

        let period = 60.0 / self.state.bpm.max(1.0);
        let last_beat = self.beat_times.back().copied().unwrap_or(0.0);
        let since_last = (self.clock - last_beat).max(0.0);
        self.state.beat_phase = (since_last / period).fract();
        self.state.next_beat_in_ms = (period - (since_last % period)) * 1000.0;

        let measure_period = period * 4.0;
        let since_downbeat = (self.clock - self.strong_beat_time).max(0.0);
        self.state.next_downbeat_in_ms = (measure_period - (since_downbeat % measure_period)) * 1000.0;
    }

    /// Projects up to 8 beats ahead as absolute times (§4.G "predictions
    /// extend up to 8 beats ahead").
    pub fn predicted_beats(&self) -> Vec<f32> {
        if !self.state.tempo_stable {
            return Vec::new();
        }
        let period = 60.0 / self.state.bpm.max(1.0);
        let last_beat = self.beat_times.back().copied().unwrap_or(self.clock);
        (1..=MAX_PREDICTED_BEATS).map(|n| last_beat + period * n as f32).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_120_bpm_clicks_converge_to_stable_tempo() {
        let mut t = TimingTracker::new();
        let mut clock = 0.0;
        for _ in 0..16 {
            t.on_beat(clock, 1.0);
            t.update(0.01);
            clock += 0.5;
        }
        assert!(t.state().tempo_stable);
        assert!((t.state().bpm - 120.0).abs() < 2.0);
    }

    #[test]
    fn unstable_tempo_yields_no_predictions() {
        let t = TimingTracker::new();
        assert!(t.predicted_beats().is_empty());
    }

    #[test]
    fn stable_tempo_predicts_eight_beats() {
        let mut t = TimingTracker::new();
        let mut clock = 0.0;
        for _ in 0..16 {
            t.on_beat(clock, 1.0);
            t.update(0.01);
            clock += 0.5;
        }
        assert_eq!(t.predicted_beats().len(), 8);
    }
}
