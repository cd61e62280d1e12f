//! Audio analyzer (§4.F): FFT + onset/beat detection over a live or
//! file-fed PCM stream.
//!
//! No base-engine counterpart exists for audio analysis; grounded instead on
//! `examples/other_examples/manifests/ryco117-fractal_sugar/Cargo.toml`, the
//! pack's one audio-reactive GPU particle visualizer, which pairs `rustfft`
//! (spectral analysis) with `cpal` (live capture) — the same pairing used
//! here.

use rustfft::num_complex::Complex32;
use rustfft::FftPlanner;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// §3.5 `AudioFeatures`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AudioFeatures {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub rms: f32,
    pub peak: f32,
    pub spectral_flux: f32,
    pub onset_energy: f32,
    pub stereo_balance: f32,
    pub stereo_width: f32,
    pub harmonic_ratio: f32,
    pub beat_intensity: f32,
}

/// A discrete beat event emitted when onset energy crosses its dynamic
/// threshold (§4.F).
#[derive(Clone, Copy, Debug)]
pub struct BeatEvent {
    pub intensity: f32,
    pub time: f32,
}

const FFT_SIZE: usize = 1024;
const SUB_BASS_HZ: (f32, f32) = (20.0, 250.0);
const SUB_MID_HZ: (f32, f32) = (250.0, 2000.0);
const SUB_TREBLE_HZ: (f32, f32) = (2000.0, 16000.0);

/// Lock-free-in-spirit single-writer/single-reader sample ring buffer fed by
/// the audio capture callback and drained at the top of each frame (§5, §9:
/// "expose a thin `push(samples)` entry point... no callback-driven
/// control flow reaching into the analyzer's internals").
pub struct SampleRing {
    inner: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))), capacity }
    }

    /// Called from the `cpal` stream callback (or the file-playback feeder).
    pub fn push(&self, samples: &[f32]) {
        let mut buf = self.inner.lock().expect("sample ring mutex poisoned");
        for &s in samples {
            if buf.len() >= self.capacity {
                buf.pop_front();
            }
            buf.push_back(s);
        }
    }

    /// Drains up to `n` samples, oldest first. Returns fewer than `n` if
    /// starved (§7 `AnalyzerStarvation`).
    pub fn drain(&self, n: usize) -> Vec<f32> {
        let mut buf = self.inner.lock().expect("sample ring mutex poisoned");
        let take = n.min(buf.len());
        buf.drain(..take).collect()
    }

    pub fn clone_handle(&self) -> Self {
        Self { inner: Arc::clone(&self.inner), capacity: self.capacity }
    }
}

fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (std::f32::consts::TAU * i as f32 / (n as f32 - 1.0)).cos())
        .collect()
}

/// Stateful, pure-w.r.t.-its-own-state FFT analyzer (§4.F, §9).
pub struct AudioAnalyzer {
    sample_rate: f32,
    window: Vec<f32>,
    prev_magnitudes: Vec<f32>,
    flux_history: VecDeque<f32>,
    running_max_flux: f32,
    smoothness: f32,
    bass_ema: f32,
    mid_ema: f32,
    treble_ema: f32,
    silent_ms: f32,
}

impl AudioAnalyzer {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            window: hann_window(FFT_SIZE),
            prev_magnitudes: vec![0.0; FFT_SIZE / 2],
            flux_history: VecDeque::with_capacity(512),
            running_max_flux: 1e-6,
            smoothness: 0.2,
            bass_ema: 0.0,
            mid_ema: 0.0,
            treble_ema: 0.0,
            silent_ms: 0.0,
        }
    }

    /// The `smoothness` macro (§4.H.5) controls the sub-band EMA's alpha.
    pub fn set_smoothness(&mut self, smoothness: f32) {
        self.smoothness = smoothness.clamp(0.01, 1.0);
    }

    /// §4.F: FFT a Hann-windowed buffer, integrate sub-bands, compute
    /// spectral flux and onset energy, stereo balance/width.
    ///
    /// `samples` is interleaved stereo if `stereo` is true, mono otherwise.
    /// Returns `None` (and advances the starvation clock) when given an
    /// empty buffer, matching §7's `AnalyzerStarvation` semantics — the
    /// caller decides the 500ms threshold since this function is stateless
    /// w.r.t. wall-clock time.
    pub fn process(&mut self, samples: &[f32], stereo: bool, frame_dt_ms: f32) -> Option<AudioFeatures> {
        if samples.is_empty() {
            self.silent_ms += frame_dt_ms;
            return None;
        }
        self.silent_ms = 0.0;

        let (left, right): (Vec<f32>, Vec<f32>) = if stereo {
            let l: Vec<f32> = samples.iter().step_by(2).copied().collect();
            let r: Vec<f32> = samples.iter().skip(1).step_by(2).copied().collect();
            (l, r)
        } else {
            (samples.to_vec(), samples.to_vec())
        };

        let mono: Vec<f32> = left.iter().zip(right.iter()).map(|(l, r)| (l + r) * 0.5).collect();
        let magnitudes = self.fft_magnitudes(&mono);

        let bass = self.band_energy(&magnitudes, SUB_BASS_HZ);
        let mid = self.band_energy(&magnitudes, SUB_MID_HZ);
        let treble = self.band_energy(&magnitudes, SUB_TREBLE_HZ);

        let alpha = self.smoothness;
        self.bass_ema += (bass - self.bass_ema) * alpha;
        self.mid_ema += (mid - self.mid_ema) * alpha;
        self.treble_ema += (treble - self.treble_ema) * alpha;

        let flux = self.spectral_flux(&magnitudes);
        self.flux_history.push_back(flux);
        if self.flux_history.len() > 512 {
            self.flux_history.pop_front();
        }
        let median_flux = self.median_recent_flux();
        let onset_threshold = median_flux * 1.5;
        let onset_energy = (flux - onset_threshold).max(0.0);
        if onset_energy > self.running_max_flux {
            self.running_max_flux = onset_energy;
        }
        let beat_intensity = if onset_energy > 0.0 { onset_energy / self.running_max_flux.max(1e-6) } else { 0.0 };

        let rms = (mono.iter().map(|s| s * s).sum::<f32>() / mono.len() as f32).sqrt();
        let peak = mono.iter().fold(0.0_f32, |m, &s| m.max(s.abs()));

        let rms_l = (left.iter().map(|s| s * s).sum::<f32>() / left.len().max(1) as f32).sqrt();
        let rms_r = (right.iter().map(|s| s * s).sum::<f32>() / right.len().max(1) as f32).sqrt();
        let stereo_balance = if rms_l + rms_r > 1e-6 { (rms_r - rms_l) / (rms_r + rms_l) } else { 0.0 };
        let stereo_width = self.stereo_correlation(&left, &right);

        let harmonic_ratio = self.harmonic_ratio(&magnitudes);

        Some(AudioFeatures {
            bass: self.bass_ema,
            mid: self.mid_ema,
            treble: self.treble_ema,
            rms,
            peak,
            spectral_flux: flux,
            onset_energy,
            stereo_balance,
            stereo_width,
            harmonic_ratio,
            beat_intensity,
        })
    }

    pub fn silent_ms(&self) -> f32 {
        self.silent_ms
    }

    fn fft_magnitudes(&mut self, mono: &[f32]) -> Vec<f32> {
        let mut buf = vec![0.0_f32; FFT_SIZE];
        let n = mono.len().min(FFT_SIZE);
        buf[..n].copy_from_slice(&mono[..n]);

        let mut complex: Vec<Complex32> = buf
            .iter()
            .zip(self.window.iter())
            .map(|(s, w)| Complex32::new(s * w, 0.0))
            .collect();

        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        fft.process(&mut complex);

        complex[..FFT_SIZE / 2].iter().map(|c| c.norm()).collect()
    }

    fn bin_for_hz(&self, hz: f32) -> usize {
        ((hz * FFT_SIZE as f32 / self.sample_rate) as usize).min(FFT_SIZE / 2 - 1)
    }

    fn band_energy(&self, magnitudes: &[f32], range: (f32, f32)) -> f32 {
        let lo = self.bin_for_hz(range.0);
        let hi = self.bin_for_hz(range.1).max(lo + 1);
        let slice = &magnitudes[lo..hi.min(magnitudes.len())];
        if slice.is_empty() {
            0.0
        } else {
            slice.iter().sum::<f32>() / slice.len() as f32
        }
    }

    /// Positive half-wave rectified difference of successive magnitude
    /// spectra, summed (§4.F).
    fn spectral_flux(&mut self, magnitudes: &[f32]) -> f32 {
        let flux: f32 = magnitudes
            .iter()
            .zip(self.prev_magnitudes.iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();
        self.prev_magnitudes = magnitudes.to_vec();
        flux
    }

    fn median_recent_flux(&self) -> f32 {
        if self.flux_history.is_empty() {
            return 0.0;
        }
        let mut v: Vec<f32> = self.flux_history.iter().copied().collect();
        v.sort_by(|a, b| a.partial_cmp(b).unwrap());
        v[v.len() / 2]
    }

    fn stereo_correlation(&self, left: &[f32], right: &[f32]) -> f32 {
        let n = left.len().min(right.len());
        if n == 0 {
            return 0.0;
        }
        let mean_l = left[..n].iter().sum::<f32>() / n as f32;
        let mean_r = right[..n].iter().sum::<f32>() / n as f32;
        let mut cov = 0.0;
        let mut var_l = 0.0;
        let mut var_r = 0.0;
        for i in 0..n {
            let dl = left[i] - mean_l;
            let dr = right[i] - mean_r;
            cov += dl * dr;
            var_l += dl * dl;
            var_r += dr * dr;
        }
        let denom = (var_l * var_r).sqrt();
        let correlation = if denom > 1e-9 { cov / denom } else { 1.0 };
        // Width is inversely related to correlation: fully correlated (mono) = 0 width.
        (1.0 - correlation.clamp(-1.0, 1.0)) * 0.5
    }

    fn harmonic_ratio(&self, magnitudes: &[f32]) -> f32 {
        let total: f32 = magnitudes.iter().sum::<f32>().max(1e-6);
        // Approximate harmonic content as energy concentrated at integer
        // multiples of the strongest low-frequency bin.
        let fundamental_bin = magnitudes[1..64]
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i + 1)
            .unwrap_or(1);
        let mut harmonic_energy = 0.0;
        let mut k = fundamental_bin;
        while k < magnitudes.len() {
            harmonic_energy += magnitudes[k];
            k += fundamental_bin;
        }
        (harmonic_energy / total).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_advances_starvation_clock() {
        let mut a = AudioAnalyzer::new(44100.0);
        assert!(a.process(&[], false, 16.0).is_none());
        assert!((a.silent_ms() - 16.0).abs() < 1e-3);
    }

    #[test]
    fn pure_tone_has_nonzero_bass_energy() {
        let mut a = AudioAnalyzer::new(44100.0);
        let samples: Vec<f32> = (0..2048)
            .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 44100.0).sin())
            .collect();
        let features = a.process(&samples, false, 16.0).unwrap();
        assert!(features.bass > 0.0);
    }

    #[test]
    fn sample_ring_drops_oldest_when_full() {
        let ring = SampleRing::new(4);
        ring.push(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let drained = ring.drain(4);
        assert_eq!(drained, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn stereo_balance_favors_louder_channel() {
        let mut a = AudioAnalyzer::new(44100.0);
        let mut interleaved = Vec::new();
        for i in 0..1024 {
            let t = i as f32 / 44100.0;
            interleaved.push((t * 440.0 * std::f32::consts::TAU).sin() * 0.1); // left, quiet
            interleaved.push((t * 440.0 * std::f32::consts::TAU).sin() * 1.0); // right, loud
        }
        let features = a.process(&interleaved, true, 16.0).unwrap();
        assert!(features.stereo_balance > 0.0);
    }
}
