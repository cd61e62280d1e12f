//! Spatial composition (§4.H step 3): depth-layer partitioning and
//! camera-aware dynamics.
//!
//! Buckets particles by camera-relative depth into named ranges, the same
//! depth-banding shape used for any scalar-field partition.

use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DepthLayer {
    Foreground,
    Midground,
    Background,
}

impl DepthLayer {
    pub fn from_depth(d: f32) -> Self {
        if d < 0.4 {
            DepthLayer::Foreground
        } else if d < 0.8 {
            DepthLayer::Midground
        } else {
            DepthLayer::Background
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            DepthLayer::Foreground => 0,
            DepthLayer::Midground => 1,
            DepthLayer::Background => 2,
        }
    }

    pub fn force_multiplier(self) -> f32 {
        match self {
            DepthLayer::Foreground => 1.5,
            DepthLayer::Midground => 1.0,
            DepthLayer::Background => 0.6,
        }
    }

    pub fn speed_multiplier(self) -> f32 {
        match self {
            DepthLayer::Foreground => 1.3,
            DepthLayer::Midground => 1.0,
            DepthLayer::Background => 0.7,
        }
    }

    /// `(brightness, saturation, scale, opacity)` by depth (§4.H step 3).
    pub fn visual_scalars(self) -> (f32, f32, f32, f32) {
        match self {
            DepthLayer::Foreground => (1.1, 1.1, 1.15, 1.0),
            DepthLayer::Midground => (1.0, 1.0, 1.0, 0.9),
            DepthLayer::Background => (0.8, 0.85, 0.85, 0.7),
        }
    }

    /// Frequency-response bias: treble drives FG, bass drives BG (§4.H step 3).
    pub fn frequency_bias(self, bass: f32, treble: f32) -> f32 {
        match self {
            DepthLayer::Foreground => treble,
            DepthLayer::Midground => (bass + treble) * 0.5,
            DepthLayer::Background => bass,
        }
    }
}

/// Normalized camera depth in `[0,1]` from near/far plane distances.
pub fn normalized_depth(position: Vec3, camera_position: Vec3, near: f32, far: f32) -> f32 {
    let dist = (position - camera_position).length();
    ((dist - near) / (far - near).max(1e-6)).clamp(0.0, 1.0)
}

/// Camera-aware dynamics: approach/retreat on accents/releases, lateral
/// force from stereo balance, vertical force from tonal register, cached
/// for 100ms (§4.H step 3).
#[derive(Clone, Copy, Debug, Default)]
pub struct CameraDynamics {
    pub approach_retreat: f32,
    pub lateral: f32,
    pub vertical: f32,
}

pub struct SpatialComposer {
    cached: CameraDynamics,
    cache_age: f32,
}

impl Default for SpatialComposer {
    fn default() -> Self {
        Self { cached: CameraDynamics::default(), cache_age: 1.0 }
    }
}

impl SpatialComposer {
    pub fn update(
        &mut self,
        frame_dt: f32,
        accent_intensity: f32,
        release_intensity: f32,
        stereo_balance: f32,
        bass: f32,
        treble: f32,
    ) -> CameraDynamics {
        self.cache_age += frame_dt;
        if self.cache_age < 0.1 {
            return self.cached;
        }
        self.cache_age = 0.0;
        self.cached = CameraDynamics {
            approach_retreat: accent_intensity - release_intensity,
            lateral: stereo_balance,
            vertical: treble - bass,
        };
        self.cached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_thresholds_match_named_bands() {
        assert_eq!(DepthLayer::from_depth(0.1), DepthLayer::Foreground);
        assert_eq!(DepthLayer::from_depth(0.5), DepthLayer::Midground);
        assert_eq!(DepthLayer::from_depth(0.9), DepthLayer::Background);
    }

    #[test]
    fn normalized_depth_clamps_to_unit_range() {
        let d = normalized_depth(Vec3::new(1000.0, 0.0, 0.0), Vec3::ZERO, 0.1, 100.0);
        assert_eq!(d, 1.0);
    }

    #[test]
    fn dynamics_cache_holds_for_100ms() {
        let mut composer = SpatialComposer::default();
        let first = composer.update(0.05, 1.0, 0.0, 0.5, 0.2, 0.8);
        let second = composer.update(0.05, 0.0, 0.0, 0.0, 0.0, 0.0);
        assert_eq!(first.approach_retreat, second.approach_retreat);
    }
}
