//! Error types for the engine (§7).
//!
//! Hand-rolled enums with manual `Display`/`Error`/`From` impls, no
//! `thiserror`.

use std::fmt;

/// GPU/device-level failures; `ResourceError` (below) wraps the same
/// underlying failure modes.
#[derive(Debug)]
pub enum GpuError {
    SurfaceCreation(wgpu::CreateSurfaceError),
    NoAdapter,
    DeviceCreation(wgpu::RequestDeviceError),
    BufferMapping(String),
}

impl fmt::Display for GpuError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpuError::SurfaceCreation(e) => write!(f, "failed to create GPU surface: {}", e),
            GpuError::NoAdapter => write!(f, "no compatible GPU adapter found"),
            GpuError::DeviceCreation(e) => write!(f, "failed to create GPU device: {}", e),
            GpuError::BufferMapping(msg) => write!(f, "failed to map GPU buffer: {}", msg),
        }
    }
}

impl std::error::Error for GpuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GpuError::SurfaceCreation(e) => Some(e),
            GpuError::DeviceCreation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<wgpu::CreateSurfaceError> for GpuError {
    fn from(e: wgpu::CreateSurfaceError) -> Self {
        GpuError::SurfaceCreation(e)
    }
}

impl From<wgpu::RequestDeviceError> for GpuError {
    fn from(e: wgpu::RequestDeviceError) -> Self {
        GpuError::DeviceCreation(e)
    }
}

/// Invalid enum value, out-of-range scalar, or missing required field on
/// preset import. Rejected at the boundary; no partial apply (§7).
#[derive(Debug)]
pub enum ConfigError {
    OutOfRange { field: &'static str, value: f64, min: f64, max: f64 },
    InvalidEnum { field: &'static str, value: String },
    MissingField(&'static str),
    Deserialize(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::OutOfRange { field, value, min, max } => {
                write!(f, "field '{field}' value {value} out of range [{min}, {max}]")
            }
            ConfigError::InvalidEnum { field, value } => {
                write!(f, "field '{field}' has invalid value '{value}'")
            }
            ConfigError::MissingField(field) => write!(f, "missing required field '{field}'"),
            ConfigError::Deserialize(e) => write!(f, "failed to parse preset/sequence JSON: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Deserialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Deserialize(e)
    }
}

/// GPU buffer allocation failure, adapter lost, audio device lost. Fatal to
/// the session (§7).
#[derive(Debug)]
pub enum ResourceError {
    Gpu(GpuError),
    AudioDevice(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::Gpu(e) => write!(f, "GPU resource error: {}", e),
            ResourceError::AudioDevice(msg) => write!(f, "audio device error: {}", msg),
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Gpu(e) => Some(e),
            ResourceError::AudioDevice(_) => None,
        }
    }
}

impl From<GpuError> for ResourceError {
    fn from(e: GpuError) -> Self {
        ResourceError::Gpu(e)
    }
}

impl From<cpal::BuildStreamError> for ResourceError {
    fn from(e: cpal::BuildStreamError) -> Self {
        ResourceError::AudioDevice(e.to_string())
    }
}

impl From<cpal::DevicesError> for ResourceError {
    fn from(e: cpal::DevicesError) -> Self {
        ResourceError::AudioDevice(e.to_string())
    }
}

/// NaN/Inf detected in particle or grid state. Recovered locally by zeroing
/// the offending particle; logged once per frame, never propagated (§7).
#[derive(Debug, Clone, Copy)]
pub struct NumericError {
    pub particle_index: u32,
}

impl fmt::Display for NumericError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NaN/Inf detected in particle {}, zeroed and marked dead", self.particle_index)
    }
}

impl std::error::Error for NumericError {}

/// Sequence playback referenced an unknown event kind or an impossible
/// timestamp. Dropped silently with a single diagnostic (§7).
#[derive(Debug, Clone)]
pub struct SyncError {
    pub sequence_id: String,
    pub reason: String,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sequence '{}' dropped event: {}", self.sequence_id, self.reason)
    }
}

impl std::error::Error for SyncError {}

/// No audio samples for more than 500ms. The analyzer emits zero features;
/// predictive gestures are suppressed; the core continues (§7).
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyzerStarvation {
    pub silent_for_ms: f32,
}

impl fmt::Display for AnalyzerStarvation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "audio analyzer starved for {:.0}ms, falling back to zero features", self.silent_for_ms)
    }
}

impl std::error::Error for AnalyzerStarvation {}

/// Top-level engine error returned from init and from preset/sequence
/// import only; per-frame failures never propagate out of the orchestrator
/// (§7 propagation policy).
#[derive(Debug)]
pub enum EngineError {
    Config(ConfigError),
    Resource(ResourceError),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Config(e) => write!(f, "configuration error: {}", e),
            EngineError::Resource(e) => write!(f, "resource error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Config(e) => Some(e),
            EngineError::Resource(e) => Some(e),
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        EngineError::Config(e)
    }
}

impl From<ResourceError> for EngineError {
    fn from(e: ResourceError) -> Self {
        EngineError::Resource(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_reports_field_name() {
        let e = ConfigError::OutOfRange { field: "flipRatio", value: 2.0, min: 0.0, max: 1.0 };
        assert!(e.to_string().contains("flipRatio"));
    }

    #[test]
    fn numeric_error_mentions_particle_index() {
        let e = NumericError { particle_index: 42 };
        assert!(e.to_string().contains('4') && e.to_string().contains('2'));
    }
}
