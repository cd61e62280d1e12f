//! # kinetic_mpm
//!
//! Real-time, GPU-accelerated MLS-MPM particle fluid simulation with an
//! audio-reactive kinetic mapping layer on top: FFT analysis feeds groove,
//! structure, and timing trackers, which feed a gesture rule table, which
//! feeds per-particle role/personality/spatial-layer assignment, which is
//! flattened into one uniform block the solver and renderer both consume.
//!
//! ## Quick start
//!
//! ```ignore
//! use kinetic_mpm::config::EngineConfig;
//! use kinetic_mpm::orchestrator::{CameraInput, Engine, WindowInput};
//!
//! let mut engine = Engine::new(&device, EngineConfig::default())?;
//! loop {
//!     engine.push_audio_samples(&captured_samples);
//!     engine.frame(&device, &queue, CameraInput::default(), WindowInput { width, height });
//! }
//! ```
//!
//! ## Module map
//!
//! | Concern | Module |
//! |---|---|
//! | Particle/grid data model | [`particle`], [`grid`], [`material`] |
//! | Forces, emission | [`forcefield`], [`emitter`] |
//! | Solver dispatch | [`solver`], [`boundary`] |
//! | Audio analysis | [`audio`] |
//! | Kinetic mapping | [`groove`], [`structure`], [`timing`], [`gesture`], [`ensemble`], [`personality`], [`spatial_layers`], [`macros`] |
//! | Orchestration | [`orchestrator`], [`time`] |
//! | Persistence | [`config`], [`preset`], [`sequence`] |
//! | Errors | [`error`] |
//! | GPU plumbing | `gpu` (crate-private), [`uniforms`], [`shader_utils`] |

pub mod audio;
pub mod boundary;
pub mod config;
pub mod emitter;
pub mod ensemble;
pub mod error;
pub mod forcefield;
pub mod gesture;
mod gpu;
pub mod grid;
pub mod groove;
pub mod macros;
pub mod material;
pub mod orchestrator;
pub mod particle;
pub mod personality;
pub mod preset;
pub mod sequence;
pub mod shader_utils;
pub mod solver;
pub mod spatial_layers;
pub mod structure;
pub mod time;
pub mod timing;
pub mod uniforms;

pub use bytemuck;
pub use config::EngineConfig;
pub use error::EngineError;
pub use glam::{Vec2, Vec3, Vec4};
pub use gpu::GpuState;
pub use orchestrator::{CameraInput, Engine, WindowInput};
pub use particle::{Particle, ParticleGpu, Role};

/// Convenient re-exports for common usage.
///
/// ```ignore
/// use kinetic_mpm::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::error::EngineError;
    pub use crate::orchestrator::{CameraInput, Engine, WindowInput};
    pub use crate::particle::{Particle, ParticleGpu, Role};
    pub use crate::preset::{PresetFile, ResolvedPreset};
    pub use crate::time::Time;
    pub use crate::{Vec2, Vec3, Vec4};
}
