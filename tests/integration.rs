//! Cross-module integration tests for the pure-CPU kinetic-mapping
//! invariants. GPU-adapter-requiring scenarios live in the `#[ignore]`d
//! tests at the bottom and are meant to be run explicitly
//! (`cargo test -- --ignored`) on a machine with a usable adapter.

use kinetic_mpm::ensemble::{EnsembleChoreographer, RoleWeights};
use kinetic_mpm::gesture::{GestureEngine, GestureInputs, MAX_ACTIVE_GESTURES};
use kinetic_mpm::groove::GrooveState;
use kinetic_mpm::macros::{MacroController, MacroKnob};
use kinetic_mpm::particle::Role;
use kinetic_mpm::structure::{Section, StructureAnalyzer, StructureFeatures};
use kinetic_mpm::timing::TimingState;
use kinetic_mpm::Vec3;

#[test]
fn macro_controller_smooths_toward_target_without_overshoot() {
    let mut macros = MacroController::default();
    macros.set_target(MacroKnob::Energy, 1.0);

    let mut last = macros.current().energy;
    for _ in 0..240 {
        macros.update(1.0 / 60.0);
        let now = macros.current().energy;
        assert!(now >= last - 1e-6, "energy macro should move monotonically toward its target");
        assert!(now <= 1.0 + 1e-6, "energy macro should never overshoot its clamped target");
        last = now;
    }
    assert!(last > 0.9, "energy macro should have converged close to 1.0 after 4s");
}

#[test]
fn ensemble_assigns_only_known_roles_and_keeps_proportions_bounded() {
    let mut ensemble = EnsembleChoreographer::new(64);
    ensemble.set_section(Section::Chorus);

    let positions: Vec<Vec3> = (0..64).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
    let velocities = vec![Vec3::ZERO; 64];

    let roles = ensemble.update(&positions, &velocities, Vec3::new(0.0, 0.0, -80.0), 200.0, RoleWeights::default(), 1.0 / 60.0);

    assert_eq!(roles.len(), 64);
    let leads = roles.iter().filter(|&&r| r == Role::Lead).count();
    // ~10% lead split per the role-priority scoring; allow slack for the
    // small sample size and the role-hold hysteresis window.
    assert!(leads <= 32, "lead role should stay a minority of the ensemble, got {leads}/64");
}

#[test]
fn gesture_cardinality_never_exceeds_max_active_slots() {
    let mut gestures = GestureEngine::new();
    let groove = GrooveState::default();
    let structure = kinetic_mpm::structure::StructureState::default();
    let timing = TimingState::default();

    for frame in 0..600 {
        let inputs = GestureInputs {
            onset_energy: if frame % 3 == 0 { 0.9 } else { 0.1 },
            attack_time_ms: 40.0,
            tension_slope: 0.5,
            sustained_energy_secs: (frame as f32) / 60.0,
            energy: 0.7,
        };
        gestures.update(1.0 / 60.0, &inputs, &groove, &structure, &timing);
        assert!(gestures.active().len() <= MAX_ACTIVE_GESTURES);
    }
}

#[test]
fn structure_analyzer_raises_energy_under_sustained_loud_input() {
    let mut analyzer = StructureAnalyzer::new();
    let loud = StructureFeatures { bass_energy: 0.8, treble_presence: 0.6, flux: 0.5, onset_density: 0.7, harmonic_ratio: 0.5, dynamic_range: 0.3 };

    for _ in 0..180 {
        analyzer.update(loud, 0.8, 1.0 / 60.0);
    }
    let state = analyzer.state();
    assert!(state.energy > 0.3, "sustained loud input should raise the tracked energy level, got {}", state.energy);
}

#[test]
fn preset_json_round_trips_through_the_documented_wire_shape() {
    let json = r#"{
        "version": 1,
        "simulation": {
            "transferMode": "Hybrid",
            "flipRatio": 0.95,
            "vorticityEnabled": true,
            "vorticityEpsilon": 0.1,
            "sparseGrid": false,
            "adaptiveTimestep": true,
            "cflTarget": 0.7,
            "gravityMode": "Down"
        },
        "particles": { "count": 8192, "defaultMaterial": 0 },
        "materials": [],
        "forceFields": [],
        "emitters": [],
        "boundaries": {
            "shape": "Sphere",
            "enabled": true,
            "stiffness": 40.0,
            "restitution": 0.3,
            "friction": 0.1,
            "collisionMode": "Reflect"
        },
        "audioMacros": {
            "intensity": 0.5, "chaos": 0.2, "smoothness": 0.5, "responsiveness": 0.5,
            "density": 0.5, "energy": 0.5, "coherence": 0.5, "complexity": 0.3
        },
        "metadata": { "name": "integration-roundtrip", "createdAt": 0 }
    }"#;

    let parsed = kinetic_mpm::preset::PresetFile::from_json(json).expect("valid preset JSON should parse");
    let re_serialized = parsed.to_json().expect("a parsed preset should always re-serialize");
    let reparsed = kinetic_mpm::preset::PresetFile::from_json(&re_serialized).expect("re-serialized JSON should parse too");

    assert_eq!(reparsed.particles.count, 8192);
    assert_eq!(reparsed.metadata.name, "integration-roundtrip");

    let resolved = kinetic_mpm::preset::ResolvedPreset::try_from(&reparsed).expect("a well-formed preset should resolve");
    assert_eq!(resolved.config.particle_count, 8192);
}

#[test]
fn sequence_json_round_trips_with_recorder_and_player() {
    use kinetic_mpm::sequence::{Sequence, SequenceEvent, SequencePlayer, SequenceRecorder};

    let mut recorder = SequenceRecorder::default();
    recorder.start(0.0);
    recorder.record(0.5, SequenceEvent::MacroChange { knob: "Energy".into(), value: 0.8 });
    recorder.record(1.0, SequenceEvent::PersonalityChange { archetype: "Bold".into() });
    let sequence = recorder.stop(2.0, "seq-1".into(), "integration test sequence".into()).expect("a recorder with events should produce a sequence");

    let json = sequence.to_json().expect("a recorded sequence should serialize");
    let reloaded = Sequence::from_json(&json).expect("a serialized sequence should deserialize");
    assert_eq!(reloaded.events.len(), 2);

    let mut player = SequencePlayer::new(reloaded);
    let mut seen = 0;
    for _ in 0..240 {
        let events = player.advance(1.0 / 60.0).expect("playback of a well-formed sequence should not error");
        seen += events.len();
    }
    assert_eq!(seen, 2, "both recorded events should fire exactly once during playback");
}

/// Requires a live GPU adapter; run explicitly with `cargo test -- --ignored`.
#[test]
#[ignore]
fn gpu_solver_substep_conserves_total_particle_mass() {
    use kinetic_mpm::material::MaterialTable;
    use kinetic_mpm::particle::Particle;
    use kinetic_mpm::solver::Solver;

    let (device, queue) = pollster::block_on(request_headless_device());
    let particles: Vec<_> = (0..256).map(|i| {
        let mut p = Particle::default();
        p.position = Vec3::new((i % 16) as f32 + 8.0, (i / 16) as f32 + 8.0, 8.0);
        p.to_gpu()
    }).collect();

    let materials = MaterialTable::default();
    let solver = Solver::new(&device, &particles, &materials, 64 * 64 * 64);

    let before: f32 = solver.read_particles_sync(&device, &queue).iter().map(|p| p.mass).sum();
    for _ in 0..8 {
        solver.dispatch_substep(&device, &queue, false);
    }
    let after: f32 = solver.read_particles_sync(&device, &queue).iter().map(|p| p.mass).sum();

    assert!((before - after).abs() < before * 0.01, "total particle mass should be conserved across substeps: {before} -> {after}");
}

/// Requires a live GPU adapter; run explicitly with `cargo test -- --ignored`.
#[test]
#[ignore]
fn gpu_solver_replay_is_deterministic_for_a_fixed_input_sequence() {
    use kinetic_mpm::material::MaterialTable;
    use kinetic_mpm::particle::{Particle, ParticleGpu};
    use kinetic_mpm::solver::Solver;

    let (device, queue) = pollster::block_on(request_headless_device());
    let seed_particles: Vec<ParticleGpu> = (0..128).map(|i| {
        let mut p = Particle::default();
        p.position = Vec3::new((i % 8) as f32 + 16.0, (i / 8) as f32 + 16.0, 16.0);
        p.to_gpu()
    }).collect();
    let materials = MaterialTable::default();

    let run = |particles: &[ParticleGpu]| {
        let solver = Solver::new(&device, particles, &materials, 64 * 64 * 64);
        for _ in 0..4 {
            solver.dispatch_substep(&device, &queue, false);
        }
        solver.read_particles_sync(&device, &queue)
    };

    let a = run(&seed_particles);
    let b = run(&seed_particles);
    assert_eq!(a.len(), b.len());
    for (pa, pb) in a.iter().zip(b.iter()) {
        assert!((pa.position[0] - pb.position[0]).abs() < 1e-5, "replaying the same seed state should be bit-for-bit deterministic");
    }
}

/// Requires a live GPU adapter; run explicitly with `cargo test -- --ignored`.
/// Sparse-grid mode is purely a dispatch-cost optimization (§4.B): toggling
/// the `sparse_grid` global must not change the physics any sparse pass
/// still touches, since it only skips kernel work over provably-empty
/// cells rather than changing the transfer math itself.
#[test]
#[ignore]
fn gpu_solver_sparse_grid_mode_matches_dense_grid_mode() {
    use kinetic_mpm::material::MaterialTable;
    use kinetic_mpm::particle::{Particle, ParticleGpu};
    use kinetic_mpm::solver::Solver;
    use kinetic_mpm::uniforms::GlobalUniforms;

    let (device, queue) = pollster::block_on(request_headless_device());
    let seed_particles: Vec<ParticleGpu> = (0..128)
        .map(|i| {
            let mut p = Particle::default();
            p.position = Vec3::new((i % 8) as f32 + 20.0, (i / 8) as f32 + 20.0, 20.0);
            p.to_gpu()
        })
        .collect();
    let materials = MaterialTable::default();

    let run = |particles: &[ParticleGpu], sparse: bool| {
        let solver = Solver::new(&device, particles, &materials, 64 * 64 * 64);
        solver.upload_globals(
            &queue,
            &GlobalUniforms {
                dt: 1.0 / 240.0,
                substep_count: 1,
                gravity_mode: 0,
                flip_ratio: 0.95,
                transfer_mode: 2,
                vorticity_enabled: 0,
                vorticity_epsilon: 0.0,
                sparse_grid: sparse as u32,
                gravity_vector: [0.0, -9.8, 0.0],
                grid_size: 64.0,
                bass: 0.0,
                mid: 0.0,
                treble: 0.0,
                beat_pulse: 0.0,
                flux: 0.0,
                stereo_balance: 0.0,
                energy: 0.0,
                anticipation: 0.0,
                force_field_count: 0,
                _pad_tail: [0.0; 3],
            },
        );
        for _ in 0..4 {
            solver.dispatch_substep(&device, &queue, false);
        }
        solver.read_particles_sync(&device, &queue)
    };

    let dense = run(&seed_particles, false);
    let sparse = run(&seed_particles, true);
    assert_eq!(dense.len(), sparse.len());
    for (pd, ps) in dense.iter().zip(sparse.iter()) {
        assert!(
            (pd.position[0] - ps.position[0]).abs() < 1e-4,
            "sparse-grid dispatch should reproduce dense-grid results for cells it actually touches"
        );
    }
}

/// Requires a live GPU adapter; run explicitly with `cargo test -- --ignored`.
/// Verifies `adaptive_dt`'s chosen step actually keeps the solver inside the
/// stability envelope it targets: running substeps at the adaptively-chosen
/// dt for a fast-moving particle population should not blow up positions
/// past a sane multiple of the grid extent (the CFL condition's whole
/// purpose per §4.I).
#[test]
#[ignore]
fn gpu_solver_adaptive_timestep_keeps_particles_within_cfl_stable_bounds() {
    use kinetic_mpm::material::MaterialTable;
    use kinetic_mpm::particle::{Particle, ParticleGpu};
    use kinetic_mpm::solver::{adaptive_dt, sample_max_speed, Solver};
    use kinetic_mpm::uniforms::GlobalUniforms;

    let (device, queue) = pollster::block_on(request_headless_device());
    let mut seed: Vec<Particle> = (0..128)
        .map(|i| {
            let mut p = Particle::default();
            p.position = Vec3::new((i % 8) as f32 + 28.0, (i / 8) as f32 + 28.0, 28.0);
            p.velocity = Vec3::new(40.0, 0.0, 0.0);
            p
        })
        .collect();

    let dt = adaptive_dt(sample_max_speed(&seed));
    let particles: Vec<ParticleGpu> = seed.iter_mut().map(|p| p.to_gpu()).collect();
    let materials = MaterialTable::default();
    let solver = Solver::new(&device, &particles, &materials, 64 * 64 * 64);
    solver.upload_globals(
        &queue,
        &GlobalUniforms {
            dt,
            substep_count: 1,
            gravity_mode: 3,
            flip_ratio: 0.95,
            transfer_mode: 2,
            vorticity_enabled: 0,
            vorticity_epsilon: 0.0,
            sparse_grid: 0,
            gravity_vector: [0.0, 0.0, 0.0],
            grid_size: 64.0,
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            beat_pulse: 0.0,
            flux: 0.0,
            stereo_balance: 0.0,
            energy: 0.0,
            anticipation: 0.0,
            force_field_count: 0,
            _pad_tail: [0.0; 3],
        },
    );

    for _ in 0..16 {
        solver.dispatch_substep(&device, &queue, false);
    }

    let after = solver.read_particles_sync(&device, &queue);
    for p in after.iter() {
        for axis in 0..3 {
            assert!(
                p.position[axis].is_finite() && p.position[axis].abs() < 256.0,
                "a CFL-adherent adaptive dt should keep particles from blowing past a few grid-widths, got {:?}",
                p.position
            );
        }
    }
}

async fn request_headless_device() -> (wgpu::Device, wgpu::Queue) {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor { backends: wgpu::Backends::PRIMARY, ..Default::default() });
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions { power_preference: wgpu::PowerPreference::default(), compatible_surface: None, force_fallback_adapter: false })
        .await
        .expect("a GPU adapter must be available to run these ignored tests");
    adapter
        .request_device(&wgpu::DeviceDescriptor { label: Some("Integration Test Device"), required_features: wgpu::Features::empty(), required_limits: wgpu::Limits::default(), memory_hints: Default::default() }, None)
        .await
        .expect("device creation should succeed on a valid adapter")
}
