//! GPU dispatch for the five-pass MLS-MPM substep (§4.B) plus the vorticity
//! precomputation pass, adaptive-timestep selection, and the WGSL
//! shader-source assembly that stitches the struct/function constants
//! scattered across `particle.rs`/`grid.rs`/`material.rs`/`forcefield.rs`/
//! `boundary.rs`/`uniforms.rs`/`shader_utils.rs` onto each kernel body.
//!
//! One struct owns every device-created buffer/pipeline/bind group, with
//! `Pod` uploads via `bytemuck`, fixed to six kernels with a static
//! bind-group schema rather than dynamic optional-subsystem composition.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::boundary::{
    BoundaryUniforms, BOUNDARY_UNIFORMS_WGSL_STRUCT, COLLISION_RESULT_WGSL_STRUCT, COLLISION_WGSL_FUNCTION,
};
use crate::forcefield::{ForceFieldGpu, FORCE_ACCUMULATION_WGSL, FORCE_FIELD_WGSL_STRUCT, MAX_FORCE_FIELDS};
use crate::grid::{ATOMIC_GRID_CELL_WGSL_STRUCT, FIXED_POINT_ATOMIC_WGSL, GRID_CELL_WGSL_STRUCT};
use crate::material::{MaterialTable, MATERIAL_PARAMS_WGSL_STRUCT};
use crate::particle::ParticleGpu;
use crate::shader_utils::all_utils_wgsl;
use crate::uniforms::{GlobalUniforms, GLOBAL_UNIFORMS_WGSL_STRUCT, PerParticleMapperGpu, PER_PARTICLE_MAPPER_WGSL_STRUCT};

const WORKGROUP_SIZE: u32 = 256;

/// CFL-based adaptive timestep (§4.B "Substepping and adaptive dt").
pub const CFL: f32 = 0.7;
pub const DT_MIN: f32 = 1e-3;
pub const DT_MAX: f32 = 5e-2;

/// `dt = clamp(cfl * dx / max(v_max, eps), dt_min, dt_max)`. `dx` is one
/// grid cell's world extent, taken as `1.0` since the solver operates
/// entirely in grid units (§3.2).
pub fn adaptive_dt(v_max: f32) -> f32 {
    let dx = 1.0_f32;
    (CFL * dx / v_max.max(1e-4)).clamp(DT_MIN, DT_MAX)
}

/// Samples every `stride`-th particle's speed from the CPU mirror, per
/// §4.B's "sample ~N/64 particles" rule.
pub fn sample_max_speed(particles: &[crate::particle::Particle]) -> f32 {
    if particles.is_empty() {
        return 0.0;
    }
    let stride = (particles.len() / 64).max(1);
    particles
        .iter()
        .step_by(stride)
        .map(|p| p.velocity.length())
        .fold(0.0_f32, f32::max)
}

/// Six substeps per frame at the nominal 60fps/dt_max cadence is the typical
/// baseline (§4.B); this bounds the loop when a stalled frame or a tiny
/// adaptive `dt` would otherwise demand an unreasonable substep count.
pub const MAX_SUBSTEPS: u32 = 16;

/// Derives the substep count from how many `dt`-sized steps fit in the
/// frame's (already speed-scaled) interval, so total simulated time tracks
/// wall-clock time rather than staying fixed at one step (§4.I step 4).
pub fn substep_count(frame_dt: f32, dt: f32) -> u32 {
    (frame_dt / dt.max(1e-6)).round().clamp(1.0, MAX_SUBSTEPS as f32) as u32
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn make_pipeline(
    device: &wgpu::Device,
    label: &str,
    source: &str,
    layout: &wgpu::BindGroupLayout,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// Common struct prelude shared by every kernel. Individual kernels append
/// only the function bodies they actually call.
fn shared_struct_prelude() -> String {
    format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
        crate::particle::PARTICLE_WGSL_STRUCT,
        GRID_CELL_WGSL_STRUCT,
        ATOMIC_GRID_CELL_WGSL_STRUCT,
        GLOBAL_UNIFORMS_WGSL_STRUCT,
        PER_PARTICLE_MAPPER_WGSL_STRUCT,
        BOUNDARY_UNIFORMS_WGSL_STRUCT,
        FORCE_FIELD_WGSL_STRUCT,
    )
}

fn clear_grid_source() -> String {
    format!("{}{}", shared_struct_prelude(), include_str!("../shaders/clear_grid.wgsl"))
}

fn p2g1_source() -> String {
    format!("{}{}\n{}", shared_struct_prelude(), FIXED_POINT_ATOMIC_WGSL, include_str!("../shaders/p2g1.wgsl"))
}

fn p2g2_source(materials: &MaterialTable) -> String {
    format!(
        "{}{}\n{}\n{}\n{}\n{}",
        shared_struct_prelude(),
        FIXED_POINT_ATOMIC_WGSL,
        MATERIAL_PARAMS_WGSL_STRUCT,
        materials.to_wgsl_table(),
        NOISE_ONLY_WGSL,
        include_str!("../shaders/p2g2.wgsl"),
    )
}

fn grid_update_source() -> String {
    format!(
        "{}{}\n{}\n{}",
        shared_struct_prelude(),
        FIXED_POINT_ATOMIC_WGSL,
        FORCE_ACCUMULATION_WGSL,
        include_str!("../shaders/grid_update.wgsl"),
    )
}

fn vorticity_source() -> String {
    format!("{}{}", shared_struct_prelude(), include_str!("../shaders/vorticity.wgsl"))
}

fn g2p_source(materials: &MaterialTable) -> String {
    format!(
        "{}{}\n{}\n{}\n{}\n{}\n{}",
        shared_struct_prelude(),
        MATERIAL_PARAMS_WGSL_STRUCT,
        materials.to_wgsl_table(),
        all_utils_wgsl(),
        FORCE_ACCUMULATION_WGSL,
        format!("{}\n{}", COLLISION_RESULT_WGSL_STRUCT, COLLISION_WGSL_FUNCTION),
        include_str!("../shaders/g2p.wgsl"),
    )
}

/// `noise3` alone, without the random/color helpers p2g2 doesn't need.
const NOISE_ONLY_WGSL: &str = r#"
fn mod289_3(x: vec3<f32>) -> vec3<f32> { return x - floor(x * (1.0 / 289.0)) * 289.0; }
fn mod289_4(x: vec4<f32>) -> vec4<f32> { return x - floor(x * (1.0 / 289.0)) * 289.0; }
fn permute4(x: vec4<f32>) -> vec4<f32> { return mod289_4(((x * 34.0) + 1.0) * x); }
fn taylor_inv_sqrt4(r: vec4<f32>) -> vec4<f32> { return 1.79284291400159 - 0.85373472095314 * r; }
fn noise3(v: vec3<f32>) -> f32 {
    let C = vec2<f32>(1.0/6.0, 1.0/3.0);
    let D = vec4<f32>(0.0, 0.5, 1.0, 2.0);
    var i = floor(v + dot(v, vec3(C.y)));
    let x0 = v - i + dot(i, vec3(C.x));
    let g = step(x0.yzx, x0.xyz);
    let l = 1.0 - g;
    let i1 = min(g.xyz, l.zxy);
    let i2 = max(g.xyz, l.zxy);
    let x1 = x0 - i1 + C.x;
    let x2 = x0 - i2 + C.y;
    let x3 = x0 - D.yyy;
    i = mod289_3(i);
    let p = permute4(permute4(permute4(
        i.z + vec4<f32>(0.0, i1.z, i2.z, 1.0))
      + i.y + vec4<f32>(0.0, i1.y, i2.y, 1.0))
      + i.x + vec4<f32>(0.0, i1.x, i2.x, 1.0));
    let n_ = 0.142857142857;
    let ns = n_ * D.wyz - D.xzx;
    let j = p - 49.0 * floor(p * ns.z * ns.z);
    let x_ = floor(j * ns.z);
    let y_ = floor(j - 7.0 * x_);
    let x = x_ * ns.x + ns.yyyy;
    let y = y_ * ns.x + ns.yyyy;
    let h = 1.0 - abs(x) - abs(y);
    let b0 = vec4<f32>(x.xy, y.xy);
    let b1 = vec4<f32>(x.zw, y.zw);
    let s0 = floor(b0) * 2.0 + 1.0;
    let s1 = floor(b1) * 2.0 + 1.0;
    let sh = -step(h, vec4<f32>(0.0));
    let a0 = b0.xzyw + s0.xzyw * sh.xxyy;
    let a1 = b1.xzyw + s1.xzyw * sh.zzww;
    var p0 = vec3<f32>(a0.xy, h.x);
    var p1 = vec3<f32>(a0.zw, h.y);
    var p2 = vec3<f32>(a1.xy, h.z);
    var p3 = vec3<f32>(a1.zw, h.w);
    let norm = taylor_inv_sqrt4(vec4<f32>(dot(p0,p0), dot(p1,p1), dot(p2,p2), dot(p3,p3)));
    p0 *= norm.x; p1 *= norm.y; p2 *= norm.z; p3 *= norm.w;
    var m = max(0.6 - vec4<f32>(dot(x0,x0), dot(x1,x1), dot(x2,x2), dot(x3,x3)), vec4<f32>(0.0));
    m = m * m;
    return 42.0 * dot(m*m, vec4<f32>(dot(p0,x0), dot(p1,x1), dot(p2,x2), dot(p3,x3)));
}
"#;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct ForceFieldArrayUpload {
    fields: [ForceFieldGpu; MAX_FORCE_FIELDS],
}

/// Owns every GPU-resident buffer and compute pipeline the solver touches.
/// The particle buffer is also read by the renderer (outside this module);
/// everything else is solver-private.
pub struct Solver {
    pub particle_buffer: wgpu::Buffer,
    mapper_buffer: wgpu::Buffer,
    grid_buffer: wgpu::Buffer,
    atomic_grid_buffer: wgpu::Buffer,
    globals_buffer: wgpu::Buffer,
    boundary_buffer: wgpu::Buffer,
    force_fields_buffer: wgpu::Buffer,

    clear_grid_pipeline: wgpu::ComputePipeline,
    clear_grid_bind_group: wgpu::BindGroup,
    p2g1_pipeline: wgpu::ComputePipeline,
    p2g1_bind_group: wgpu::BindGroup,
    p2g2_pipeline: wgpu::ComputePipeline,
    p2g2_bind_group: wgpu::BindGroup,
    grid_update_pipeline: wgpu::ComputePipeline,
    grid_update_bind_group: wgpu::BindGroup,
    vorticity_pipeline: wgpu::ComputePipeline,
    vorticity_bind_group: wgpu::BindGroup,
    g2p_pipeline: wgpu::ComputePipeline,
    g2p_bind_group: wgpu::BindGroup,

    num_particles: u32,
    cell_count: u32,
}

impl Solver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        device: &wgpu::Device,
        particle_data: &[ParticleGpu],
        materials: &MaterialTable,
        grid_cell_count: u32,
    ) -> Self {
        let num_particles = particle_data.len() as u32;
        let cell_count = grid_cell_count;

        let particle_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Buffer"),
            contents: bytemuck::cast_slice(particle_data),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
        });

        let mapper_data = vec![PerParticleMapperGpu::zeroed(); particle_data.len()];
        let mapper_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Per-Particle Mapper Buffer"),
            contents: bytemuck::cast_slice(&mapper_data),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
        });

        let grid_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Grid Buffer"),
            size: (cell_count as u64) * std::mem::size_of::<crate::grid::GridCellGpu>() as u64,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let atomic_cell_size = 5 * std::mem::size_of::<i32>() as u64; // 3 momentum + mass + active
        let atomic_grid_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Atomic Grid Buffer"),
            size: (cell_count as u64) * atomic_cell_size,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Global Uniforms"),
            size: std::mem::size_of::<GlobalUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let boundary_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Boundary Uniforms"),
            size: std::mem::size_of::<BoundaryUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let force_fields_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Force Field Array"),
            size: std::mem::size_of::<ForceFieldArrayUpload>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // clear_grid: atomic_grid(rw,0), grid(rw,1), globals(uniform,2)
        let clear_grid_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Clear Grid Layout"),
            entries: &[storage_entry(0, false), storage_entry(1, false), uniform_entry(2)],
        });
        let clear_grid_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Clear Grid Bind Group"),
            layout: &clear_grid_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: atomic_grid_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: grid_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: globals_buffer.as_entire_binding() },
            ],
        });
        let clear_grid_pipeline = make_pipeline(device, "Clear Grid Pipeline", &clear_grid_source(), &clear_grid_layout);

        // p2g1: particles(rw,0), atomic_grid(rw,1), globals(uniform,2)
        let p2g1_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("P2G1 Layout"),
            entries: &[storage_entry(0, false), storage_entry(1, false), uniform_entry(2)],
        });
        let p2g1_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("P2G1 Bind Group"),
            layout: &p2g1_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: particle_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: atomic_grid_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: globals_buffer.as_entire_binding() },
            ],
        });
        let p2g1_pipeline = make_pipeline(device, "P2G1 Pipeline", &p2g1_source(), &p2g1_layout);

        // p2g2: same shape as p2g1
        let p2g2_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("P2G2 Layout"),
            entries: &[storage_entry(0, false), storage_entry(1, false), uniform_entry(2)],
        });
        let p2g2_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("P2G2 Bind Group"),
            layout: &p2g2_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: particle_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: atomic_grid_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: globals_buffer.as_entire_binding() },
            ],
        });
        let p2g2_pipeline = make_pipeline(device, "P2G2 Pipeline", &p2g2_source(materials), &p2g2_layout);

        // grid_update: atomic_grid(rw,0), grid(rw,1), globals(uniform,2), force_fields(uniform,3)
        let grid_update_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Grid Update Layout"),
            entries: &[storage_entry(0, false), storage_entry(1, false), uniform_entry(2), uniform_entry(3)],
        });
        let grid_update_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Grid Update Bind Group"),
            layout: &grid_update_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: atomic_grid_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: grid_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: globals_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: force_fields_buffer.as_entire_binding() },
            ],
        });
        let grid_update_pipeline = make_pipeline(device, "Grid Update Pipeline", &grid_update_source(), &grid_update_layout);

        // vorticity: grid(rw,0), globals(uniform,1)
        let vorticity_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Vorticity Layout"),
            entries: &[storage_entry(0, false), uniform_entry(1)],
        });
        let vorticity_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Vorticity Bind Group"),
            layout: &vorticity_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: grid_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: globals_buffer.as_entire_binding() },
            ],
        });
        let vorticity_pipeline = make_pipeline(device, "Vorticity Pipeline", &vorticity_source(), &vorticity_layout);

        // g2p: particles(rw,0), grid(ro,1), mapper(ro,2), globals(uniform,3), boundary(uniform,4), force_fields(uniform,5)
        let g2p_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("G2P Layout"),
            entries: &[
                storage_entry(0, false),
                storage_entry(1, true),
                storage_entry(2, true),
                uniform_entry(3),
                uniform_entry(4),
                uniform_entry(5),
            ],
        });
        let g2p_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("G2P Bind Group"),
            layout: &g2p_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: particle_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: grid_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: mapper_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 3, resource: globals_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 4, resource: boundary_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 5, resource: force_fields_buffer.as_entire_binding() },
            ],
        });
        let g2p_pipeline = make_pipeline(device, "G2P Pipeline", &g2p_source(materials), &g2p_layout);

        tracing::info!(num_particles, cell_count, "solver pipelines built");

        Self {
            particle_buffer,
            mapper_buffer,
            grid_buffer,
            atomic_grid_buffer,
            globals_buffer,
            boundary_buffer,
            force_fields_buffer,
            clear_grid_pipeline,
            clear_grid_bind_group,
            p2g1_pipeline,
            p2g1_bind_group,
            p2g2_pipeline,
            p2g2_bind_group,
            grid_update_pipeline,
            grid_update_bind_group,
            vorticity_pipeline,
            vorticity_bind_group,
            g2p_pipeline,
            g2p_bind_group,
            num_particles,
            cell_count,
        }
    }

    pub fn upload_globals(&self, queue: &wgpu::Queue, globals: &GlobalUniforms) {
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(globals));
    }

    pub fn upload_boundary(&self, queue: &wgpu::Queue, boundary: &BoundaryUniforms) {
        queue.write_buffer(&self.boundary_buffer, 0, bytemuck::bytes_of(boundary));
    }

    pub fn upload_force_fields(&self, queue: &wgpu::Queue, fields: [ForceFieldGpu; MAX_FORCE_FIELDS]) {
        queue.write_buffer(&self.force_fields_buffer, 0, bytemuck::bytes_of(&ForceFieldArrayUpload { fields }));
    }

    pub fn upload_mapper(&self, queue: &wgpu::Queue, mapper: &[PerParticleMapperGpu]) {
        queue.write_buffer(&self.mapper_buffer, 0, bytemuck::cast_slice(mapper));
    }

    /// Writes one particle slot directly (§4.A `allocateFromFreeList`).
    /// The orchestrator finds dead slots (`mass <= 0`) in its CPU mirror and
    /// overwrites them with freshly emitted particles here, rather than
    /// growing the buffer — particle count is fixed at `Solver::new` time.
    pub fn write_particle(&self, queue: &wgpu::Queue, index: u32, particle: &ParticleGpu) {
        let stride = std::mem::size_of::<ParticleGpu>() as u64;
        queue.write_buffer(&self.particle_buffer, index as u64 * stride, bytemuck::bytes_of(particle));
    }

    /// Runs one substep: clear-grid -> P2G1 -> P2G2 -> grid-update ->
    /// [vorticity] -> G2P, in that fixed order (§4.B, §9: deterministic
    /// pass ordering is relied upon for correctness, never reordered).
    pub fn dispatch_substep(&self, device: &wgpu::Device, queue: &wgpu::Queue, vorticity_enabled: bool) {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Solver Substep Encoder"),
        });

        let cell_workgroups = self.cell_count.div_ceil(WORKGROUP_SIZE);
        let particle_workgroups = self.num_particles.div_ceil(WORKGROUP_SIZE);

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("Clear Grid"), timestamp_writes: None });
            pass.set_pipeline(&self.clear_grid_pipeline);
            pass.set_bind_group(0, &self.clear_grid_bind_group, &[]);
            pass.dispatch_workgroups(cell_workgroups, 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("P2G1"), timestamp_writes: None });
            pass.set_pipeline(&self.p2g1_pipeline);
            pass.set_bind_group(0, &self.p2g1_bind_group, &[]);
            pass.dispatch_workgroups(particle_workgroups, 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("P2G2"), timestamp_writes: None });
            pass.set_pipeline(&self.p2g2_pipeline);
            pass.set_bind_group(0, &self.p2g2_bind_group, &[]);
            pass.dispatch_workgroups(particle_workgroups, 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("Grid Update"), timestamp_writes: None });
            pass.set_pipeline(&self.grid_update_pipeline);
            pass.set_bind_group(0, &self.grid_update_bind_group, &[]);
            pass.dispatch_workgroups(cell_workgroups, 1, 1);
        }
        if vorticity_enabled {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("Vorticity"), timestamp_writes: None });
            pass.set_pipeline(&self.vorticity_pipeline);
            pass.set_bind_group(0, &self.vorticity_bind_group, &[]);
            pass.dispatch_workgroups(cell_workgroups, 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor { label: Some("G2P"), timestamp_writes: None });
            pass.set_pipeline(&self.g2p_pipeline);
            pass.set_bind_group(0, &self.g2p_bind_group, &[]);
            pass.dispatch_workgroups(particle_workgroups, 1, 1);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    pub fn num_particles(&self) -> u32 {
        self.num_particles
    }

    /// Blocking particle readback (§4.A "CPU-visible mirrors are explicit,
    /// separate fields, never implicit readbacks"): staging-buffer copy +
    /// `map_async` + `device.poll(Maintain::Wait)`. The orchestrator calls
    /// this once per frame to refresh the CPU mirror that role/personality/
    /// spatial scoring reads from (§4.H).
    pub fn read_particles_sync(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Vec<ParticleGpu> {
        let stride = std::mem::size_of::<ParticleGpu>();
        let buffer_size = (self.num_particles as usize) * stride;

        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Readback Staging Buffer"),
            size: buffer_size as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Readback Encoder") });
        encoder.copy_buffer_to_buffer(&self.particle_buffer, 0, &staging, 0, buffer_size as u64);
        queue.submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            tx.send(result).unwrap();
        });
        device.poll(wgpu::Maintain::Wait);
        rx.recv().unwrap().expect("failed to map particle readback buffer");

        let data = slice.get_mapped_range();
        let particles: Vec<ParticleGpu> = bytemuck::cast_slice(&data).to_vec();
        drop(data);
        staging.unmap();
        particles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adaptive_dt_clamps_to_dt_max_when_nearly_still() {
        assert!((adaptive_dt(0.0) - DT_MAX).abs() < 1e-6);
    }

    #[test]
    fn adaptive_dt_clamps_to_dt_min_when_very_fast() {
        assert!((adaptive_dt(1e6) - DT_MIN).abs() < 1e-6);
    }

    #[test]
    fn sample_max_speed_finds_the_fastest_sampled_particle() {
        let mut particles = vec![crate::particle::Particle::default(); 128];
        particles[10].velocity = glam::Vec3::new(3.0, 0.0, 0.0);
        let v = sample_max_speed(&particles);
        assert!(v > 0.0);
    }

    #[test]
    fn sample_max_speed_is_zero_for_empty_slice() {
        assert_eq!(sample_max_speed(&[]), 0.0);
    }

    #[test]
    fn substep_count_tracks_frame_interval() {
        assert_eq!(substep_count(1.0 / 60.0, 1.0 / 360.0), 6);
    }

    #[test]
    fn substep_count_never_drops_below_one() {
        assert_eq!(substep_count(1.0 / 600.0, 1.0 / 10.0), 1);
    }

    #[test]
    fn substep_count_clamps_to_max_substeps() {
        assert_eq!(substep_count(10.0, 1e-4), MAX_SUBSTEPS);
    }

    fn validate_wgsl(label: &str, source: &str) {
        let module = naga::front::wgsl::parse_str(source).unwrap_or_else(|e| panic!("{label} failed to parse: {e}"));
        let mut validator =
            naga::valid::Validator::new(naga::valid::ValidationFlags::all(), naga::valid::Capabilities::all());
        validator.validate(&module).unwrap_or_else(|e| panic!("{label} failed validation: {e}"));
    }

    #[test]
    fn clear_grid_kernel_is_valid_wgsl() {
        validate_wgsl("clear_grid", &clear_grid_source());
    }

    #[test]
    fn p2g1_kernel_is_valid_wgsl() {
        validate_wgsl("p2g1", &p2g1_source());
    }

    #[test]
    fn p2g2_kernel_is_valid_wgsl() {
        let materials = MaterialTable::default();
        validate_wgsl("p2g2", &p2g2_source(&materials));
    }

    #[test]
    fn grid_update_kernel_is_valid_wgsl() {
        validate_wgsl("grid_update", &grid_update_source());
    }

    #[test]
    fn vorticity_kernel_is_valid_wgsl() {
        validate_wgsl("vorticity", &vorticity_source());
    }

    #[test]
    fn g2p_kernel_is_valid_wgsl() {
        let materials = MaterialTable::default();
        validate_wgsl("g2p", &g2p_source(&materials));
    }
}
