//! Benchmarks for CPU-side WGSL codegen and the kinetic-mapping hot path.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;
use kinetic_mpm::forcefield::{falloff, FalloffMode, ForceField, ForceFieldSet};
use kinetic_mpm::material::MaterialTable;

fn bench_material_table_to_wgsl(c: &mut Criterion) {
    let table = MaterialTable::default();
    c.bench_function("material_table_to_wgsl", |b| {
        b.iter(|| black_box(table.to_wgsl_table()));
    });
}

fn bench_force_field_set_to_gpu_array(c: &mut Criterion) {
    let mut group = c.benchmark_group("force_field_set_to_gpu_array");

    for count in [1usize, 8, 16] {
        let mut set = ForceFieldSet::default();
        for i in 0..count {
            set.push(ForceField::attractor(Vec3::splat(i as f32), 1.0, 4.0));
        }
        group.bench_with_input(BenchmarkId::new("fields", count), &count, |b, _| {
            b.iter(|| black_box(set.to_gpu_array()));
        });
    }

    group.finish();
}

fn bench_falloff(c: &mut Criterion) {
    let mut group = c.benchmark_group("falloff");

    group.bench_function("linear", |b| {
        b.iter(|| black_box(falloff(FalloffMode::Linear, 2.0, 5.0)));
    });
    group.bench_function("quadratic", |b| {
        b.iter(|| black_box(falloff(FalloffMode::Quadratic, 2.0, 5.0)));
    });
    group.bench_function("smooth_hermite", |b| {
        b.iter(|| black_box(falloff(FalloffMode::SmoothHermite, 2.0, 5.0)));
    });

    group.finish();
}

criterion_group!(benches, bench_material_table_to_wgsl, bench_force_field_set_to_gpu_array, bench_falloff);
criterion_main!(benches);
