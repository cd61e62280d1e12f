//! The MPM background grid and the single coordinate-transform module.
//!
//! Per §9's re-architecture note ("centralize grid↔world↔screen conversions
//! in a single module used by boundary, renderer, and viewport tracker") all
//! space conversions live here and nowhere else.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Default grid resolution per axis (§3.2).
pub const DEFAULT_GRID_SIZE: u32 = 64;

/// GPU-resident grid cell. No CPU mirror beyond the small sampling subrange
/// used for adaptive-dt velocity estimation (see `solver.rs`).
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GridCellGpu {
    pub momentum: [f32; 3],
    pub mass: f32,
    pub vorticity: [f32; 3],
    pub active: u32,
    /// Momentum before `grid_update.wgsl` applies gravity/force-field terms,
    /// sampled by G2P as the unforced PIC velocity the FLIP delta is taken
    /// against (§4.B).
    pub momentum_pic: [f32; 3],
    pub _pad0: f32,
}

impl Default for GridCellGpu {
    fn default() -> Self {
        Self {
            momentum: [0.0; 3],
            mass: 0.0,
            vorticity: [0.0; 3],
            active: 0,
            momentum_pic: [0.0; 3],
            _pad0: 0.0,
        }
    }
}

pub const GRID_CELL_WGSL_STRUCT: &str = r#"
struct GridCell {
    momentum: vec3<f32>,
    mass: f32,
    vorticity: vec3<f32>,
    active: u32,
    momentum_pic: vec3<f32>,
    _pad0: f32,
};
"#;

/// The three coordinate spaces named in §3.2. `Grid` is `[0,G]^3` and is the
/// only space the solver operates in; `World` is what the (external)
/// renderer and camera use; `Screen` is pixels, used only by the viewport
/// tracker's safe-zone computation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSize {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl GridSize {
    pub fn cubic(g: u32) -> Self {
        Self { x: g, y: g, z: g }
    }

    pub fn cell_count(&self) -> u32 {
        self.x * self.y * self.z
    }
}

/// `Gx = G*max(1,aspect), Gy = G*max(1,1/aspect), Gz = G`, per §4.C.
pub fn aspect_adapted_grid_size(base: u32, aspect: f32) -> GridSize {
    let gx = (base as f32 * aspect.max(1.0)).round().max(1.0) as u32;
    let gy = (base as f32 * (1.0 / aspect).max(1.0)).round().max(1.0) as u32;
    GridSize { x: gx, y: gy, z: base }
}

/// Grid -> World per §3.2: `(gx - Gx/2, gy, gz*0.4) / G`. `g` is the grid
/// size used to normalize; components are divided by the *same* scalar `g`
/// rather than each axis's own extent, so that for non-cubic aspect-adapted
/// grids the soft-containment radius and world extents stay consistent.
pub fn grid_to_world(pos: Vec3, grid: GridSize, base_g: f32) -> Vec3 {
    Vec3::new(
        (pos.x - grid.x as f32 / 2.0) / base_g,
        pos.y / base_g,
        (pos.z * 0.4) / base_g,
    )
}

pub fn world_to_grid(pos: Vec3, grid: GridSize, base_g: f32) -> Vec3 {
    Vec3::new(
        pos.x * base_g + grid.x as f32 / 2.0,
        pos.y * base_g,
        (pos.z * base_g) / 0.4,
    )
}

/// WGSL helper functions mirroring the above, emitted once into the
/// solver's shared shader prelude (§9: one module, used everywhere).
pub const COORD_TRANSFORM_WGSL: &str = r#"
fn grid_to_world(pos: vec3<f32>, grid_x: f32, base_g: f32) -> vec3<f32> {
    return vec3<f32>(
        (pos.x - grid_x * 0.5) / base_g,
        pos.y / base_g,
        (pos.z * 0.4) / base_g
    );
}
"#;

/// WGSL has no `atomic<f32>`, so P2G's atomic mass/momentum scatter (§4.B
/// passes 2-3) lands in a fixed-point scratch buffer instead of `GridCell`
/// directly: each `f32` contribution is scaled by `FIXED_POINT_SCALE` and
/// atomically added as an `i32`. `grid_update.wgsl` divides back down when
/// it converts this scratch buffer into the real `GridCell` velocities.
pub const FIXED_POINT_SCALE: f32 = 1.0e7;

pub const ATOMIC_GRID_CELL_WGSL_STRUCT: &str = r#"
struct AtomicGridCell {
    momentum_fixed: array<atomic<i32>, 3>,
    mass_fixed: atomic<i32>,
    active: atomic<u32>,
};
"#;

pub const FIXED_POINT_ATOMIC_WGSL: &str = r#"
const FIXED_POINT_SCALE: f32 = 1.0e7;

fn atomic_add_fixed(cell: ptr<storage, atomic<i32>, read_write>, value: f32) {
    atomicAdd(cell, i32(value * FIXED_POINT_SCALE));
}

fn fixed_to_float(v: i32) -> f32 {
    return f32(v) / FIXED_POINT_SCALE;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_world_round_trip() {
        let grid = GridSize::cubic(64);
        let p = Vec3::new(10.0, 20.0, 5.0);
        let world = grid_to_world(p, grid, 64.0);
        let back = world_to_grid(world, grid, 64.0);
        assert!((back - p).length() < 1e-4);
    }

    #[test]
    fn aspect_adaptation_widens_the_wider_axis() {
        let g = aspect_adapted_grid_size(64, 1.5);
        assert_eq!(g.x, 96);
        assert_eq!(g.y, 64);
        assert_eq!(g.z, 64);
    }

    #[test]
    fn cell_count_matches_product() {
        let g = GridSize { x: 4, y: 5, z: 6 };
        assert_eq!(g.cell_count(), 120);
    }
}
