//! Boundary/collision subsystem (§4.C) and the viewport tracker.
//!
//! The collision function is the sole site of boundary enforcement (§9);
//! this module only *produces* the uniforms the WGSL function consumes —
//! it never applies a second copy of wall logic itself.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum BoundaryShape {
    None = 0,
    Box = 1,
    Sphere = 2,
    Tube = 3,
    Dodecahedron = 4,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum CollisionMode {
    Reflect = 0,
    Clamp = 1,
    Wrap = 2,
    Kill = 3,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct BoundaryUniforms {
    pub enabled: u32,
    pub shape: u32,
    pub stiffness: f32,
    pub restitution: f32,
    pub friction: f32,
    pub dt: f32,
    pub grid_size: f32,
    pub viewport_pulse: f32,
    pub min: [f32; 3],
    pub _pad0: f32,
    pub max: [f32; 3],
    pub _pad1: f32,
    pub center: [f32; 3],
    pub radius: f32,
    pub collision_mode: u32,
    pub _pad2: [f32; 3],
}

pub const BOUNDARY_UNIFORMS_WGSL_STRUCT: &str = r#"
struct BoundaryUniforms {
    enabled: u32,
    shape: u32,
    stiffness: f32,
    restitution: f32,
    friction: f32,
    dt: f32,
    grid_size: f32,
    viewport_pulse: f32,
    min: vec3<f32>,
    max: vec3<f32>,
    center: vec3<f32>,
    radius: f32,
    collision_mode: u32,
};
"#;

/// The single WGSL collision function, called from G2P. Mirrors §4.C
/// exactly: soft radial containment in viewport mode, hard per-shape
/// reflection otherwise. Returns the updated `(position, velocity)` pair
/// packed in a `CollisionResult` struct (declared alongside this function in
/// the generated shader prelude).
pub const COLLISION_RESULT_WGSL_STRUCT: &str = r#"
struct CollisionResult {
    position: vec3<f32>,
    velocity: vec3<f32>,
    killed: u32,
};
"#;

pub const COLLISION_WGSL_FUNCTION: &str = r#"
fn apply_boundary_collision(pos_in: vec3<f32>, vel_in: vec3<f32>, b: BoundaryUniforms) -> CollisionResult {
    var position = pos_in;
    var velocity = vel_in;
    let grid_center = vec3<f32>(b.grid_size * 0.5, b.grid_size * 0.5, b.grid_size * 0.5);

    if b.enabled == 0u {
        let viewport_radius = b.grid_size * 0.5 * (1.0 + b.viewport_pulse);
        let to_center = position - grid_center;
        let r = length(to_center) / viewport_radius;
        if r > 0.7 {
            let falloff = (r - 0.7) * (r - 0.7);
            let dir = normalize(to_center + vec3<f32>(1e-6, 0.0, 0.0));
            velocity -= falloff * b.stiffness * dir;
        }
        if r > 1.05 {
            let dir = normalize(to_center + vec3<f32>(1e-6, 0.0, 0.0));
            position = grid_center + dir * (1.05 * viewport_radius);
        }
        return CollisionResult(position, velocity, 0u);
    }

    var n = vec3<f32>(0.0, 1.0, 0.0);
    var penetration = 0.0;

    if b.shape == 1u {
        // Box: six axis-aligned half-spaces.
        let d_min = position - b.min;
        let d_max = b.max - position;
        var best = 1e9;
        if d_min.x < best { best = d_min.x; n = vec3<f32>(1.0, 0.0, 0.0); }
        if d_min.y < best { best = d_min.y; n = vec3<f32>(0.0, 1.0, 0.0); }
        if d_min.z < best { best = d_min.z; n = vec3<f32>(0.0, 0.0, 1.0); }
        if d_max.x < best { best = d_max.x; n = vec3<f32>(-1.0, 0.0, 0.0); }
        if d_max.y < best { best = d_max.y; n = vec3<f32>(0.0, -1.0, 0.0); }
        if d_max.z < best { best = d_max.z; n = vec3<f32>(0.0, 0.0, -1.0); }
        penetration = -best;
    } else if b.shape == 2u || b.shape == 4u {
        // Sphere / Dodecahedron: radial distance to center.
        let to_center = position - b.center;
        let dist = length(to_center);
        n = normalize(to_center + vec3<f32>(1e-6, 0.0, 0.0));
        penetration = dist - b.radius;
        penetration = -penetration; // positive when outside pushing inward
    } else if b.shape == 3u {
        // Tube: radial XY combined with Z caps.
        let to_center_xy = vec2<f32>(position.x - b.center.x, position.z - b.center.z);
        let radial_dist = length(to_center_xy);
        let radial_pen = b.radius - radial_dist;
        let z_pen = min(position.y - b.min.y, b.max.y - position.y);
        if radial_pen < z_pen {
            let dir2 = normalize(to_center_xy + vec2<f32>(1e-6, 0.0));
            n = vec3<f32>(dir2.x, 0.0, dir2.y);
            penetration = -radial_pen;
        } else {
            n = select(vec3<f32>(0.0, 1.0, 0.0), vec3<f32>(0.0, -1.0, 0.0), position.y - b.min.y > b.max.y - position.y);
            penetration = -z_pen;
        }
    }

    if penetration > 0.0 {
        if b.collision_mode == 3u {
            // Kill: leave position/velocity untouched, caller zeroes mass.
            return CollisionResult(position, velocity, 1u);
        } else if b.collision_mode == 2u {
            // Wrap: teleport to the opposite face of the axis-aligned span.
            position = wrap_position(position, b.min, b.max);
        } else if b.collision_mode == 1u {
            // Clamp: kill the outward normal component, damp tangential by friction, no bounce.
            let v_normal = dot(velocity, n) * n;
            let v_tangent = velocity - v_normal;
            velocity = v_tangent * (1.0 - b.friction);
            position += n * penetration;
        } else {
            let vn = max(0.0, dot(velocity, n));
            velocity -= (1.0 + b.restitution) * vn * n;
            let v_normal = dot(velocity, n) * n;
            let v_tangent = velocity - v_normal;
            velocity = v_normal + v_tangent * (1.0 - b.friction);
            position += n * penetration;
        }
    }

    return CollisionResult(position, velocity, 0u);
}

fn wrap_position(pos: vec3<f32>, lo: vec3<f32>, hi: vec3<f32>) -> vec3<f32> {
    let span = max(hi - lo, vec3<f32>(1e-3, 1e-3, 1e-3));
    return lo + (((pos - lo) % span) + span) % span;
}
"#;

#[derive(Clone, Debug)]
pub struct BoundaryConfig {
    pub shape: BoundaryShape,
    pub enabled: bool,
    pub stiffness: f32,
    pub soft_stiffness: f32,
    pub restitution: f32,
    pub friction: f32,
    pub collision_mode: CollisionMode,
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
    /// EMA-smoothed bass-driven pulse, τ ≈ 120 ms (§4.C).
    viewport_pulse: f32,
}

impl Default for BoundaryConfig {
    fn default() -> Self {
        Self {
            shape: BoundaryShape::None,
            enabled: false,
            stiffness: 40.0,
            soft_stiffness: 8.0,
            restitution: 0.3,
            friction: 0.1,
            collision_mode: CollisionMode::Reflect,
            min: Vec3::ZERO,
            max: Vec3::splat(64.0),
            center: Vec3::splat(32.0),
            radius: 24.0,
            viewport_pulse: 0.0,
        }
    }
}

impl BoundaryConfig {
    /// Updates the smoothed `viewportPulse` toward a raw bass-derived
    /// target, with a ~120ms time constant. `raw` is clamped to [0, 0.3].
    pub fn update_viewport_pulse(&mut self, raw_bass: f32, dt: f32) {
        let target = raw_bass.clamp(0.0, 0.3);
        let tau = 0.12_f32;
        let alpha = 1.0 - (-dt / tau).exp();
        self.viewport_pulse += (target - self.viewport_pulse) * alpha;
    }

    pub fn to_uniforms(&self, dt: f32, grid_size: f32) -> BoundaryUniforms {
        BoundaryUniforms {
            enabled: self.enabled as u32,
            shape: self.shape as u32,
            stiffness: self.soft_stiffness,
            restitution: self.restitution,
            friction: self.friction,
            dt,
            grid_size,
            viewport_pulse: self.viewport_pulse,
            min: self.min.to_array(),
            _pad0: 0.0,
            max: self.max.to_array(),
            _pad1: 0.0,
            center: self.center.to_array(),
            radius: self.radius,
            collision_mode: self.collision_mode as u32,
            _pad2: [0.0; 3],
        }
    }
}

/// Screen-space rectangle, used for UI-panel exclusion in safe-zone
/// computation.
#[derive(Clone, Copy, Debug)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Observes window size and UI-panel rectangles and derives a safe zone and
/// aspect-adapted grid size. No subscription/observer machinery (§9): the
/// host calls `update` once per frame with the latest rectangles.
#[derive(Clone, Debug, Default)]
pub struct ViewportTracker {
    pub window_width: f32,
    pub window_height: f32,
    pub safe_zone: Option<ScreenRect>,
    last_aspect: f32,
}

impl ViewportTracker {
    pub fn new() -> Self {
        Self { last_aspect: 1.0, ..Default::default() }
    }

    /// Recomputes the safe zone (window rect minus the union of panel
    /// rects) and returns `true` if the aspect ratio changed enough to
    /// require regenerating grid size / container geometry.
    pub fn update(&mut self, window_width: f32, window_height: f32, panel_rects: &[ScreenRect]) -> bool {
        self.window_width = window_width;
        self.window_height = window_height;

        let mut safe = ScreenRect { x: 0.0, y: 0.0, width: window_width, height: window_height };
        for r in panel_rects {
            // Shrink the safe zone to exclude panels docked at an edge.
            if r.x <= 0.0 {
                safe.x = safe.x.max(r.width);
                safe.width -= r.width;
            } else if r.x + r.width >= window_width {
                safe.width -= r.width;
            }
            if r.y <= 0.0 {
                safe.y = safe.y.max(r.height);
                safe.height -= r.height;
            } else if r.y + r.height >= window_height {
                safe.height -= r.height;
            }
        }
        self.safe_zone = Some(safe);

        let aspect = (safe.width.max(1.0)) / (safe.height.max(1.0));
        let changed = (aspect - self.last_aspect).abs() > 1e-3;
        self.last_aspect = aspect;
        changed
    }

    pub fn aspect(&self) -> f32 {
        self.last_aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_rises_toward_target_but_not_instantly() {
        let mut b = BoundaryConfig::default();
        b.update_viewport_pulse(0.3, 1.0 / 60.0);
        assert!(b.viewport_pulse > 0.0 && b.viewport_pulse < 0.3);
    }

    #[test]
    fn pulse_is_clamped_to_0_3() {
        let mut b = BoundaryConfig::default();
        for _ in 0..10_000 {
            b.update_viewport_pulse(10.0, 1.0 / 60.0);
        }
        assert!(b.viewport_pulse <= 0.3 + 1e-4);
    }

    #[test]
    fn viewport_tracker_reports_change_on_resize() {
        let mut vt = ViewportTracker::new();
        vt.update(1000.0, 1000.0, &[]);
        let changed = vt.update(2000.0, 1000.0, &[]);
        assert!(changed);
    }

    #[test]
    fn safe_zone_excludes_docked_panel() {
        let mut vt = ViewportTracker::new();
        vt.update(1000.0, 800.0, &[ScreenRect { x: 0.0, y: 0.0, width: 200.0, height: 800.0 }]);
        let zone = vt.safe_zone.unwrap();
        assert!(zone.width < 1000.0);
    }
}
