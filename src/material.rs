//! Per-material constitutive parameters and the WGSL stress-function table.
//!
//! Freezes a Rust-side table into a WGSL constant array indexed by an
//! integer material-type field, one constitutive-parameter struct per
//! material.

use bytemuck::{Pod, Zeroable};

/// Number of predefined material kinds (§3.3).
pub const MATERIAL_COUNT: usize = 8;

/// Index into the material table. Matches §3.3's predefined entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum MaterialKind {
    Fluid = 0,
    Elastic = 1,
    Sand = 2,
    Snow = 3,
    Foam = 4,
    Viscous = 5,
    Rigid = 6,
    Plasma = 7,
}

/// `{density0, stiffness, viscosity, dynamicViscosity, friction, cohesion,
/// elasticity, isGranular, isElastic, baseColor}` per §3.3.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct MaterialParams {
    pub density0: f32,
    pub stiffness: f32,
    pub viscosity: f32,
    pub dynamic_viscosity: f32,
    pub friction: f32,
    pub cohesion: f32,
    pub elasticity: f32,
    pub is_granular: u32,
    pub is_elastic: u32,
    pub _pad: [u32; 3],
    pub base_color: [f32; 3],
    pub _pad2: f32,
}

impl MaterialParams {
    fn new(
        density0: f32,
        stiffness: f32,
        viscosity: f32,
        dynamic_viscosity: f32,
        friction: f32,
        cohesion: f32,
        elasticity: f32,
        is_granular: bool,
        is_elastic: bool,
        base_color: [f32; 3],
    ) -> Self {
        Self {
            density0,
            stiffness,
            viscosity,
            dynamic_viscosity,
            friction,
            cohesion,
            elasticity,
            is_granular: is_granular as u32,
            is_elastic: is_elastic as u32,
            _pad: [0; 3],
            base_color,
            _pad2: 0.0,
        }
    }
}

/// A table of at least 8 materials (§3.3), with the eight predefined
/// entries always present at fixed indices matching `MaterialKind`.
#[derive(Clone, Debug)]
pub struct MaterialTable {
    entries: Vec<MaterialParams>,
}

impl Default for MaterialTable {
    fn default() -> Self {
        Self {
            entries: vec![
                MaterialParams::new(1.0, 4.0, 0.02, 0.1, 0.0, 0.0, 0.0, false, false, [0.2, 0.5, 0.9]),
                MaterialParams::new(1.0, 8.0, 0.0, 0.0, 0.0, 0.0, 6.0, false, true, [0.8, 0.7, 0.3]),
                MaterialParams::new(1.6, 10.0, 0.0, 0.0, 0.6, 0.02, 0.0, true, false, [0.85, 0.7, 0.45]),
                MaterialParams::new(0.4, 6.0, 0.0, 0.0, 0.2, 0.05, 3.0, false, true, [0.95, 0.97, 1.0]),
                MaterialParams::new(0.15, 0.5, 0.05, 0.2, 0.0, 0.0, 0.0, false, false, [1.0, 1.0, 1.0]),
                MaterialParams::new(1.2, 2.0, 0.3, 1.2, 0.0, 0.0, 0.0, false, false, [0.4, 0.3, 0.2]),
                MaterialParams::new(2.0, 200.0, 0.0, 0.0, 0.0, 0.0, 0.0, false, true, [0.6, 0.6, 0.65]),
                MaterialParams::new(0.8, 4.0, 0.01, 0.05, 0.0, 0.0, 0.0, false, false, [0.8, 0.2, 0.9]),
            ],
        }
    }
}

impl MaterialTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MaterialParams> {
        self.entries.get(index)
    }

    pub fn set(&mut self, index: usize, params: MaterialParams) {
        if index < self.entries.len() {
            self.entries[index] = params;
        }
    }

    pub fn push(&mut self, params: MaterialParams) -> usize {
        self.entries.push(params);
        self.entries.len() - 1
    }

    pub fn data(&self) -> &[MaterialParams] {
        &self.entries
    }

    /// Freeze the table into a WGSL constant array, mirroring
    /// `InteractionMatrix::to_wgsl_init`.
    pub fn to_wgsl_table(&self) -> String {
        let mut rows = Vec::with_capacity(self.entries.len());
        for m in &self.entries {
            rows.push(format!(
                "MaterialParams({}, {}, {}, {}, {}, {}, {}, {}u, {}u, vec3<f32>({}, {}, {}))",
                m.density0,
                m.stiffness,
                m.viscosity,
                m.dynamic_viscosity,
                m.friction,
                m.cohesion,
                m.elasticity,
                m.is_granular,
                m.is_elastic,
                m.base_color[0],
                m.base_color[1],
                m.base_color[2],
            ));
        }
        let n = self.entries.len();
        format!(
            "const MATERIAL_COUNT: u32 = {n}u;\nconst materials = array<MaterialParams, {n}>(\n    {}\n);\n",
            rows.join(",\n    ")
        )
    }
}

pub const MATERIAL_PARAMS_WGSL_STRUCT: &str = r#"
struct MaterialParams {
    density0: f32,
    stiffness: f32,
    viscosity: f32,
    dynamic_viscosity: f32,
    friction: f32,
    cohesion: f32,
    elasticity: f32,
    is_granular: u32,
    is_elastic: u32,
    base_color: vec3<f32>,
};
"#;

/// The stress-function branch described in §4.E. Each WGSL branch is
/// authored once into `shaders/p2g2.wgsl` and selected by `materialType`;
/// this function documents the same dispatch in Rust for the (GPU-less)
/// unit tests and for CPU reference computation used by integration tests.
pub fn is_granular(kind: MaterialKind) -> bool {
    matches!(kind, MaterialKind::Sand)
}

pub fn is_elastic(kind: MaterialKind) -> bool {
    matches!(kind, MaterialKind::Elastic | MaterialKind::Snow | MaterialKind::Rigid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_has_at_least_eight_entries() {
        let t = MaterialTable::default();
        assert!(t.len() >= 8);
    }

    #[test]
    fn wgsl_table_contains_every_row() {
        let t = MaterialTable::default();
        let wgsl = t.to_wgsl_table();
        assert!(wgsl.contains("MATERIAL_COUNT: u32 = 8u"));
        assert_eq!(wgsl.matches("MaterialParams(").count(), t.len());
    }

    #[test]
    fn sand_is_granular_snow_is_elastic() {
        assert!(is_granular(MaterialKind::Sand));
        assert!(is_elastic(MaterialKind::Snow));
        assert!(!is_granular(MaterialKind::Fluid));
    }
}
