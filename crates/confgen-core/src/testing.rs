//! Fixtures and scripted engines shared by unit tests.
//!
//! Scripted geometries carry their identity in the coordinates of atom 0: the x offset
//! (in steps of [`MARKER_STEP`]) selects an entry of [`SCENARIO`], the y offset its group.
//! Every conformer in the same group is geometrically identical; different groups are
//! [`ScriptedRmsd::DIFFERENT`] apart.

use crate::core::engines::embedding::{EmbedOptions, EmbeddingEngine};
use crate::core::engines::forcefield::{
    ForceField, ForceFieldEngine, ForceFieldError, ForceFieldFamily,
};
use crate::core::engines::potential::{Optimization, PotentialEngine, PotentialError};
use crate::core::engines::rmsd::{RmsdComparer, RmsdEngine};
use crate::core::models::atom::{Atom, Element};
use crate::core::models::conformer::{Conformer, Geometry, Stage};
use crate::core::models::molecule::{Molecule, MoleculeBuilder};
use crate::core::models::topology::BondOrder;
use crate::engine::config::{PipelineConfig, PipelineConfigBuilder, SampleSize};
use nalgebra::{Point3, Vector3};
use std::sync::Mutex;

pub const MARKER_STEP: f64 = 50.0;

/// Force-field energies of twenty embedded pentane conformers, in embedding order, with the
/// geometric family each belongs to.
pub const SCENARIO: [(f64, usize); 20] = [
    (-4.441836, 2),
    (-5.27175, 0),
    (-1.57172, 4),
    (-3.848579, 3),
    (-4.44184, 1),
    (-5.271748, 0),
    (-4.441834, 2),
    (-5.27175, 0),
    (-1.571718, 4),
    (-4.441839, 1),
    (-3.84858, 3),
    (-5.271746, 0),
    (-4.44184, 1),
    (-4.441835, 2),
    (-1.571719, 4),
    (-5.271749, 0),
    (-4.441837, 1),
    (-3.848578, 3),
    (-5.271747, 0),
    (-4.441838, 1),
];

/// n-pentane with implicit hydrogens.
pub fn pentane() -> Molecule {
    let mut builder = MoleculeBuilder::new("pentane");
    for hydrogens in [3, 2, 2, 2, 3] {
        builder.add_atom(Atom::new(Element::C).with_implicit_hydrogens(hydrogens));
    }
    for i in 0..4 {
        builder.add_bond(i, i + 1, BondOrder::Single);
    }
    builder.build().unwrap()
}

/// n-pentane with all twelve hydrogens explicit, carbons first.
pub fn pentane_with_hydrogens() -> Molecule {
    let mut builder = MoleculeBuilder::new("pentane");
    for _ in 0..5 {
        builder.add_atom(Atom::new(Element::C));
    }
    for i in 0..4 {
        builder.add_bond(i, i + 1, BondOrder::Single);
    }
    for (carbon, hydrogens) in [(0, 3), (1, 2), (2, 2), (3, 2), (4, 3)] {
        for _ in 0..hydrogens {
            let h = builder.add_atom(Atom::new(Element::H));
            builder.add_bond(carbon, h, BondOrder::Single);
        }
    }
    builder.build().unwrap()
}

/// Planar all-anti zigzag for a chain of `n` atoms.
pub fn zigzag(n: usize) -> Geometry {
    (0..n)
        .map(|i| Point3::new(1.27 * i as f64, if i % 2 == 1 { 0.87 } else { 0.0 }, 0.0))
        .collect()
}

pub fn pentane_geometry() -> Geometry {
    zigzag(5)
}

/// A copy of `base` tagged with scenario entry `index` and geometric `group`.
pub fn marked(base: &[Point3<f64>], index: usize, group: usize) -> Geometry {
    let shift = Vector3::new(MARKER_STEP * index as f64, MARKER_STEP * group as f64, 0.0);
    base.iter().map(|p| p + shift).collect()
}

pub fn marker_index(geometry: &[Point3<f64>]) -> usize {
    (geometry[0].x / MARKER_STEP).round() as usize
}

pub fn marker_group(geometry: &[Point3<f64>]) -> usize {
    (geometry[0].y / MARKER_STEP).round() as usize
}

/// A minimized conformer carrying scenario entry `index`.
pub fn scenario_conformer(index: usize) -> Conformer {
    let (energy, group) = SCENARIO[index];
    Conformer::new(marked(&pentane_geometry(), index, group), energy, Stage::Minimized)
}

pub fn scenario_conformers() -> Vec<Conformer> {
    (0..SCENARIO.len()).map(scenario_conformer).collect()
}

pub fn config_with_samples(samples: usize) -> PipelineConfig {
    PipelineConfigBuilder::new()
        .sample(SampleSize::Fixed(samples))
        .force_field(ForceFieldFamily::Mmff)
        .build()
        .unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmbedCall {
    pub count: usize,
    pub use_random_coords: bool,
    pub box_size_mult: f64,
    pub num_zero_fail: usize,
    pub anchored: bool,
}

/// Embeds scenario geometries in order; call `i` yields at most `yields[i]` of them.
pub struct ScriptedEmbedder {
    yields: Vec<usize>,
    pub calls: Mutex<Vec<EmbedCall>>,
}

impl ScriptedEmbedder {
    pub fn new() -> Self {
        Self::with_yields(Vec::new())
    }

    pub fn with_yields(yields: Vec<usize>) -> Self {
        Self {
            yields,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<EmbedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl EmbeddingEngine for ScriptedEmbedder {
    fn embed_multiple(
        &self,
        molecule: &Molecule,
        count: usize,
        options: &EmbedOptions<'_>,
    ) -> Vec<Geometry> {
        let mut calls = self.calls.lock().unwrap();
        let limit = self.yields.get(calls.len()).copied().unwrap_or(count);
        calls.push(EmbedCall {
            count,
            use_random_coords: options.use_random_coords,
            box_size_mult: options.box_size_mult,
            num_zero_fail: options.num_zero_fail,
            anchored: options.anchors.is_some(),
        });
        let base = zigzag(molecule.atom_count());
        (0..count.min(limit))
            .map(|k| marked(&base, k, SCENARIO[k % SCENARIO.len()].1))
            .collect()
    }
}

/// Leaves geometries untouched and reports the scenario energy of their marker.
pub struct ScriptedForceFieldEngine {
    pub families: Vec<ForceFieldFamily>,
    pub constraints: Mutex<usize>,
}

impl ScriptedForceFieldEngine {
    pub fn new() -> Self {
        Self {
            families: vec![ForceFieldFamily::Mmff, ForceFieldFamily::Uff],
            constraints: Mutex::new(0),
        }
    }
}

struct ScriptedForceField<'a> {
    positions: Geometry,
    constraints: &'a Mutex<usize>,
}

impl ForceField for ScriptedForceField<'_> {
    fn add_distance_constraint(&mut self, _i: usize, _j: usize, _lo: f64, _hi: f64, _w: f64) {
        *self.constraints.lock().unwrap() += 1;
    }

    fn minimize(&mut self, _max_iterations: usize) -> bool {
        false
    }

    fn energy(&self) -> f64 {
        SCENARIO[marker_index(&self.positions) % SCENARIO.len()].0
    }

    fn positions(&self) -> Geometry {
        self.positions.clone()
    }
}

impl ForceFieldEngine for ScriptedForceFieldEngine {
    fn supports(&self, family: ForceFieldFamily) -> bool {
        self.families.contains(&family)
    }

    fn force_field<'a>(
        &'a self,
        _molecule: &'a Molecule,
        family: ForceFieldFamily,
        geometry: &[Point3<f64>],
    ) -> Result<Box<dyn ForceField + 'a>, ForceFieldError> {
        if !self.supports(family) {
            return Err(ForceFieldError::UnsupportedFamily(family));
        }
        Ok(Box::new(ScriptedForceField {
            positions: geometry.to_vec(),
            constraints: &self.constraints,
        }))
    }
}

/// Zero within a marker group, [`Self::DIFFERENT`] across groups.
pub struct ScriptedRmsd;

impl ScriptedRmsd {
    pub const DIFFERENT: f64 = 1.0;
}

impl RmsdEngine for ScriptedRmsd {
    fn comparer(
        &self,
        _molecule: &Molecule,
        _heavy_only: bool,
        _max_matches: usize,
    ) -> Box<dyn RmsdComparer> {
        Box::new(ScriptedRmsd)
    }
}

impl RmsdComparer for ScriptedRmsd {
    fn rms(&self, a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
        if marker_group(a) == marker_group(b) {
            0.0
        } else {
            Self::DIFFERENT
        }
    }
}

/// Returns `energies[k]` and `converged[k]` for marker `k`, leaving the geometry unchanged.
pub struct ScriptedPotential {
    pub energies: Vec<f64>,
    pub converged: Vec<bool>,
}

impl ScriptedPotential {
    pub fn converging(energies: Vec<f64>) -> Self {
        let converged = vec![true; energies.len()];
        Self { energies, converged }
    }
}

impl PotentialEngine for ScriptedPotential {
    fn name(&self) -> &str {
        "scripted"
    }

    fn optimize(
        &self,
        geometry: &[Point3<f64>],
        _elements: &[Element],
        _charge: i32,
    ) -> Result<Optimization, PotentialError> {
        let k = marker_index(geometry);
        let energy = *self.energies.get(k).ok_or_else(|| PotentialError::Failed {
            engine: "scripted".to_string(),
            message: format!("no energy scripted for marker {k}"),
        })?;
        Ok(Optimization {
            converged: self.converged.get(k).copied().unwrap_or(true),
            energy,
            geometry: geometry.to_vec(),
        })
    }
}
