use super::valence::ideal_bond_length;
use crate::core::engines::embedding::{EmbedOptions, EmbeddingEngine};
use crate::core::models::conformer::Geometry;
use crate::core::models::molecule::Molecule;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use tracing::debug;

/// Supplement of the tetrahedral angle: the turn between consecutive bonds of a chain.
const CHAIN_TURN_DEGREES: f64 = 70.53;
const MIN_NONBONDED_SEPARATION: f64 = 0.9;
const PLACEMENT_ATTEMPTS: usize = 25;

/// Seeded tree-growth embedder.
///
/// Atoms are placed breadth-first from anchored atoms (or a random root per fragment) at
/// their ideal bond length, with a tetrahedral turn relative to the previous bond. Random
/// coordinate mode drops the angular bias and scatters fragment roots over a larger box.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceEmbedder;

fn random_unit(rng: &mut StdRng) -> Vector3<f64> {
    loop {
        let v: Vector3<f64> = Vector3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let norm_squared = v.norm_squared();
        if norm_squared > 1e-6 && norm_squared <= 1.0 {
            return v / norm_squared.sqrt();
        }
    }
}

fn turned_direction(previous: &Vector3<f64>, rng: &mut StdRng) -> Vector3<f64> {
    let u = previous.normalize();
    loop {
        let w = random_unit(rng);
        let perpendicular = w - u * u.dot(&w);
        if perpendicular.norm_squared() > 1e-6 {
            let turn = CHAIN_TURN_DEGREES.to_radians();
            return u * turn.cos() + perpendicular.normalize() * turn.sin();
        }
    }
}

impl ReferenceEmbedder {
    fn embed_one(
        &self,
        molecule: &Molecule,
        options: &EmbedOptions<'_>,
        rng: &mut StdRng,
    ) -> Option<Geometry> {
        let n = molecule.atom_count();
        let box_side = options.box_size_mult * 2.0 * (n as f64).cbrt();
        let mut positions: Vec<Option<Point3<f64>>> = vec![None; n];
        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut queue = VecDeque::new();

        if let Some(anchors) = options.anchors {
            for (atom, position) in anchors.iter().filter(|(atom, _)| *atom < n) {
                positions[atom] = Some(*position);
                queue.push_back(atom);
            }
        }

        for root in 0..n {
            if positions[root].is_none() {
                let offset = Vector3::new(
                    rng.gen_range(0.0..box_side),
                    rng.gen_range(0.0..box_side),
                    rng.gen_range(0.0..box_side),
                );
                positions[root] = Some(Point3::from(offset));
                queue.push_back(root);
            }
            while let Some(atom) = queue.pop_front() {
                let origin = positions[atom]?;
                for &(child, bond) in molecule.neighbor_bonds(atom) {
                    if positions[child].is_some() {
                        continue;
                    }
                    let length =
                        ideal_bond_length(molecule, atom, child, molecule.bonds()[bond].order);
                    let placed = (0..PLACEMENT_ATTEMPTS).find_map(|_| {
                        let direction = match parent[atom].and_then(|p| positions[p]) {
                            Some(previous) if !options.use_random_coords => {
                                turned_direction(&(origin - previous), rng)
                            }
                            _ => random_unit(rng),
                        };
                        let candidate = origin + direction * length;
                        let clashes = positions.iter().enumerate().any(|(other, p)| {
                            other != atom
                                && p.is_some_and(|p| {
                                    (p - candidate).norm() < MIN_NONBONDED_SEPARATION
                                })
                        });
                        (!clashes).then_some(candidate)
                    })?;
                    positions[child] = Some(placed);
                    parent[child] = Some(atom);
                    queue.push_back(child);
                }
            }
        }
        positions.into_iter().collect()
    }
}

impl EmbeddingEngine for ReferenceEmbedder {
    fn embed_multiple(
        &self,
        molecule: &Molecule,
        count: usize,
        options: &EmbedOptions<'_>,
    ) -> Vec<Geometry> {
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut geometries = Vec::with_capacity(count);
        let mut failures = 0;
        while geometries.len() < count {
            match self.embed_one(molecule, options, &mut rng) {
                Some(geometry) => geometries.push(geometry),
                None => {
                    failures += 1;
                    if failures >= options.num_zero_fail.max(1) {
                        debug!(
                            molecule = molecule.name(),
                            produced = geometries.len(),
                            "Embedding gave up after repeated placement failures"
                        );
                        break;
                    }
                }
            }
        }
        geometries
    }
}
