use crate::core::engines::rmsd::{RmsdComparer, RmsdEngine};
use crate::core::models::molecule::Molecule;
use crate::core::topology::symmetry::automorphisms;
use crate::core::utils::geometry::best_fit_rmsd;
use nalgebra::Point3;
use tracing::trace;

/// Best-fit RMSD minimized over graph automorphisms of the compared atoms.
#[derive(Debug, Clone, Copy, Default)]
pub struct KabschRmsd;

impl RmsdEngine for KabschRmsd {
    fn comparer(
        &self,
        molecule: &Molecule,
        heavy_only: bool,
        max_matches: usize,
    ) -> Box<dyn RmsdComparer> {
        let mut atoms = if heavy_only {
            molecule.heavy_atoms()
        } else {
            (0..molecule.atom_count()).collect()
        };
        if atoms.is_empty() {
            atoms = (0..molecule.atom_count()).collect();
        }
        let mappings = automorphisms(molecule, &atoms, max_matches.max(1));
        trace!(
            molecule = molecule.name(),
            mappings = mappings.len(),
            "Symmetry mappings enumerated"
        );
        Box::new(SymmetryMappings { atoms, mappings })
    }
}

/// Compared atoms of one molecule with their symmetry-equivalent relabellings.
#[derive(Debug, Clone)]
struct SymmetryMappings {
    atoms: Vec<usize>,
    mappings: Vec<Vec<usize>>,
}

impl RmsdComparer for SymmetryMappings {
    fn rms(&self, a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
        let reference: Vec<_> = self.atoms.iter().map(|&i| a[i]).collect();
        self.mappings
            .iter()
            .filter_map(|mapping| {
                let mapped: Vec<_> = mapping.iter().map(|&j| b[j]).collect();
                best_fit_rmsd(&mapped, &reference)
            })
            .fold(f64::INFINITY, f64::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils::geometry::rotation_from_axis_angle;
    use crate::testing;
    use nalgebra::Vector3;

    #[test]
    fn rigidly_moved_copy_has_zero_rmsd() {
        let molecule = testing::pentane();
        let a = testing::pentane_geometry();
        let rotation = rotation_from_axis_angle(&Vector3::new(0.3, 1.0, -0.2), 73.0);
        let b: Vec<_> = a
            .iter()
            .map(|p| rotation * p + Vector3::new(4.0, -2.0, 9.0))
            .collect();
        assert!(KabschRmsd.best_rms(&molecule, &a, &b, true, 1000) < 1e-9);
    }

    #[test]
    fn symmetric_relabelling_is_recognised_as_identical() {
        let molecule = testing::pentane();
        let mut a = testing::pentane_geometry();
        a[4].z += 1.5;
        let mut b = a.clone();
        b.reverse();
        // With only the identity mapping the reversed chain does not overlay itself.
        assert!(KabschRmsd.best_rms(&molecule, &a, &b, true, 1) > 0.05);
        assert!(KabschRmsd.best_rms(&molecule, &a, &b, true, 1000) < 1e-9);
    }

    #[test]
    fn prepared_comparer_matches_one_off_comparisons() {
        let molecule = testing::pentane();
        let a = testing::pentane_geometry();
        let mut b = a.clone();
        b.reverse();
        b[0].z += 0.7;
        let comparer = KabschRmsd.comparer(&molecule, true, 1000);
        assert_eq!(comparer.rms(&a, &b), KabschRmsd.best_rms(&molecule, &a, &b, true, 1000));
        assert!(comparer.rms(&a, &a) < 1e-9);
    }

    #[test]
    fn different_conformations_have_positive_rmsd() {
        let molecule = testing::pentane();
        let a = testing::pentane_geometry();
        let mut b = a.clone();
        b[4].z += 1.2;
        assert!(KabschRmsd.best_rms(&molecule, &a, &b, false, 1000) > 0.1);
    }
}
