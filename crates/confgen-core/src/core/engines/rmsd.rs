use crate::core::models::molecule::Molecule;
use nalgebra::Point3;

pub trait RmsdEngine: Send + Sync {
    /// Prepares repeated comparisons between geometries of `molecule`, e.g. by enumerating
    /// at most `max_matches` symmetry-equivalent atom mappings up front.
    fn comparer(&self, molecule: &Molecule, heavy_only: bool, max_matches: usize)
    -> Box<dyn RmsdComparer>;

    /// Best-fit RMSD between two geometries of `molecule`, minimized over at most
    /// `max_matches` symmetry-equivalent atom mappings.
    fn best_rms(
        &self,
        molecule: &Molecule,
        a: &[Point3<f64>],
        b: &[Point3<f64>],
        heavy_only: bool,
        max_matches: usize,
    ) -> f64 {
        self.comparer(molecule, heavy_only, max_matches).rms(a, b)
    }
}

/// RMSD between geometries of the molecule it was prepared for.
pub trait RmsdComparer: Send + Sync {
    fn rms(&self, a: &[Point3<f64>], b: &[Point3<f64>]) -> f64;
}
