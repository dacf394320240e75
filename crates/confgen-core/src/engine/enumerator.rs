use super::error::EngineError;
use super::minimizer::Minimizer;
use super::sink::ConformerSink;
use crate::core::models::conformer::{Conformer, Geometry, Stage};
use crate::core::models::molecule::Molecule;
use crate::core::models::torsion::Torsion;
use crate::core::utils::geometry::set_dihedral;
use tracing::{debug, trace};

/// Dihedral grid `0, degree, 2·degree, …` strictly below 360°.
pub fn grid_angles(degree: f64) -> Vec<f64> {
    if degree.is_nan() || degree <= 0.0 {
        return vec![0.0];
    }
    (0..)
        .map(|i| i as f64 * degree)
        .take_while(|angle| *angle < 360.0 - 1e-9)
        .collect()
}

/// Number of conformers one seed expands into.
pub fn expansion_size(angles: usize, torsions: usize) -> usize {
    angles.saturating_pow(torsions as u32)
}

/// Recursive dihedral scan over every combination of grid angles.
///
/// Each level sets one torsion on a copy of the parent geometry and minimizes it without
/// constraints before descending to the next torsion; the fully-set leaves are emitted to a
/// sink as soon as they are produced, so no level holds more than its own geometry.
pub struct TorsionEnumerator<'a> {
    molecule: &'a Molecule,
    minimizer: &'a Minimizer<'a>,
    torsions: &'a [Torsion],
    angles: Vec<f64>,
}

impl<'a> TorsionEnumerator<'a> {
    pub fn new(
        molecule: &'a Molecule,
        minimizer: &'a Minimizer<'a>,
        torsions: &'a [Torsion],
        degree: f64,
    ) -> Self {
        Self {
            molecule,
            minimizer,
            torsions,
            angles: grid_angles(degree),
        }
    }

    pub fn angles(&self) -> &[f64] {
        &self.angles
    }

    pub fn per_seed(&self) -> usize {
        expansion_size(self.angles.len(), self.torsions.len())
    }

    /// Expands one seed, returning how many conformers reached the sink.
    ///
    /// A molecule without torsions emits the seed itself once.
    pub fn enumerate(
        &self,
        seed: &Conformer,
        sink: &mut dyn ConformerSink,
    ) -> Result<usize, EngineError> {
        if self.torsions.is_empty() {
            sink.accept(seed.derive(seed.geometry.clone(), seed.energy, Stage::Rotated))?;
            return Ok(1);
        }
        let emitted = self.descend(seed, &seed.geometry, seed.energy, 0, sink)?;
        trace!(energy = seed.energy, emitted, "Seed expanded");
        Ok(emitted)
    }

    fn descend(
        &self,
        seed: &Conformer,
        geometry: &Geometry,
        energy: f64,
        level: usize,
        sink: &mut dyn ConformerSink,
    ) -> Result<usize, EngineError> {
        let Some(torsion) = self.torsions.get(level) else {
            sink.accept(seed.derive(geometry.clone(), energy, Stage::Rotated))?;
            return Ok(1);
        };
        let mut emitted = 0;
        for &angle in &self.angles {
            let rotated = set_dihedral(self.molecule, geometry, torsion, angle)?;
            let relaxed = self.minimizer.minimize(&rotated, None)?;
            emitted += self.descend(seed, &relaxed.geometry, relaxed.energy, level + 1, sink)?;
        }
        Ok(emitted)
    }

    /// Expands every seed in order, invoking `on_seed` after each.
    pub fn enumerate_all(
        &self,
        seeds: &[Conformer],
        sink: &mut dyn ConformerSink,
        mut on_seed: impl FnMut(),
    ) -> Result<usize, EngineError> {
        debug!(
            seeds = seeds.len(),
            torsions = self.torsions.len(),
            angles = self.angles.len(),
            per_seed = self.per_seed(),
            "Starting dihedral scan"
        );
        let mut total = 0;
        for seed in seeds {
            total += self.enumerate(seed, sink)?;
            on_seed();
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::topology::rings::RingInfo;
    use crate::core::topology::rotatable::find_rotatable_torsions;
    use crate::engine::config::{FilterThresholds, MinimizationConfig};
    use crate::engine::filter::DuplicateFilter;
    use crate::engine::minimizer::ForceFieldStrategy;
    use crate::core::engines::forcefield::ForceFieldFamily;
    use crate::testing::{self, ScriptedForceFieldEngine, ScriptedRmsd};

    fn unique_seeds(molecule: &Molecule) -> Vec<Conformer> {
        let thresholds = FilterThresholds::default();
        DuplicateFilter::new(&ScriptedRmsd, molecule, &thresholds)
            .run(testing::scenario_conformers(), &[])
            .accepted
    }

    #[test]
    fn grid_covers_the_circle_without_repeating_zero() {
        assert_eq!(grid_angles(120.0), vec![0.0, 120.0, 240.0]);
        assert_eq!(grid_angles(30.0).len(), 12);
        assert_eq!(grid_angles(360.0), vec![0.0]);
        // 100° does not divide the circle; the last step stops short of 360°.
        assert_eq!(grid_angles(100.0), vec![0.0, 100.0, 200.0, 300.0]);
    }

    #[test]
    fn each_seed_expands_to_angles_to_the_power_of_torsions() {
        let molecule = testing::pentane();
        let torsions = find_rotatable_torsions(&molecule, &RingInfo::perceive(&molecule), true);
        assert_eq!(torsions.len(), 2);

        let engine = ScriptedForceFieldEngine::new();
        let strategy =
            ForceFieldStrategy::resolve(&engine, &molecule, ForceFieldFamily::Mmff).unwrap();
        let config = MinimizationConfig::default();
        let minimizer = Minimizer::new(&engine, &molecule, strategy, &config);
        let enumerator = TorsionEnumerator::new(&molecule, &minimizer, torsions.as_slice(), 120.0);
        let seeds = unique_seeds(&molecule);
        assert_eq!(seeds.len(), 4);

        let mut rotated: Vec<Conformer> = Vec::new();
        let mut seeds_done = 0;
        let total = enumerator
            .enumerate_all(&seeds, &mut rotated, || seeds_done += 1)
            .unwrap();

        assert_eq!(enumerator.per_seed(), 9);
        assert_eq!(total, 36);
        assert_eq!(rotated.len(), 36);
        assert_eq!(seeds_done, 4);
        assert!(rotated.iter().all(|c| c.stage == Stage::Rotated));
    }

    #[test]
    fn streamed_expansion_collapses_to_one_conformer_per_family() {
        let molecule = testing::pentane();
        let torsions = find_rotatable_torsions(&molecule, &RingInfo::perceive(&molecule), true);
        let engine = ScriptedForceFieldEngine::new();
        let strategy =
            ForceFieldStrategy::resolve(&engine, &molecule, ForceFieldFamily::Mmff).unwrap();
        let config = MinimizationConfig::default();
        let minimizer = Minimizer::new(&engine, &molecule, strategy, &config);
        let enumerator = TorsionEnumerator::new(&molecule, &minimizer, torsions.as_slice(), 120.0);

        let thresholds = FilterThresholds::default();
        let mut streaming = DuplicateFilter::new(&ScriptedRmsd, &molecule, &thresholds).streaming();
        let total = enumerator
            .enumerate_all(&unique_seeds(&molecule), &mut streaming, || {})
            .unwrap();
        let outcome = streaming.finish();

        assert_eq!(total, 36);
        assert_eq!(outcome.unique(), 4);
    }

    #[test]
    fn molecule_without_torsions_passes_the_seed_through() {
        let molecule = testing::pentane();
        let engine = ScriptedForceFieldEngine::new();
        let strategy =
            ForceFieldStrategy::resolve(&engine, &molecule, ForceFieldFamily::Mmff).unwrap();
        let config = MinimizationConfig::default();
        let minimizer = Minimizer::new(&engine, &molecule, strategy, &config);
        let enumerator = TorsionEnumerator::new(&molecule, &minimizer, &[], 30.0);

        let seed = testing::scenario_conformer(0);
        let mut out: Vec<Conformer> = Vec::new();
        assert_eq!(enumerator.enumerate(&seed, &mut out).unwrap(), 1);
        assert_eq!(out[0].geometry, seed.geometry);
        assert_eq!(out[0].energy, seed.energy);
    }
}
