use super::config::FilterThresholds;
use super::error::EngineError;
use super::sink::ConformerSink;
use super::state::{ConformerFate, DuplicateKind, FilterStats};
use crate::core::engines::rmsd::{RmsdComparer, RmsdEngine};
use crate::core::models::conformer::{Conformer, Geometry, sort_by_energy};
use crate::core::models::molecule::Molecule;
use crate::core::models::torsion::Torsion;
use crate::core::utils::geometry::set_dihedral;
use nalgebra::Point3;
use tracing::trace;

/// Dihedral every rotatable torsion is set to before geometries are compared.
pub const REFERENCE_DIHEDRAL: f64 = 180.0;

/// Accepted conformers of one filtering pass with its duplicate counts.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOutcome {
    pub accepted: Vec<Conformer>,
    pub prefilter_duplicates: usize,
    pub geometry_duplicates: usize,
}

impl FilterOutcome {
    pub fn unique(&self) -> usize {
        self.accepted.len()
    }
}

/// Energy/RMSD duplicate detection for the conformers of one molecule.
///
/// The RMSD comparer, with its symmetry mappings, is prepared once per filter.
pub struct DuplicateFilter<'a> {
    rmsd: Box<dyn RmsdComparer>,
    molecule: &'a Molecule,
    thresholds: &'a FilterThresholds,
}

impl<'a> DuplicateFilter<'a> {
    pub fn new(
        rmsd: &dyn RmsdEngine,
        molecule: &'a Molecule,
        thresholds: &'a FilterThresholds,
    ) -> Self {
        Self {
            rmsd: rmsd.comparer(molecule, thresholds.heavy_only, thresholds.max_matches_rmsd),
            molecule,
            thresholds,
        }
    }

    pub fn thresholds(&self) -> &FilterThresholds {
        self.thresholds
    }

    /// Compares a candidate against accepted conformers in order.
    ///
    /// The first accepted conformer within the initial energy threshold makes it an energy
    /// duplicate; the first within the energy threshold and the RMSD threshold makes it a
    /// geometry duplicate. RMSD is only evaluated when the energy gate passes.
    fn classify_against<'g>(
        &self,
        energy: f64,
        geometry: &[Point3<f64>],
        accepted: impl IntoIterator<Item = (f64, &'g [Point3<f64>])>,
    ) -> Option<DuplicateKind> {
        let t = self.thresholds;
        for (kept_energy, kept_geometry) in accepted {
            let delta = (energy - kept_energy).abs();
            if delta < t.initial_energy_threshold {
                return Some(DuplicateKind::Prefilter);
            }
            if delta < t.energy_threshold && self.rmsd.rms(geometry, kept_geometry) < t.rms_threshold {
                return Some(DuplicateKind::Geometry);
            }
        }
        None
    }

    pub fn classify(&self, candidate: &Conformer, accepted: &[Conformer]) -> Option<DuplicateKind> {
        self.classify_against(
            candidate.energy,
            &candidate.geometry,
            accepted.iter().map(|c| (c.energy, c.geometry.as_slice())),
        )
    }

    /// Stage A: keeps conformers whose energy differs from every survivor so far by at least
    /// the initial energy threshold. Expects energy-sorted input.
    pub fn prefilter(&self, sorted: Vec<Conformer>) -> (Vec<Conformer>, usize) {
        let mut survivors: Vec<Conformer> = Vec::with_capacity(sorted.len());
        let mut duplicates = 0;
        for conformer in sorted {
            let is_duplicate = survivors.iter().any(|kept| {
                (conformer.energy - kept.energy).abs() < self.thresholds.initial_energy_threshold
            });
            if is_duplicate {
                duplicates += 1;
            } else {
                survivors.push(conformer);
            }
        }
        (survivors, duplicates)
    }

    /// `geometry` with every torsion set to [`REFERENCE_DIHEDRAL`]. Torsions whose dihedral
    /// is undefined in this geometry are left as they are.
    fn reference_geometry(&self, geometry: &[Point3<f64>], torsions: &[Torsion]) -> Geometry {
        let mut reset = geometry.to_vec();
        for torsion in torsions {
            match set_dihedral(self.molecule, &reset, torsion, REFERENCE_DIHEDRAL) {
                Ok(next) => reset = next,
                Err(e) => trace!(%torsion, error = %e, "Torsion left unchanged before comparison"),
            }
        }
        reset
    }

    /// Stage B: energy and geometry comparison of energy-sorted Stage-A survivors, on copies
    /// whose torsions are reset to the reference dihedral. Returns the accepted conformers
    /// with their original geometries, and the energy and geometry duplicate counts.
    pub fn geometry_filter(
        &self,
        survivors: Vec<Conformer>,
        torsions: &[Torsion],
    ) -> (Vec<Conformer>, usize, usize) {
        let mut accepted: Vec<(Conformer, Geometry)> = Vec::new();
        let (mut energy_duplicates, mut geometry_duplicates) = (0, 0);
        for conformer in survivors {
            let reference = self.reference_geometry(&conformer.geometry, torsions);
            let verdict = self.classify_against(
                conformer.energy,
                &reference,
                accepted.iter().map(|(c, g)| (c.energy, g.as_slice())),
            );
            match verdict {
                Some(DuplicateKind::Prefilter) => energy_duplicates += 1,
                Some(DuplicateKind::Geometry) => geometry_duplicates += 1,
                None => accepted.push((conformer, reference)),
            }
        }
        (
            accepted.into_iter().map(|(c, _)| c).collect(),
            energy_duplicates,
            geometry_duplicates,
        )
    }

    /// The two-stage filter: energy sort, Stage A, then Stage B.
    pub fn run(&self, conformers: Vec<Conformer>, torsions: &[Torsion]) -> FilterOutcome {
        let mut sorted = conformers;
        sort_by_energy(&mut sorted);
        let (survivors, prefilter_duplicates) = self.prefilter(sorted);
        let (accepted, energy_duplicates, geometry_duplicates) =
            self.geometry_filter(survivors, torsions);
        FilterOutcome {
            accepted,
            prefilter_duplicates: prefilter_duplicates + energy_duplicates,
            geometry_duplicates,
        }
    }

    /// A single-pass filter for unsorted conformer streams.
    pub fn streaming(self) -> StreamingFilter<'a> {
        StreamingFilter {
            filter: self,
            accepted: Vec::new(),
            stats: FilterStats::default(),
        }
    }
}

/// Filters conformers as they arrive, holding only the accepted ones.
///
/// Every conformer, including the first, goes through the same energy and RMSD comparison
/// against everything accepted before it.
pub struct StreamingFilter<'a> {
    filter: DuplicateFilter<'a>,
    accepted: Vec<Conformer>,
    stats: FilterStats,
}

impl StreamingFilter<'_> {
    pub fn stats(&self) -> FilterStats {
        self.stats
    }

    /// The accepted conformers sorted by energy.
    pub fn finish(self) -> FilterOutcome {
        let mut accepted = self.accepted;
        sort_by_energy(&mut accepted);
        FilterOutcome {
            accepted,
            prefilter_duplicates: self.stats.prefilter_duplicates,
            geometry_duplicates: self.stats.geometry_duplicates,
        }
    }
}

impl ConformerSink for StreamingFilter<'_> {
    fn accept(&mut self, conformer: Conformer) -> Result<(), EngineError> {
        match self.filter.classify(&conformer, &self.accepted) {
            Some(kind) => self.stats.record(ConformerFate::Duplicate(kind)),
            None => {
                self.stats.record(ConformerFate::Accepted);
                self.accepted.push(conformer);
            }
        }
        Ok(())
    }
}
