use super::error::EngineError;
use super::filter::DuplicateFilter;
use super::state::{ConformerFate, FilterStats, RejectionReason};
use crate::core::engines::potential::PotentialEngine;
use crate::core::models::conformer::{Conformer, Stage, sort_by_energy};
use crate::core::models::molecule::Molecule;
use tracing::{debug, instrument, warn};

/// Result of refining one ensemble with one potential engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementOutcome {
    pub engine: String,
    /// Accepted conformers, energy-sorted and named `<molecule> conformer <i>`.
    pub accepted: Vec<Conformer>,
    pub stats: FilterStats,
}

impl RefinementOutcome {
    pub fn unique(&self) -> usize {
        self.accepted.len()
    }
}

/// Re-optimizes an ensemble with a potential engine and filters it online.
///
/// Conformers are handled in input order. The running global minimum includes every
/// optimized energy seen so far, the current one included, so the energy window a conformer
/// is judged against can still move after it was accepted.
pub struct RefinementStage<'a> {
    potential: &'a dyn PotentialEngine,
    filter: DuplicateFilter<'a>,
    ewin: f64,
}

impl<'a> RefinementStage<'a> {
    pub fn new(potential: &'a dyn PotentialEngine, filter: DuplicateFilter<'a>, ewin: f64) -> Self {
        Self {
            potential,
            filter,
            ewin,
        }
    }

    #[instrument(skip_all, fields(molecule = molecule.name(), engine = self.potential.name()))]
    pub fn refine(
        &self,
        molecule: &Molecule,
        conformers: &[Conformer],
        charge: i32,
    ) -> Result<RefinementOutcome, EngineError> {
        let elements = molecule.elements();
        let engine = self.potential.name().to_string();
        let mut global_minimum = f64::INFINITY;
        let mut accepted: Vec<Conformer> = Vec::new();
        let mut stats = FilterStats::default();

        for conformer in conformers {
            let optimization = match self.potential.optimize(&conformer.geometry, &elements, charge) {
                Ok(optimization) => optimization,
                Err(e) if e.is_soft() => {
                    warn!(error = %e, "Optimization failed; conformer rejected");
                    stats.record(ConformerFate::Rejected(RejectionReason::NonConvergent));
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            global_minimum = global_minimum.min(optimization.energy);

            let fate = if !optimization.converged {
                ConformerFate::Rejected(RejectionReason::NonConvergent)
            } else if optimization.energy - global_minimum >= self.ewin {
                ConformerFate::Rejected(RejectionReason::HighEnergy)
            } else {
                let refined = conformer
                    .derive(
                        optimization.geometry,
                        optimization.energy,
                        Stage::Refined {
                            engine: engine.clone(),
                        },
                    )
                    .with_convergence(true);
                match self.filter.classify(&refined, &accepted) {
                    Some(kind) => ConformerFate::Duplicate(kind),
                    None => {
                        accepted.push(refined);
                        ConformerFate::Accepted
                    }
                }
            };
            stats.record(fate);
        }

        sort_by_energy(&mut accepted);
        let accepted = accepted
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.with_name(format!("{} conformer {}", molecule.name(), i + 1)))
            .collect();

        debug!(
            initial = conformers.len(),
            energy_duplicates = stats.prefilter_duplicates,
            rmsd_duplicates = stats.geometry_duplicates,
            nonconvergent = stats.nonconvergent,
            high_energy = stats.high_energy,
            unique = stats.unique,
            "Refinement finished"
        );
        Ok(RefinementOutcome {
            engine,
            accepted,
            stats,
        })
    }
}
