use super::generate::{self, Engines, MoleculeReport, OutputLayout};
use crate::core::io::summary::SummaryTable;
use crate::core::models::anchor::AnchorMap;
use crate::core::models::molecule::Molecule;
use crate::engine::config::PipelineConfig;
use crate::engine::error::{EngineError, Severity};
use crate::engine::progress::ProgressReporter;
use tracing::{info, instrument, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One molecule of a batch, with optional template anchors.
#[derive(Debug, Clone)]
pub struct BatchInput {
    pub molecule: Molecule,
    pub anchors: Option<AnchorMap>,
}

impl BatchInput {
    pub fn new(molecule: Molecule) -> Self {
        Self {
            molecule,
            anchors: None,
        }
    }

    pub fn with_anchors(mut self, anchors: Option<AnchorMap>) -> Self {
        self.anchors = anchors;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedMolecule {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One row per completed molecule, in input order.
    pub table: SummaryTable,
    pub reports: Vec<MoleculeReport>,
    pub skipped: Vec<SkippedMolecule>,
}

/// Runs every molecule through the pipeline, in parallel when the `parallel` feature is on.
///
/// Skippable failures are logged and recorded; the first fatal failure in input order aborts
/// the batch.
#[instrument(skip_all, name = "batch_workflow", fields(molecules = inputs.len()))]
pub fn run(
    inputs: &[BatchInput],
    config: &PipelineConfig,
    engines: &Engines,
    output: Option<&OutputLayout>,
    reporter: &ProgressReporter,
) -> Result<BatchOutcome, EngineError> {
    #[cfg(not(feature = "parallel"))]
    let iterator = inputs.iter();

    #[cfg(feature = "parallel")]
    let iterator = inputs.par_iter();

    let results: Vec<Result<MoleculeReport, EngineError>> = iterator
        .map(|input| {
            generate::run(
                &input.molecule,
                input.anchors.as_ref(),
                config,
                engines,
                output,
                reporter,
            )
        })
        .collect();

    let mut outcome = BatchOutcome::default();
    for (input, result) in inputs.iter().zip(results) {
        match result {
            Ok(report) => {
                outcome.table.push(report.row.clone());
                outcome.reports.push(report);
            }
            Err(e) if e.severity() == Severity::SkippableMolecule => {
                warn!(molecule = input.molecule.name(), reason = %e, "Skipping molecule");
                outcome.skipped.push(SkippedMolecule {
                    name: input.molecule.name().to_string(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        completed = outcome.table.len(),
        skipped = outcome.skipped.len(),
        "Batch finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engines::embedding::{EmbedOptions, EmbeddingEngine};
    use crate::core::models::conformer::Geometry;
    use crate::testing::{self, ScriptedEmbedder, ScriptedForceFieldEngine, ScriptedRmsd};

    /// Embeds nothing for molecules whose name starts with "broken".
    struct SelectiveEmbedder(ScriptedEmbedder);

    impl EmbeddingEngine for SelectiveEmbedder {
        fn embed_multiple(
            &self,
            molecule: &Molecule,
            count: usize,
            options: &EmbedOptions<'_>,
        ) -> Vec<Geometry> {
            if molecule.name().starts_with("broken") {
                Vec::new()
            } else {
                self.0.embed_multiple(molecule, count, options)
            }
        }
    }

    fn named(name: &str) -> BatchInput {
        let mut molecule = testing::pentane();
        molecule.set_name(name);
        BatchInput::new(molecule)
    }

    #[test]
    fn skippable_failures_do_not_stop_the_batch() {
        let embedder = SelectiveEmbedder(ScriptedEmbedder::new());
        let force_field = ScriptedForceFieldEngine::new();
        let engines = Engines {
            embedder: &embedder,
            force_field: &force_field,
            rmsd: &ScriptedRmsd,
            potentials: &[],
        };
        let mut config = testing::config_with_samples(20);
        config.torsion_scan.enabled = false;
        let inputs = vec![named("first"), named("broken one"), named("third")];

        let outcome = run(&inputs, &config, &engines, None, &ProgressReporter::new()).unwrap();

        let names: Vec<&str> = outcome.table.rows().iter().map(|r| r.molecule.as_str()).collect();
        assert_eq!(names, vec!["first", "third"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].name, "broken one");
        assert!(outcome.table.rows().iter().all(|r| r.unique_conformers == 4));
    }

    #[test]
    fn fatal_failures_abort_the_batch() {
        let embedder = ScriptedEmbedder::new();
        let force_field = ScriptedForceFieldEngine {
            families: Vec::new(),
            constraints: std::sync::Mutex::new(0),
        };
        let engines = Engines {
            embedder: &embedder,
            force_field: &force_field,
            rmsd: &ScriptedRmsd,
            potentials: &[],
        };
        let config = testing::config_with_samples(20);

        let result = run(&[named("first")], &config, &engines, None, &ProgressReporter::new());
        assert!(matches!(result, Err(EngineError::UnsupportedForceField { .. })));
    }
}
