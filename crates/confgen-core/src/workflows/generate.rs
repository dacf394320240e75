use crate::core::engines::embedding::EmbeddingEngine;
use crate::core::engines::forcefield::ForceFieldEngine;
use crate::core::engines::potential::PotentialEngine;
use crate::core::engines::rmsd::RmsdEngine;
use crate::core::io::summary::{RefinementCounts, RotatedCounts, SummaryRow};
use crate::core::models::anchor::AnchorMap;
use crate::core::models::conformer::Conformer;
use crate::core::models::molecule::Molecule;
use crate::core::topology::rings::RingInfo;
use crate::core::topology::rotatable::find_rotatable_torsions;
use crate::engine::config::PipelineConfig;
use crate::engine::embedding::embed;
use crate::engine::enumerator::TorsionEnumerator;
use crate::engine::error::EngineError;
use crate::engine::filter::DuplicateFilter;
use crate::engine::minimizer::{ForceFieldStrategy, Minimizer};
use crate::engine::progress::{MoleculeProgress, Phase, ProgressReporter};
use crate::engine::refinement::{RefinementOutcome, RefinementStage};
use crate::engine::sampler::resolve_sample_size;
use crate::engine::sink::EnsembleWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// The collaborator engines one run draws on. Potential engines are optional; each one
/// listed adds a refinement pass.
#[derive(Clone, Copy)]
pub struct Engines<'a> {
    pub embedder: &'a dyn EmbeddingEngine,
    pub force_field: &'a dyn ForceFieldEngine,
    pub rmsd: &'a dyn RmsdEngine,
    pub potentials: &'a [&'a dyn PotentialEngine],
}

/// Where the per-molecule ensembles are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    dir: PathBuf,
}

impl OutputLayout {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, molecule: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{suffix}", sanitize(molecule)))
    }

    pub fn minimized_path(&self, molecule: &str) -> PathBuf {
        self.file(molecule, "_ff.sdf")
    }

    pub fn enumerated_path(&self, molecule: &str) -> PathBuf {
        self.file(molecule, "_ff_enumerated.sdf")
    }

    pub fn rotated_path(&self, molecule: &str) -> PathBuf {
        self.file(molecule, "_ff_rotated.sdf")
    }

    pub fn refined_path(&self, molecule: &str, engine: &str) -> PathBuf {
        self.file(molecule, &format!("_{}.sdf", sanitize(engine)))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join("summary.csv")
    }
}

fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "molecule".to_string()
    } else {
        cleaned
    }
}

/// What happened to the torsion enumeration stage of a molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationStatus {
    Disabled,
    NoRotatableBonds,
    /// More torsions than the configured ceiling; the unique ensemble is used instead.
    Rejected { torsions: usize, max: usize },
    Completed,
}

/// Everything one molecule's run produced.
#[derive(Debug, Clone)]
pub struct MoleculeReport {
    pub row: SummaryRow,
    /// Unique force-field conformers, energy-sorted.
    pub minimized: Vec<Conformer>,
    /// Unique rotated conformers, present when enumeration completed.
    pub rotated: Option<Vec<Conformer>>,
    pub refined: Vec<RefinementOutcome>,
    pub enumeration: EnumerationStatus,
}

impl MoleculeReport {
    /// The ensemble that the last completed stage produced.
    pub fn final_ensemble(&self) -> &[Conformer] {
        if let Some(last) = self.refined.last() {
            return &last.accepted;
        }
        self.rotated.as_deref().unwrap_or(&self.minimized)
    }
}

/// Prepares the working molecule: the largest fragment when configured, anchors remapped to
/// its indices, and metal centres marked.
fn prepare(
    molecule: &Molecule,
    anchors: Option<&AnchorMap>,
    config: &PipelineConfig,
) -> (Molecule, Option<AnchorMap>) {
    let (mut prepared, anchors) =
        if config.sampling.largest_fragment && molecule.connected_components().len() > 1 {
            let (fragment, kept) = molecule.largest_fragment();
            info!(
                atoms = molecule.atom_count(),
                kept = fragment.atom_count(),
                "Using the largest fragment"
            );
            let anchors = anchors.map(|anchors| {
                let mut remapped = AnchorMap::new();
                for (new, &old) in kept.iter().enumerate() {
                    if let Some(position) = anchors.get(old) {
                        remapped.insert(new, *position);
                    }
                }
                remapped
            });
            (fragment, anchors)
        } else {
            (molecule.clone(), anchors.cloned())
        };
    if !config.sampling.metals.is_empty() {
        prepared.mark_metal_centers(&config.sampling.metals);
    }
    (prepared, anchors.filter(|a| !a.is_empty()))
}

/// Runs the whole pipeline for one molecule.
///
/// With an output layout, every stage persists its ensemble as it completes; the enumerated
/// stream is written while it is produced.
#[instrument(skip_all, fields(molecule = molecule.name()))]
pub fn run(
    molecule: &Molecule,
    anchors: Option<&AnchorMap>,
    config: &PipelineConfig,
    engines: &Engines,
    output: Option<&OutputLayout>,
    reporter: &ProgressReporter,
) -> Result<MoleculeReport, EngineError> {
    let progress = reporter.start_molecule(molecule.name());
    match execute(molecule, anchors, config, engines, output, &progress) {
        Ok(report) => {
            progress.finished(report.final_ensemble().len());
            Ok(report)
        }
        Err(e) => {
            progress.failed(e.to_string());
            Err(e)
        }
    }
}

fn execute(
    molecule: &Molecule,
    anchors: Option<&AnchorMap>,
    config: &PipelineConfig,
    engines: &Engines,
    output: Option<&OutputLayout>,
    progress: &MoleculeProgress,
) -> Result<MoleculeReport, EngineError> {
    let started = Instant::now();
    let name = molecule.name().to_string();

    // === Phase 0: Preparation and admission ===
    let (molecule, anchors) = prepare(molecule, anchors, config);
    let anchors = anchors.as_ref();
    if let Some(max) = config.sampling.max_molecular_weight {
        let weight = molecule.molecular_weight();
        if weight > max {
            return Err(EngineError::InvalidMolecule {
                molecule: name,
                reason: format!("molecular weight {weight:.2} exceeds the limit of {max:.2}"),
            });
        }
    }
    let strategy =
        ForceFieldStrategy::resolve(engines.force_field, &molecule, config.minimization.force_field)?;
    let rings = RingInfo::perceive(&molecule);
    let torsions = find_rotatable_torsions(&molecule, &rings, config.filter.heavy_only);

    let scan = &config.torsion_scan;
    let admission = if !scan.enabled {
        EnumerationStatus::Disabled
    } else if torsions.is_empty() {
        EnumerationStatus::NoRotatableBonds
    } else if torsions.len() > scan.max_torsions {
        warn!(
            torsions = torsions.len(),
            max_torsions = scan.max_torsions,
            "Too many rotatable torsions; skipping the dihedral scan"
        );
        EnumerationStatus::Rejected {
            torsions: torsions.len(),
            max: scan.max_torsions,
        }
    } else {
        EnumerationStatus::Completed
    };

    if let EnumerationStatus::Rejected { torsions, max } = admission {
        progress.notice(format!(
            "{torsions} rotatable torsions exceed the limit of {max}; dihedral scan skipped"
        ));
    }

    // === Phase 1: Embedding ===
    let requested = resolve_sample_size(&molecule, config.sampling.sample);
    progress.phase(Phase::Embedding, None);
    let geometries = embed(
        engines.embedder,
        &molecule,
        requested,
        config.sampling.seed,
        anchors,
    );
    if geometries.is_empty() {
        return Err(EngineError::EmbeddingFailed {
            molecule: name,
            requested,
        });
    }
    let initial_samples = geometries.len();

    // === Phase 2: Force-field minimization and filtering ===
    progress.phase(Phase::Minimization, Some(initial_samples as u64));
    let minimizer = Minimizer::new(engines.force_field, &molecule, strategy, &config.minimization);
    let minimized = minimizer.minimize_all(geometries, anchors, || progress.step())?;

    let filter = DuplicateFilter::new(engines.rmsd, &molecule, &config.filter);
    let unique = filter.run(minimized, torsions.as_slice());
    info!(
        initial = initial_samples,
        energy_duplicates = unique.prefilter_duplicates,
        rmsd_duplicates = unique.geometry_duplicates,
        unique = unique.unique(),
        family = %strategy.family(),
        "Force-field ensemble filtered"
    );
    if let Some(layout) = output {
        EnsembleWriter::write_all(&layout.minimized_path(&name), &molecule, &unique.accepted)?;
    }

    let mut row = SummaryRow {
        molecule: name.clone(),
        initial_samples,
        prefilter_duplicates: unique.prefilter_duplicates,
        geometry_duplicates: unique.geometry_duplicates,
        unique_conformers: unique.unique(),
        rotated: None,
        refinements: Vec::new(),
        elapsed_seconds: 0.0,
        overall_charge: molecule.total_formal_charge(),
    };

    // === Phase 3: Dihedral scan ===
    let rotated = if admission == EnumerationStatus::Completed {
        progress.phase(Phase::TorsionScan, Some(unique.unique() as u64));
        let enumerator =
            TorsionEnumerator::new(&molecule, &minimizer, torsions.as_slice(), scan.degree);
        let mut streaming = DuplicateFilter::new(engines.rmsd, &molecule, &config.filter).streaming();
        let step = || progress.step();
        let total = match output {
            Some(layout) => {
                let mut raw = EnsembleWriter::create(&layout.enumerated_path(&name), &molecule)?;
                let total =
                    enumerator.enumerate_all(&unique.accepted, &mut (&mut raw, &mut streaming), step)?;
                raw.finish()?;
                total
            }
            None => enumerator.enumerate_all(&unique.accepted, &mut streaming, step)?,
        };
        let rotated = streaming.finish();
        info!(
            rotated = total,
            energy_duplicates = rotated.prefilter_duplicates,
            rmsd_duplicates = rotated.geometry_duplicates,
            unique = rotated.unique(),
            "Rotated ensemble filtered"
        );
        if let Some(layout) = output {
            EnsembleWriter::write_all(&layout.rotated_path(&name), &molecule, &rotated.accepted)?;
        }
        row.rotated = Some(RotatedCounts {
            total,
            unique: rotated.unique(),
        });
        Some(rotated.accepted)
    } else {
        None
    };

    // === Phase 4: Refinement ===
    let mut refined = Vec::with_capacity(engines.potentials.len());
    let input = rotated.as_deref().unwrap_or(&unique.accepted);
    for potential in engines.potentials {
        progress.phase(
            Phase::Refinement {
                engine: potential.name().to_string(),
            },
            None,
        );
        let filter = DuplicateFilter::new(engines.rmsd, &molecule, &config.filter);
        let stage = RefinementStage::new(*potential, filter, config.refinement.ewin);
        let outcome = stage.refine(&molecule, input, row.overall_charge)?;
        if let Some(layout) = output {
            EnsembleWriter::write_all(
                &layout.refined_path(&name, &outcome.engine),
                &molecule,
                &outcome.accepted,
            )?;
        }
        row.refinements.push(RefinementCounts {
            engine: outcome.engine.clone(),
            initial: input.len(),
            energy_duplicates: outcome.stats.prefilter_duplicates,
            rmsd_duplicates: outcome.stats.geometry_duplicates,
            rejected: outcome.stats.rejected(),
            unique: outcome.unique(),
        });
        refined.push(outcome);
    }

    row.elapsed_seconds = started.elapsed().as_secs_f64();
    Ok(MoleculeReport {
        row,
        minimized: unique.accepted,
        rotated,
        refined,
        enumeration: admission,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engines::forcefield::ForceFieldFamily;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::molecule::MoleculeBuilder;
    use crate::core::models::topology::BondOrder;
    use crate::engine::error::Severity;
    use crate::engine::progress::Progress;
    use crate::testing::{
        self, SCENARIO, ScriptedEmbedder, ScriptedForceFieldEngine, ScriptedPotential, ScriptedRmsd,
    };
    use nalgebra::Point3;
    use std::sync::{Arc, Mutex};

    struct Fixture {
        embedder: ScriptedEmbedder,
        force_field: ScriptedForceFieldEngine,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                embedder: ScriptedEmbedder::new(),
                force_field: ScriptedForceFieldEngine::new(),
            }
        }

        fn engines<'a>(&'a self, potentials: &'a [&'a dyn PotentialEngine]) -> Engines<'a> {
            Engines {
                embedder: &self.embedder,
                force_field: &self.force_field,
                rmsd: &ScriptedRmsd,
                potentials,
            }
        }
    }

    fn recording_reporter() -> (Arc<Mutex<Vec<Progress>>>, ProgressReporter<'static>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |event| {
            sink.lock().unwrap().push(event);
        }));
        (events, reporter)
    }

    fn no_scan(samples: usize) -> PipelineConfig {
        let mut config = testing::config_with_samples(samples);
        config.torsion_scan.enabled = false;
        config
    }

    fn scan(degree: f64) -> PipelineConfig {
        let mut config = testing::config_with_samples(20);
        config.torsion_scan.degree = degree;
        config
    }

    fn count_records(path: &Path) -> usize {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .filter(|l| l.trim() == "$$$$")
            .count()
    }

    #[test]
    fn twenty_pentane_samples_collapse_to_four_conformers() {
        let fixture = Fixture::new();
        let report = run(
            &testing::pentane(),
            None,
            &no_scan(20),
            &fixture.engines(&[]),
            None,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(report.row.initial_samples, 20);
        assert_eq!(report.row.prefilter_duplicates, 16);
        assert_eq!(report.row.geometry_duplicates, 0);
        assert_eq!(report.row.unique_conformers, 4);
        assert_eq!(report.row.overall_charge, 0);
        assert_eq!(report.row.rotated, None);
        assert_eq!(report.enumeration, EnumerationStatus::Disabled);
        let energies: Vec<f64> = report.final_ensemble().iter().map(|c| c.energy).collect();
        assert_eq!(energies, vec![-5.27175, -4.44184, -3.84858, -1.57172]);
    }

    #[test]
    fn dihedral_scan_at_120_degrees_yields_36_rotated_and_4_unique() {
        let fixture = Fixture::new();
        let report = run(
            &testing::pentane(),
            None,
            &scan(120.0),
            &fixture.engines(&[]),
            None,
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(report.enumeration, EnumerationStatus::Completed);
        assert_eq!(report.row.rotated, Some(RotatedCounts { total: 36, unique: 4 }));
        assert_eq!(report.rotated.as_ref().map(Vec::len), Some(4));
    }

    #[test]
    fn torsion_count_above_the_ceiling_skips_the_scan() {
        let fixture = Fixture::new();
        let mut config = scan(120.0);
        config.torsion_scan.max_torsions = 1;
        let (events, reporter) = recording_reporter();
        let report = run(
            &testing::pentane(),
            None,
            &config,
            &fixture.engines(&[]),
            None,
            &reporter,
        )
        .unwrap();

        assert_eq!(
            report.enumeration,
            EnumerationStatus::Rejected { torsions: 2, max: 1 }
        );
        assert_eq!(report.row.rotated, None);
        assert_eq!(report.final_ensemble().len(), 4);

        let events = events.lock().unwrap();
        let notices: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Progress::Notice { message, .. } => Some(message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            notices,
            vec!["2 rotatable torsions exceed the limit of 1; dihedral scan skipped"]
        );
        assert!(!events.iter().any(|e| matches!(
            e,
            Progress::PhaseStarted {
                phase: Phase::TorsionScan,
                ..
            }
        )));
    }

    #[test]
    fn torsion_count_equal_to_the_ceiling_is_scanned() {
        let fixture = Fixture::new();
        let mut config = scan(120.0);
        config.torsion_scan.max_torsions = 2;
        let report = run(
            &testing::pentane(),
            None,
            &config,
            &fixture.engines(&[]),
            None,
            &ProgressReporter::new(),
        )
        .unwrap();
        assert_eq!(report.enumeration, EnumerationStatus::Completed);
    }

    #[test]
    fn progress_events_follow_the_molecule_through_its_phases() {
        let fixture = Fixture::new();
        let (events, reporter) = recording_reporter();
        run(
            &testing::pentane(),
            None,
            &scan(120.0),
            &fixture.engines(&[]),
            None,
            &reporter,
        )
        .unwrap();

        let events = events.lock().unwrap();
        assert!(events.iter().all(|e| e.molecule() == "pentane"));
        let phases: Vec<(Phase, Option<u64>)> = events
            .iter()
            .filter_map(|e| match e {
                Progress::PhaseStarted { phase, steps, .. } => Some((phase.clone(), *steps)),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                (Phase::Embedding, None),
                (Phase::Minimization, Some(20)),
                (Phase::TorsionScan, Some(4)),
            ]
        );
        let steps = events
            .iter()
            .filter(|e| matches!(e, Progress::StepCompleted { .. }))
            .count();
        assert_eq!(steps, 24);
        assert!(matches!(
            events.last(),
            Some(Progress::MoleculeFinished { unique: 4, .. })
        ));
    }

    #[test]
    fn refinement_consumes_the_rotated_ensemble() {
        let fixture = Fixture::new();
        let potential = ScriptedPotential::converging(SCENARIO.iter().map(|(e, _)| e * 2.0).collect());
        let potentials: [&dyn PotentialEngine; 1] = [&potential];
        let report = run(
            &testing::pentane(),
            None,
            &scan(120.0),
            &fixture.engines(&potentials),
            None,
            &ProgressReporter::new(),
        )
        .unwrap();

        let counts = report.row.refinement("scripted").unwrap();
        assert_eq!(counts.initial, 4);
        assert_eq!(counts.unique, 4);
        assert_eq!(counts.rejected, 0);
        let refined = report.final_ensemble();
        assert_eq!(refined[0].energy, -5.27175 * 2.0);
        assert_eq!(refined[0].display_name(), "pentane conformer 1");
    }

    #[test]
    fn empty_embedding_is_a_skippable_failure() {
        let fixture = Fixture {
            embedder: ScriptedEmbedder::with_yields(vec![0, 0]),
            force_field: ScriptedForceFieldEngine::new(),
        };
        let (events, reporter) = recording_reporter();
        let err = run(
            &testing::pentane(),
            None,
            &no_scan(20),
            &fixture.engines(&[]),
            None,
            &reporter,
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::EmbeddingFailed { requested: 20, .. }));
        assert_eq!(err.severity(), Severity::SkippableMolecule);
        assert_eq!(fixture.embedder.calls().len(), 2);
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(Progress::MoleculeFailed { .. })
        ));
    }

    #[test]
    fn heavy_molecules_are_rejected_before_embedding() {
        let fixture = Fixture::new();
        let mut config = no_scan(20);
        config.sampling.max_molecular_weight = Some(50.0);
        let err = run(
            &testing::pentane(),
            None,
            &config,
            &fixture.engines(&[]),
            None,
            &ProgressReporter::new(),
        )
        .unwrap_err();

        assert!(matches!(err, EngineError::InvalidMolecule { .. }));
        assert!(fixture.embedder.calls().is_empty());
    }

    #[test]
    fn missing_force_field_family_is_fatal() {
        let fixture = Fixture {
            embedder: ScriptedEmbedder::new(),
            force_field: ScriptedForceFieldEngine {
                families: vec![ForceFieldFamily::Uff],
                constraints: Mutex::new(0),
            },
        };
        let err = run(
            &testing::pentane(),
            None,
            &no_scan(20),
            &fixture.engines(&[]),
            None,
            &ProgressReporter::new(),
        )
        .unwrap_err();
        assert_eq!(err.severity(), Severity::Fatal);
    }

    #[test]
    fn salts_are_reduced_to_the_largest_fragment_with_anchors_remapped() {
        let mut builder = MoleculeBuilder::new("pentane sodium salt");
        builder.add_atom(Atom::new(Element::from_atomic_number(11).unwrap()));
        for hydrogens in [3, 2, 2, 2, 3] {
            builder.add_atom(Atom::new(Element::C).with_implicit_hydrogens(hydrogens));
        }
        for i in 1..5 {
            builder.add_bond(i, i + 1, BondOrder::Single);
        }
        let salt = builder.build().unwrap();
        let mut anchors = AnchorMap::new();
        anchors
            .insert(0, Point3::new(9.0, 9.0, 9.0))
            .insert(2, Point3::new(1.0, 0.0, 0.0));

        let (prepared, remapped) = prepare(&salt, Some(&anchors), &no_scan(20));

        assert_eq!(prepared.atom_count(), 5);
        let remapped = remapped.unwrap();
        assert_eq!(remapped.atoms(), vec![1]);
        assert_eq!(remapped.get(1), Some(&Point3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn every_stage_persists_its_ensemble() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());
        let fixture = Fixture::new();
        let potential = ScriptedPotential::converging(SCENARIO.iter().map(|(e, _)| *e).collect());
        let potentials: [&dyn PotentialEngine; 1] = [&potential];
        run(
            &testing::pentane(),
            None,
            &scan(120.0),
            &fixture.engines(&potentials),
            Some(&layout),
            &ProgressReporter::new(),
        )
        .unwrap();

        assert_eq!(count_records(&layout.minimized_path("pentane")), 4);
        assert_eq!(count_records(&layout.enumerated_path("pentane")), 36);
        assert_eq!(count_records(&layout.rotated_path("pentane")), 4);
        assert_eq!(count_records(&layout.refined_path("pentane", "scripted")), 4);
        assert!(dir.path().join("pentane_scripted.sdf").exists());
    }

    #[test]
    fn output_names_replace_unsafe_characters() {
        let layout = OutputLayout::new("out");
        assert_eq!(
            layout.minimized_path("trans/cis 2"),
            Path::new("out").join("trans_cis_2_ff.sdf")
        );
        assert_eq!(sanitize("  "), "molecule");
    }
}
