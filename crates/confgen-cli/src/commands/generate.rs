use crate::cli::GenerateArgs;
use crate::config::builder::build_config;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use confgen::core::engines::potential::PotentialEngine;
use confgen::core::engines::reference::{
    KabschRmsd, ReferenceEmbedder, ValenceForceFieldEngine, XtbPotential,
};
use confgen::core::io::sdf::SdfFile;
use confgen::core::io::traits::MolecularFile;
use confgen::engine::progress::ProgressReporter;
use confgen::workflows::batch::{self, BatchInput};
use confgen::workflows::generate::{Engines, OutputLayout};
use indicatif::MultiProgress;
use tracing::{info, warn};

pub fn run(args: GenerateArgs, bars: &MultiProgress) -> Result<()> {
    info!("Merging configuration from file and CLI arguments...");
    let app = build_config(&args)?;

    info!("Loading molecules from {:?}", &app.input_path);
    let records =
        SdfFile::read_from_path(&app.input_path).map_err(|e| CliError::FileParsing {
            path: app.input_path.clone(),
            source: e.into(),
        })?;
    if records.is_empty() {
        return Err(CliError::Config(format!(
            "No molecules found in {}",
            app.input_path.display()
        )));
    }
    let inputs: Vec<BatchInput> = records
        .into_iter()
        .map(|record| BatchInput::new(record.molecule).with_anchors(record.anchors))
        .collect();

    std::fs::create_dir_all(&app.output_dir)?;
    let layout = OutputLayout::new(&app.output_dir);

    let force_field = ValenceForceFieldEngine::default();
    let xtb = app
        .xtb
        .as_ref()
        .map(|settings| XtbPotential::new(settings.command.clone()).with_max_cycles(settings.max_cycles));
    let potentials: Vec<&dyn PotentialEngine> = xtb
        .iter()
        .map(|engine| engine as &dyn PotentialEngine)
        .collect();
    let engines = Engines {
        embedder: &ReferenceEmbedder,
        force_field: &force_field,
        rmsd: &KabschRmsd,
        potentials: &potentials,
    };

    let progress_handler = CliProgressHandler::new(bars);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    println!("Generating conformers for {} molecule(s)...", inputs.len());
    let outcome = batch::run(&inputs, &app.pipeline, &engines, Some(&layout), &reporter)?;

    let summary_path = layout.summary_path();
    outcome.table.write_to_path(&summary_path)?;

    for row in outcome.table.rows() {
        match row.rotated {
            Some(rotated) => println!(
                "✓ {}: {} sampled, {} unique, {} rotated, {} rotated unique ({:.2} s)",
                row.molecule,
                row.initial_samples,
                row.unique_conformers,
                rotated.total,
                rotated.unique,
                row.elapsed_seconds
            ),
            None => println!(
                "✓ {}: {} sampled, {} unique ({:.2} s)",
                row.molecule, row.initial_samples, row.unique_conformers, row.elapsed_seconds
            ),
        }
    }
    for skipped in &outcome.skipped {
        warn!(molecule = %skipped.name, reason = %skipped.reason, "Molecule skipped");
        println!("✗ {} skipped: {}", skipped.name, skipped.reason);
    }
    println!("Summary written to: {}", summary_path.display());

    Ok(())
}
