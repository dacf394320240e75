use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "confgen - conformer ensembles for small molecules: embedding, force-field minimization, energy/RMSD deduplication, torsion scans and semi-empirical refinement.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads used to process molecules in parallel.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate conformer ensembles for every molecule of an SD file.
    Generate(GenerateArgs),
    /// Print descriptors, torsions and the estimated sample count of every molecule.
    Inspect(InspectArgs),
}

/// Arguments for the `generate` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    // --- Core Arguments ---
    /// Path to the input SD file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory that receives the ensembles and the summary table.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Sampling Overrides ---
    /// Embed exactly this many geometries per molecule.
    #[arg(long, value_name = "INT", conflicts_with = "auto_sample")]
    pub sample: Option<usize>,

    /// Estimate the sample count from descriptors, scaled by this multiplier.
    #[arg(long, value_name = "INT")]
    pub auto_sample: Option<usize>,

    /// Override the random seed used for embedding.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Filter Overrides ---
    /// Override the energy window (kcal/mol) of the first filter stage.
    #[arg(long, value_name = "FLOAT")]
    pub initial_energy_threshold: Option<f64>,

    /// Override the energy window (kcal/mol) within which RMSD is compared.
    #[arg(long, value_name = "FLOAT")]
    pub energy_threshold: Option<f64>,

    /// Override the RMSD threshold (Å).
    #[arg(long, value_name = "FLOAT")]
    pub rms_threshold: Option<f64>,

    // --- Minimization Overrides ---
    /// Force-field family: MMFF or UFF.
    #[arg(long = "ff", value_name = "FAMILY")]
    pub force_field: Option<String>,

    // --- Torsion Scan Overrides ---
    /// Disable the dihedral scan.
    #[arg(long)]
    pub nodihedrals: bool,

    /// Dihedral grid step in degrees.
    #[arg(long, value_name = "FLOAT")]
    pub degree: Option<f64>,

    /// Skip the dihedral scan for molecules with more rotatable torsions than this.
    #[arg(long, value_name = "INT")]
    pub max_torsions: Option<usize>,

    // --- Refinement ---
    /// Refine the final ensemble with the xtb program.
    #[arg(long)]
    pub xtb: bool,

    /// Override the refinement energy window (kcal/mol).
    #[arg(long, value_name = "FLOAT")]
    pub ewin: Option<f64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S filter.rms-threshold=0.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Path to the input SD file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Configuration file whose `sampling.metals` marks metal centres, as in `generate`.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Multiplier used for the sample-count estimate.
    #[arg(long, value_name = "INT", default_value_t = 20)]
    pub auto_sample: usize,
}
