use super::defaults::DefaultsConfig;
use super::file::{FileConfig, FileSample, FileSamplingConfig};
use super::models::{AppConfig, XtbSettings};
use crate::cli::GenerateArgs;
use crate::error::{CliError, Result};
use confgen::core::engines::forcefield::ForceFieldFamily;
use confgen::core::models::atom::Element;
use confgen::engine::config::{PipelineConfigBuilder, SampleSize};
use std::fmt::Display;
use std::str::FromStr;

const XTB_ENGINE: &str = "xtb";

/// Merges the layers of configuration: command line > `--set` > file > defaults.
pub fn build_config(args: &GenerateArgs) -> Result<AppConfig> {
    let defaults = DefaultsConfig::default();

    let file_config = if let Some(config_path) = &args.config {
        FileConfig::from_file(config_path)?
    } else {
        FileConfig::default()
    };
    let mut file_config = apply_set_values(file_config, &args.set_values)?;

    let sampling = file_config.sampling.take().unwrap_or_default();
    let filter = file_config.filter.take().unwrap_or_default();
    let minimization = file_config.minimization.take().unwrap_or_default();
    let scan = file_config.torsion_scan.take().unwrap_or_default();
    let refinement = file_config.refinement.take().unwrap_or_default();

    let metals = configured_metals(&sampling)?;
    let auto_multiplier = args
        .auto_sample
        .or(sampling.auto_sample)
        .unwrap_or(defaults.auto_sample);
    let sample = match (args.sample, args.auto_sample) {
        (Some(n), _) => SampleSize::Fixed(n),
        (None, Some(multiplier)) => SampleSize::Auto { multiplier },
        (None, None) => match sampling.sample {
            Some(FileSample::Fixed(n)) => SampleSize::Fixed(n),
            Some(FileSample::Keyword(keyword)) if keyword.eq_ignore_ascii_case("auto") => {
                SampleSize::Auto {
                    multiplier: auto_multiplier,
                }
            }
            Some(FileSample::Keyword(other)) => {
                return Err(CliError::Config(format!(
                    "Invalid value for sampling.sample: '{other}'. Expected an integer or \"auto\"."
                )));
            }
            None => SampleSize::Auto {
                multiplier: auto_multiplier,
            },
        },
    };

    let family_name = args
        .force_field
        .clone()
        .or(minimization.force_field)
        .unwrap_or(defaults.force_field);
    let force_field = parse_value::<ForceFieldFamily>("minimization.force-field", &family_name)?;

    let dihedral_scan = !args.nodihedrals && scan.enabled.unwrap_or(defaults.dihedral_scan);

    let pipeline = PipelineConfigBuilder::new()
        .sample(sample)
        .seed(args.seed.or(sampling.seed).unwrap_or(defaults.seed))
        .metals(metals)
        .max_molecular_weight(sampling.max_molecular_weight)
        .largest_fragment(sampling.largest_fragment.unwrap_or(defaults.largest_fragment))
        .initial_energy_threshold(
            args.initial_energy_threshold
                .or(filter.initial_energy_threshold)
                .unwrap_or(defaults.initial_energy_threshold),
        )
        .energy_threshold(
            args.energy_threshold
                .or(filter.energy_threshold)
                .unwrap_or(defaults.energy_threshold),
        )
        .rms_threshold(
            args.rms_threshold
                .or(filter.rms_threshold)
                .unwrap_or(defaults.rms_threshold),
        )
        .heavy_only(filter.heavy_only.unwrap_or(defaults.heavy_only))
        .max_matches_rmsd(filter.max_matches_rmsd.unwrap_or(defaults.max_matches_rmsd))
        .force_field(force_field)
        .max_iterations(minimization.max_iterations.unwrap_or(defaults.max_iterations))
        .template_restarts(
            minimization
                .template_restarts
                .unwrap_or(defaults.template_restarts),
        )
        .constraint_weight(
            minimization
                .constraint_weight
                .unwrap_or(defaults.constraint_weight),
        )
        .dihedral_scan(dihedral_scan)
        .degree(args.degree.or(scan.degree).unwrap_or(defaults.degree))
        .max_torsions(
            args.max_torsions
                .or(scan.max_torsions)
                .unwrap_or(defaults.max_torsions),
        )
        .ewin(args.ewin.or(refinement.ewin).unwrap_or(defaults.ewin))
        .build()
        .map_err(|e| CliError::Config(e.to_string()))?;

    let engines = refinement.engines.unwrap_or_default();
    if let Some(unknown) = engines.iter().find(|e| !e.eq_ignore_ascii_case(XTB_ENGINE)) {
        return Err(CliError::Config(format!(
            "Unknown refinement engine '{unknown}'. Supported engines: {XTB_ENGINE}."
        )));
    }
    let xtb = (args.xtb || !engines.is_empty()).then(|| XtbSettings {
        command: refinement.xtb_command.unwrap_or(defaults.xtb_command),
        max_cycles: refinement.xtb_cycles.unwrap_or(defaults.xtb_cycles),
    });

    Ok(AppConfig {
        input_path: args.input.clone(),
        output_dir: args.output.clone(),
        pipeline,
        xtb,
    })
}

/// Elements treated as metal centres, from `sampling.metals`.
pub fn configured_metals(sampling: &FileSamplingConfig) -> Result<Vec<Element>> {
    sampling
        .metals
        .iter()
        .flatten()
        .map(|symbol| parse_value::<Element>("sampling.metals", symbol))
        .collect()
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| CliError::Config(format!("Invalid value for {key}: '{value}' ({e})")))
}

fn apply_set_values(mut config: FileConfig, set_values: &[String]) -> Result<FileConfig> {
    for kv_pair in set_values {
        let Some((key, value_str)) = kv_pair.split_once('=') else {
            return Err(CliError::Config(format!(
                "Invalid --set format: '{kv_pair}'. Expected KEY=VALUE."
            )));
        };
        let key = key.trim();

        match key {
            "sampling.sample" => {
                let sample = match value_str.trim().parse::<usize>() {
                    Ok(n) => FileSample::Fixed(n),
                    Err(_) => FileSample::Keyword(value_str.trim().to_string()),
                };
                config.sampling.get_or_insert_with(Default::default).sample = Some(sample);
            }
            "sampling.auto-sample" => {
                config.sampling.get_or_insert_with(Default::default).auto_sample =
                    Some(parse_value(key, value_str)?);
            }
            "sampling.seed" => {
                config.sampling.get_or_insert_with(Default::default).seed =
                    Some(parse_value(key, value_str)?);
            }
            "sampling.metals" => {
                config.sampling.get_or_insert_with(Default::default).metals = Some(
                    value_str
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect(),
                );
            }
            "sampling.max-molecular-weight" => {
                config
                    .sampling
                    .get_or_insert_with(Default::default)
                    .max_molecular_weight = Some(parse_value(key, value_str)?);
            }
            "sampling.largest-fragment" => {
                config
                    .sampling
                    .get_or_insert_with(Default::default)
                    .largest_fragment = Some(parse_value(key, value_str)?);
            }
            "filter.initial-energy-threshold" => {
                config
                    .filter
                    .get_or_insert_with(Default::default)
                    .initial_energy_threshold = Some(parse_value(key, value_str)?);
            }
            "filter.energy-threshold" => {
                config.filter.get_or_insert_with(Default::default).energy_threshold =
                    Some(parse_value(key, value_str)?);
            }
            "filter.rms-threshold" => {
                config.filter.get_or_insert_with(Default::default).rms_threshold =
                    Some(parse_value(key, value_str)?);
            }
            "filter.heavy-only" => {
                config.filter.get_or_insert_with(Default::default).heavy_only =
                    Some(parse_value(key, value_str)?);
            }
            "filter.max-matches-rmsd" => {
                config.filter.get_or_insert_with(Default::default).max_matches_rmsd =
                    Some(parse_value(key, value_str)?);
            }
            "minimization.force-field" => {
                config
                    .minimization
                    .get_or_insert_with(Default::default)
                    .force_field = Some(value_str.trim().to_string());
            }
            "minimization.max-iterations" => {
                config
                    .minimization
                    .get_or_insert_with(Default::default)
                    .max_iterations = Some(parse_value(key, value_str)?);
            }
            "minimization.template-restarts" => {
                config
                    .minimization
                    .get_or_insert_with(Default::default)
                    .template_restarts = Some(parse_value(key, value_str)?);
            }
            "minimization.constraint-weight" => {
                config
                    .minimization
                    .get_or_insert_with(Default::default)
                    .constraint_weight = Some(parse_value(key, value_str)?);
            }
            "torsion-scan.enabled" => {
                config.torsion_scan.get_or_insert_with(Default::default).enabled =
                    Some(parse_value(key, value_str)?);
            }
            "torsion-scan.degree" => {
                config.torsion_scan.get_or_insert_with(Default::default).degree =
                    Some(parse_value(key, value_str)?);
            }
            "torsion-scan.max-torsions" => {
                config
                    .torsion_scan
                    .get_or_insert_with(Default::default)
                    .max_torsions = Some(parse_value(key, value_str)?);
            }
            "refinement.ewin" => {
                config.refinement.get_or_insert_with(Default::default).ewin =
                    Some(parse_value(key, value_str)?);
            }
            _ => {
                return Err(CliError::Config(format!(
                    "Unsupported configuration key for --set: '{key}'"
                )));
            }
        }
    }
    Ok(config)
}
