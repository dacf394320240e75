use crate::error::{CliError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// `sample = 20` embeds a fixed count; `sample = "auto"` estimates it from descriptors.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FileSample {
    Fixed(usize),
    Keyword(String),
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSamplingConfig {
    pub sample: Option<FileSample>,
    pub auto_sample: Option<usize>,
    pub seed: Option<u64>,
    pub metals: Option<Vec<String>>,
    pub max_molecular_weight: Option<f64>,
    pub largest_fragment: Option<bool>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileFilterConfig {
    pub initial_energy_threshold: Option<f64>,
    pub energy_threshold: Option<f64>,
    pub rms_threshold: Option<f64>,
    pub heavy_only: Option<bool>,
    pub max_matches_rmsd: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileMinimizationConfig {
    pub force_field: Option<String>,
    pub max_iterations: Option<usize>,
    pub template_restarts: Option<usize>,
    pub constraint_weight: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileTorsionScanConfig {
    pub enabled: Option<bool>,
    pub degree: Option<f64>,
    pub max_torsions: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRefinementConfig {
    /// Engines to refine with; only `"xtb"` is recognized.
    pub engines: Option<Vec<String>>,
    pub ewin: Option<f64>,
    pub xtb_command: Option<String>,
    pub xtb_cycles: Option<usize>,
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileConfig {
    pub sampling: Option<FileSamplingConfig>,
    pub filter: Option<FileFilterConfig>,
    pub minimization: Option<FileMinimizationConfig>,
    pub torsion_scan: Option<FileTorsionScanConfig>,
    pub refinement: Option<FileRefinementConfig>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    pub fn from_toml(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
