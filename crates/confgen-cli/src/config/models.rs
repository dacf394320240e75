use confgen::engine::config::PipelineConfig;
use std::path::PathBuf;

/// How the external xtb program is invoked during refinement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XtbSettings {
    pub command: String,
    pub max_cycles: usize,
}

pub struct AppConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    pub pipeline: PipelineConfig,
    /// `None` when refinement is disabled.
    pub xtb: Option<XtbSettings>,
}
