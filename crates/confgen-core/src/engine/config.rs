use crate::core::engines::forcefield::ForceFieldFamily;
use crate::core::models::atom::Element;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// How many geometries to embed per molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleSize {
    Fixed(usize),
    /// Estimated from descriptors, scaled by `multiplier`.
    Auto { multiplier: usize },
}

impl Default for SampleSize {
    fn default() -> Self {
        Self::Auto { multiplier: 20 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub sample: SampleSize,
    pub seed: u64,
    /// Elements whose atoms are treated as metal centres.
    pub metals: Vec<Element>,
    /// Molecules heavier than this (g/mol) are skipped.
    pub max_molecular_weight: Option<f64>,
    /// Keep only the largest connected fragment (strips counter-ions and solvent).
    pub largest_fragment: bool,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample: SampleSize::default(),
            seed: 62609,
            metals: Vec::new(),
            max_molecular_weight: None,
            largest_fragment: true,
        }
    }
}

/// Thresholds shared by every duplicate-filter call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterThresholds {
    /// Energy difference (kcal/mol) below which two conformers are the same.
    pub initial_energy_threshold: f64,
    /// Energy difference below which RMSD is consulted.
    pub energy_threshold: f64,
    pub rms_threshold: f64,
    /// Compare heavy atoms only; also restricts torsion detection to heavy-atom dihedrals.
    pub heavy_only: bool,
    /// Upper bound on symmetry mappings tried per RMSD evaluation.
    pub max_matches_rmsd: usize,
}

impl Default for FilterThresholds {
    fn default() -> Self {
        Self {
            initial_energy_threshold: 0.0001,
            energy_threshold: 0.25,
            rms_threshold: 0.25,
            heavy_only: true,
            max_matches_rmsd: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimizationConfig {
    pub force_field: ForceFieldFamily,
    pub max_iterations: usize,
    /// Extra minimizer rounds allowed for template-constrained geometries.
    pub template_restarts: usize,
    pub constraint_weight: f64,
}

impl Default for MinimizationConfig {
    fn default() -> Self {
        Self {
            force_field: ForceFieldFamily::Mmff,
            max_iterations: 1000,
            template_restarts: 10,
            constraint_weight: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsionScanConfig {
    pub enabled: bool,
    /// Grid step in degrees.
    pub degree: f64,
    /// Molecules with more rotatable torsions than this are not enumerated.
    pub max_torsions: usize,
}

impl Default for TorsionScanConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            degree: 30.0,
            max_torsions: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinementConfig {
    /// Energy window (kcal/mol) above the running minimum.
    pub ewin: f64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self { ewin: 40.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub sampling: SamplingConfig,
    pub filter: FilterThresholds,
    pub minimization: MinimizationConfig,
    pub torsion_scan: TorsionScanConfig,
    pub refinement: RefinementConfig,
}

#[derive(Default)]
pub struct PipelineConfigBuilder {
    sample: Option<SampleSize>,
    seed: Option<u64>,
    metals: Option<Vec<Element>>,
    max_molecular_weight: Option<f64>,
    largest_fragment: Option<bool>,
    initial_energy_threshold: Option<f64>,
    energy_threshold: Option<f64>,
    rms_threshold: Option<f64>,
    heavy_only: Option<bool>,
    max_matches_rmsd: Option<usize>,
    force_field: Option<ForceFieldFamily>,
    max_iterations: Option<usize>,
    template_restarts: Option<usize>,
    constraint_weight: Option<f64>,
    dihedral_scan: Option<bool>,
    degree: Option<f64>,
    max_torsions: Option<usize>,
    ewin: Option<f64>,
}

fn positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be a positive number, got {value}"),
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must not be negative, got {value}"),
        })
    }
}

fn at_least_one(name: &'static str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        Err(ConfigError::InvalidParameter {
            name,
            reason: "must be at least 1".to_string(),
        })
    } else {
        Ok(value)
    }
}

impl PipelineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(mut self, sample: SampleSize) -> Self {
        self.sample = Some(sample);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn metals(mut self, metals: Vec<Element>) -> Self {
        self.metals = Some(metals);
        self
    }
    pub fn max_molecular_weight(mut self, weight: Option<f64>) -> Self {
        self.max_molecular_weight = weight;
        self
    }
    pub fn largest_fragment(mut self, enabled: bool) -> Self {
        self.largest_fragment = Some(enabled);
        self
    }
    pub fn initial_energy_threshold(mut self, threshold: f64) -> Self {
        self.initial_energy_threshold = Some(threshold);
        self
    }
    pub fn energy_threshold(mut self, threshold: f64) -> Self {
        self.energy_threshold = Some(threshold);
        self
    }
    pub fn rms_threshold(mut self, threshold: f64) -> Self {
        self.rms_threshold = Some(threshold);
        self
    }
    pub fn heavy_only(mut self, heavy_only: bool) -> Self {
        self.heavy_only = Some(heavy_only);
        self
    }
    pub fn max_matches_rmsd(mut self, matches: usize) -> Self {
        self.max_matches_rmsd = Some(matches);
        self
    }
    pub fn force_field(mut self, family: ForceFieldFamily) -> Self {
        self.force_field = Some(family);
        self
    }
    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = Some(iterations);
        self
    }
    pub fn template_restarts(mut self, restarts: usize) -> Self {
        self.template_restarts = Some(restarts);
        self
    }
    pub fn constraint_weight(mut self, weight: f64) -> Self {
        self.constraint_weight = Some(weight);
        self
    }
    pub fn dihedral_scan(mut self, enabled: bool) -> Self {
        self.dihedral_scan = Some(enabled);
        self
    }
    pub fn degree(mut self, degree: f64) -> Self {
        self.degree = Some(degree);
        self
    }
    pub fn max_torsions(mut self, max: usize) -> Self {
        self.max_torsions = Some(max);
        self
    }
    pub fn ewin(mut self, ewin: f64) -> Self {
        self.ewin = Some(ewin);
        self
    }

    /// Builds the configuration; `sample` and `force_field` are required, everything else
    /// falls back to its default.
    pub fn build(self) -> Result<PipelineConfig, ConfigError> {
        let sample = match self.sample.ok_or(ConfigError::MissingParameter("sample"))? {
            SampleSize::Fixed(n) => SampleSize::Fixed(at_least_one("sample", n)?),
            SampleSize::Auto { multiplier } => SampleSize::Auto {
                multiplier: at_least_one("auto_sample", multiplier)?,
            },
        };
        let defaults = SamplingConfig::default();
        let sampling = SamplingConfig {
            sample,
            seed: self.seed.unwrap_or(defaults.seed),
            metals: self.metals.unwrap_or_default(),
            max_molecular_weight: self
                .max_molecular_weight
                .map(|w| positive("max_molecular_weight", w))
                .transpose()?,
            largest_fragment: self.largest_fragment.unwrap_or(defaults.largest_fragment),
        };

        let defaults = FilterThresholds::default();
        let filter = FilterThresholds {
            initial_energy_threshold: non_negative(
                "initial_energy_threshold",
                self.initial_energy_threshold
                    .unwrap_or(defaults.initial_energy_threshold),
            )?,
            energy_threshold: non_negative(
                "energy_threshold",
                self.energy_threshold.unwrap_or(defaults.energy_threshold),
            )?,
            rms_threshold: non_negative(
                "rms_threshold",
                self.rms_threshold.unwrap_or(defaults.rms_threshold),
            )?,
            heavy_only: self.heavy_only.unwrap_or(defaults.heavy_only),
            max_matches_rmsd: at_least_one(
                "max_matches_rmsd",
                self.max_matches_rmsd.unwrap_or(defaults.max_matches_rmsd),
            )?,
        };

        let defaults = MinimizationConfig::default();
        let minimization = MinimizationConfig {
            force_field: self
                .force_field
                .ok_or(ConfigError::MissingParameter("force_field"))?,
            max_iterations: at_least_one(
                "max_iterations",
                self.max_iterations.unwrap_or(defaults.max_iterations),
            )?,
            template_restarts: self.template_restarts.unwrap_or(defaults.template_restarts),
            constraint_weight: positive(
                "constraint_weight",
                self.constraint_weight.unwrap_or(defaults.constraint_weight),
            )?,
        };

        let defaults = TorsionScanConfig::default();
        let degree = positive("degree", self.degree.unwrap_or(defaults.degree))?;
        if degree > 360.0 {
            return Err(ConfigError::InvalidParameter {
                name: "degree",
                reason: format!("must not exceed 360, got {degree}"),
            });
        }
        let torsion_scan = TorsionScanConfig {
            enabled: self.dihedral_scan.unwrap_or(defaults.enabled),
            degree,
            max_torsions: self.max_torsions.unwrap_or(defaults.max_torsions),
        };

        let refinement = RefinementConfig {
            ewin: positive(
                "ewin",
                self.ewin.unwrap_or(RefinementConfig::default().ewin),
            )?,
        };

        Ok(PipelineConfig {
            sampling,
            filter,
            minimization,
            torsion_scan,
            refinement,
        })
    }
}
