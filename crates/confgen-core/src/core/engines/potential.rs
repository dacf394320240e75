use crate::core::models::atom::Element;
use crate::core::models::conformer::Geometry;
use nalgebra::Point3;
use thiserror::Error;

/// kcal/mol per Hartree.
pub const HARTREE_TO_KCAL: f64 = 627.509;

/// Result of one re-optimization; energies are in kcal/mol.
#[derive(Debug, Clone, PartialEq)]
pub struct Optimization {
    pub converged: bool,
    pub energy: f64,
    pub geometry: Geometry,
}

#[derive(Debug, Error)]
pub enum PotentialError {
    /// The engine cannot run at all; retrying other conformers is pointless.
    #[error("Potential engine '{engine}' is unavailable: {message}")]
    Unavailable { engine: String, message: String },
    /// This optimization failed; other conformers may still succeed.
    #[error("Potential engine '{engine}' failed: {message}")]
    Failed { engine: String, message: String },
    #[error("I/O error while running potential engine: {0}")]
    Io(#[from] std::io::Error),
}

impl PotentialError {
    /// Whether the failure only affects the conformer being optimized.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// A semi-empirical or machine-learned potential used for the final re-optimization.
///
/// Instances are constructed once per batch and shared across workers.
pub trait PotentialEngine: Send + Sync {
    /// Short identifier used in file names and summary columns.
    fn name(&self) -> &str;

    fn optimize(
        &self,
        geometry: &[Point3<f64>],
        elements: &[Element],
        charge: i32,
    ) -> Result<Optimization, PotentialError>;
}
