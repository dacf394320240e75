use thiserror::Error;

use super::config::ConfigError;
use crate::core::engines::forcefield::{ForceFieldError, ForceFieldFamily};
use crate::core::engines::potential::PotentialError;
use crate::core::io::sdf::SdfError;
use crate::core::utils::geometry::GeometryError;
use std::path::PathBuf;

/// How the batch runner treats an error raised while processing one molecule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Log it, skip the molecule and continue with the rest of the batch.
    SkippableMolecule,
    /// Abort the whole run.
    Fatal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("No geometry could be embedded for '{molecule}' ({requested} requested)")]
    EmbeddingFailed { molecule: String, requested: usize },

    #[error("Molecule '{molecule}' cannot be processed: {reason}")]
    InvalidMolecule { molecule: String, reason: String },

    #[error("Force-field family {family} is not supported by the force-field engine")]
    UnsupportedForceField { family: ForceFieldFamily },

    #[error("Force-field setup failed for '{molecule}': {source}")]
    ForceField {
        molecule: String,
        #[source]
        source: ForceFieldError,
    },

    #[error("Geometry manipulation failed: {0}")]
    Geometry(#[from] GeometryError),

    #[error("Refinement failed: {0}")]
    Potential(#[from] PotentialError),

    #[error("Failed to write ensemble '{}': {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: SdfError,
    },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::EmbeddingFailed { .. } | Self::InvalidMolecule { .. } | Self::Geometry(_) => {
                Severity::SkippableMolecule
            }
            Self::ForceField { source, .. } => match source {
                ForceFieldError::UnsupportedFamily(_) => Severity::Fatal,
                _ => Severity::SkippableMolecule,
            },
            Self::Potential(e) if e.is_soft() => Severity::SkippableMolecule,
            Self::Config(_)
            | Self::UnsupportedForceField { .. }
            | Self::Potential(_)
            | Self::Output { .. }
            | Self::Internal(_) => Severity::Fatal,
        }
    }
}
