//! Self-contained engines that let the pipeline run without external chemistry toolkits.

pub mod embedder;
pub mod kabsch_rmsd;
pub mod potentials;
pub mod valence;
pub mod xtb;

pub use embedder::ReferenceEmbedder;
pub use kabsch_rmsd::KabschRmsd;
pub use valence::ValenceForceFieldEngine;
pub use xtb::XtbPotential;
