//! Contracts of the numerical collaborators the pipeline drives, and reference implementations.
//!
//! The pipeline never embeds, minimizes or optimizes geometries itself. It asks an
//! [`EmbeddingEngine`](embedding::EmbeddingEngine) for raw coordinates, a
//! [`ForceFieldEngine`](forcefield::ForceFieldEngine) for local minimization, an
//! [`RmsdEngine`](rmsd::RmsdEngine) for symmetry-aware best-fit RMSD and a
//! [`PotentialEngine`](potential::PotentialEngine) for the final re-optimization. All calls are
//! synchronous and blocking.

pub mod embedding;
pub mod forcefield;
pub mod potential;
pub mod reference;
pub mod rmsd;
