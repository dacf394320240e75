//! # confgen Core Library
//!
//! Conformer generation for small molecules: sample-count estimation, embedding with a
//! fallback strategy, force-field minimization, two-stage energy/RMSD deduplication,
//! combinatorial torsion enumeration and re-optimization with a higher-fidelity potential.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Molecule`, `Conformer`), graph
//!   perception (rings, rotatable torsions, symmetry), geometry utilities, SDF and summary
//!   I/O, and the contracts of the numerical engines together with reference implementations.
//!
//! - **[`engine`]: The Logic Core.** The pipeline stages: the sampler, embedding and minimizer
//!   adapters, the duplicate filter in its sorted, streaming and online variants, the torsion
//!   enumerator and the refinement stage, plus configuration, errors and progress reporting.
//!
//! - **[`workflows`]: The Public API.** Runs the full pipeline for one molecule or a batch,
//!   producing persisted ensembles and one summary row per molecule.

pub mod core;
pub mod engine;
pub mod workflows;

#[cfg(test)]
pub(crate) mod testing;
