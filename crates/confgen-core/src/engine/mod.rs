//! # Engine Module
//!
//! The stateful stages of the conformer pipeline and the configuration, errors and progress
//! reporting they share.
//!
//! ## Overview
//!
//! A molecule flows through the stages in a fixed order: the sample count is resolved, the
//! embedding adapter produces raw geometries, the minimizer relaxes them with a force field
//! chosen once per molecule, and the duplicate filter collapses the ensemble. When the
//! molecule has rotatable torsions the enumerator expands every survivor over a dihedral grid
//! and streams the children into a second filter. An optional refinement stage re-optimizes
//! the final ensemble with a higher-fidelity potential and filters it online.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Thresholds, sample sizing and stage parameters
//! - **Sampling** ([`sampler`], [`embedding`]) - Sample-count estimation and embedding retry
//! - **Minimization** ([`minimizer`]) - Force-field strategy and template constraints
//! - **Deduplication** ([`filter`]) - Sorted two-stage, streaming and online filter variants
//! - **Enumeration** ([`enumerator`]) - Recursive dihedral grid scan
//! - **Refinement** ([`refinement`]) - Potential re-optimization with an energy window
//! - **Bookkeeping** ([`state`], [`sink`], [`progress`]) - Conformer fates, sinks and progress
//! - **Error Handling** ([`error`]) - Error taxonomy with per-molecule severity

pub mod config;
pub mod embedding;
pub mod enumerator;
pub mod error;
pub mod filter;
pub mod minimizer;
pub mod progress;
pub mod refinement;
pub mod sampler;
pub mod sink;
pub mod state;
