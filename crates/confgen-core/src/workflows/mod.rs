//! # Workflows Module
//!
//! Top-level entry points that run the complete conformer pipeline.
//!
//! - **Single Molecule** ([`generate`]) - Embedding through refinement for one molecule,
//!   with optional persisted ensembles and a summary row
//! - **Batch** ([`batch`]) - Many molecules, skipping those that fail in a recoverable way

pub mod batch;
pub mod generate;
