//! # Core Module
//!
//! Stateless building blocks of the conformer pipeline.
//!
//! - **Molecular Representation** ([`models`]) - Elements, atoms, bonds, molecules,
//!   conformers, torsions and template anchors
//! - **Graph Perception** ([`topology`]) - Rings, rotatable torsions, descriptors, symmetry
//! - **Geometry** ([`utils`]) - Dihedral manipulation, superposition and RMSD
//! - **File I/O** ([`io`]) - SD files and the CSV summary table
//! - **Collaborators** ([`engines`]) - Embedding, force-field, RMSD and potential contracts

pub mod engines;
pub mod io;
pub mod models;
pub mod topology;
pub mod utils;
