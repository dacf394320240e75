//! Graph perception on [`Molecule`](crate::core::models::molecule::Molecule)s: rings,
//! rotatable torsions, descriptor counts and symmetry mappings.

pub mod descriptors;
pub mod rings;
pub mod rotatable;
pub mod symmetry;
