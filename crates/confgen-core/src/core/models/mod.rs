pub mod anchor;
pub mod atom;
pub mod conformer;
pub mod molecule;
pub mod topology;
pub mod torsion;
