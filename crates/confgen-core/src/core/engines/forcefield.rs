use crate::core::models::conformer::Geometry;
use crate::core::models::molecule::Molecule;
use nalgebra::Point3;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Force-field families a [`ForceFieldEngine`] may parameterize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForceFieldFamily {
    /// Organic-chemistry family, parameterized up to krypton.
    Mmff,
    /// Universal family covering the whole element table.
    Uff,
}

impl ForceFieldFamily {
    /// The largest atomic number the family has parameters for.
    pub fn max_atomic_number(&self) -> Option<u8> {
        match self {
            Self::Mmff => Some(36),
            Self::Uff => None,
        }
    }

    pub fn covers(&self, molecule: &Molecule) -> bool {
        self.max_atomic_number()
            .is_none_or(|max| molecule.max_atomic_number() <= max)
    }
}

impl fmt::Display for ForceFieldFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mmff => f.write_str("MMFF"),
            Self::Uff => f.write_str("UFF"),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown force-field family '{0}' (expected MMFF or UFF)")]
pub struct ParseForceFieldFamilyError(pub String);

impl FromStr for ForceFieldFamily {
    type Err = ParseForceFieldFamilyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MMFF" | "MMFF94" => Ok(Self::Mmff),
            "UFF" => Ok(Self::Uff),
            _ => Err(ParseForceFieldFamilyError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum ForceFieldError {
    #[error("Force-field family {0} is not supported by this engine")]
    UnsupportedFamily(ForceFieldFamily),
    #[error("Force-field family {family} has no parameters for element {element}")]
    MissingParameters { family: ForceFieldFamily, element: String },
    #[error("Geometry has {actual} coordinates but the molecule has {expected} atoms")]
    AtomCountMismatch { expected: usize, actual: usize },
}

/// A force field set up for one molecule and one starting geometry.
pub trait ForceField {
    /// Restrains the distance between atoms `i` and `j` to `[lower, upper]`.
    fn add_distance_constraint(&mut self, i: usize, j: usize, lower: f64, upper: f64, weight: f64);

    /// Runs at most `max_iterations` minimizer steps; returns `true` when not yet converged.
    fn minimize(&mut self, max_iterations: usize) -> bool;

    fn energy(&self) -> f64;

    fn positions(&self) -> Geometry;
}

pub trait ForceFieldEngine: Send + Sync {
    fn supports(&self, family: ForceFieldFamily) -> bool;

    fn force_field<'a>(
        &'a self,
        molecule: &'a Molecule,
        family: ForceFieldFamily,
        geometry: &[Point3<f64>],
    ) -> Result<Box<dyn ForceField + 'a>, ForceFieldError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::molecule::MoleculeBuilder;

    #[test]
    fn family_names_parse_case_insensitively() {
        assert_eq!("mmff".parse::<ForceFieldFamily>().unwrap(), ForceFieldFamily::Mmff);
        assert_eq!("MMFF94".parse::<ForceFieldFamily>().unwrap(), ForceFieldFamily::Mmff);
        assert_eq!(" uff ".parse::<ForceFieldFamily>().unwrap(), ForceFieldFamily::Uff);
        assert!("GAFF".parse::<ForceFieldFamily>().is_err());
    }

    #[test]
    fn mmff_does_not_cover_elements_beyond_krypton() {
        let mut builder = MoleculeBuilder::new("pd");
        let c = builder.add_atom(Atom::new(Element::C));
        let pd = builder.add_atom(Atom::new(Element::from_atomic_number(46).unwrap()));
        builder.add_bond(c, pd, Default::default());
        let molecule = builder.build().unwrap();
        assert!(!ForceFieldFamily::Mmff.covers(&molecule));
        assert!(ForceFieldFamily::Uff.covers(&molecule));
    }
}
