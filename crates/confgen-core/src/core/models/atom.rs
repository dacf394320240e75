use phf::phf_map;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Per-element reference data indexed by atomic number: symbol, standard atomic mass (u)
/// and single-bond covalent radius (Angstroms).
const ELEMENT_DATA: [(&str, f64, f64); 87] = [
    ("*", 0.0, 0.0),
    ("H", 1.008, 0.31),
    ("He", 4.003, 0.28),
    ("Li", 6.94, 1.28),
    ("Be", 9.012, 0.96),
    ("B", 10.81, 0.84),
    ("C", 12.011, 0.76),
    ("N", 14.007, 0.71),
    ("O", 15.999, 0.66),
    ("F", 18.998, 0.57),
    ("Ne", 20.180, 0.58),
    ("Na", 22.990, 1.66),
    ("Mg", 24.305, 1.41),
    ("Al", 26.982, 1.21),
    ("Si", 28.085, 1.11),
    ("P", 30.974, 1.07),
    ("S", 32.06, 1.05),
    ("Cl", 35.45, 1.02),
    ("Ar", 39.948, 1.06),
    ("K", 39.098, 2.03),
    ("Ca", 40.078, 1.76),
    ("Sc", 44.956, 1.70),
    ("Ti", 47.867, 1.60),
    ("V", 50.942, 1.53),
    ("Cr", 51.996, 1.39),
    ("Mn", 54.938, 1.39),
    ("Fe", 55.845, 1.32),
    ("Co", 58.933, 1.26),
    ("Ni", 58.693, 1.24),
    ("Cu", 63.546, 1.32),
    ("Zn", 65.38, 1.22),
    ("Ga", 69.723, 1.22),
    ("Ge", 72.630, 1.20),
    ("As", 74.922, 1.19),
    ("Se", 78.971, 1.20),
    ("Br", 79.904, 1.20),
    ("Kr", 83.798, 1.16),
    ("Rb", 85.468, 2.20),
    ("Sr", 87.62, 1.95),
    ("Y", 88.906, 1.90),
    ("Zr", 91.224, 1.75),
    ("Nb", 92.906, 1.64),
    ("Mo", 95.95, 1.54),
    ("Tc", 98.0, 1.47),
    ("Ru", 101.07, 1.46),
    ("Rh", 102.906, 1.42),
    ("Pd", 106.42, 1.39),
    ("Ag", 107.868, 1.45),
    ("Cd", 112.414, 1.44),
    ("In", 114.818, 1.42),
    ("Sn", 118.710, 1.39),
    ("Sb", 121.760, 1.39),
    ("Te", 127.60, 1.38),
    ("I", 126.904, 1.39),
    ("Xe", 131.293, 1.40),
    ("Cs", 132.905, 2.44),
    ("Ba", 137.327, 2.15),
    ("La", 138.905, 2.07),
    ("Ce", 140.116, 2.04),
    ("Pr", 140.908, 2.03),
    ("Nd", 144.242, 2.01),
    ("Pm", 145.0, 1.99),
    ("Sm", 150.36, 1.98),
    ("Eu", 151.964, 1.98),
    ("Gd", 157.25, 1.96),
    ("Tb", 158.925, 1.94),
    ("Dy", 162.500, 1.92),
    ("Ho", 164.930, 1.92),
    ("Er", 167.259, 1.89),
    ("Tm", 168.934, 1.90),
    ("Yb", 173.045, 1.87),
    ("Lu", 174.967, 1.87),
    ("Hf", 178.49, 1.75),
    ("Ta", 180.948, 1.70),
    ("W", 183.84, 1.62),
    ("Re", 186.207, 1.51),
    ("Os", 190.23, 1.44),
    ("Ir", 192.217, 1.41),
    ("Pt", 195.084, 1.36),
    ("Au", 196.967, 1.36),
    ("Hg", 200.592, 1.32),
    ("Tl", 204.38, 1.45),
    ("Pb", 207.2, 1.46),
    ("Bi", 208.980, 1.48),
    ("Po", 209.0, 1.40),
    ("At", 210.0, 1.50),
    ("Rn", 222.0, 1.50),
];

static SYMBOL_TO_ATOMIC_NUMBER: phf::Map<&'static str, u8> = phf_map! {
    "H" => 1, "He" => 2, "Li" => 3, "Be" => 4, "B" => 5, "C" => 6, "N" => 7, "O" => 8,
    "F" => 9, "Ne" => 10, "Na" => 11, "Mg" => 12, "Al" => 13, "Si" => 14, "P" => 15,
    "S" => 16, "Cl" => 17, "Ar" => 18, "K" => 19, "Ca" => 20, "Sc" => 21, "Ti" => 22,
    "V" => 23, "Cr" => 24, "Mn" => 25, "Fe" => 26, "Co" => 27, "Ni" => 28, "Cu" => 29,
    "Zn" => 30, "Ga" => 31, "Ge" => 32, "As" => 33, "Se" => 34, "Br" => 35, "Kr" => 36,
    "Rb" => 37, "Sr" => 38, "Y" => 39, "Zr" => 40, "Nb" => 41, "Mo" => 42, "Tc" => 43,
    "Ru" => 44, "Rh" => 45, "Pd" => 46, "Ag" => 47, "Cd" => 48, "In" => 49, "Sn" => 50,
    "Sb" => 51, "Te" => 52, "I" => 53, "Xe" => 54, "Cs" => 55, "Ba" => 56, "La" => 57,
    "Ce" => 58, "Pr" => 59, "Nd" => 60, "Pm" => 61, "Sm" => 62, "Eu" => 63, "Gd" => 64,
    "Tb" => 65, "Dy" => 66, "Ho" => 67, "Er" => 68, "Tm" => 69, "Yb" => 70, "Lu" => 71,
    "Hf" => 72, "Ta" => 73, "W" => 74, "Re" => 75, "Os" => 76, "Ir" => 77, "Pt" => 78,
    "Au" => 79, "Hg" => 80, "Tl" => 81, "Pb" => 82, "Bi" => 83, "Po" => 84, "At" => 85,
    "Rn" => 86,
};

/// A chemical element identified by its atomic number.
///
/// Only elements up to radon are supported; this covers every element the
/// force-field families and the semi-empirical engines can parameterize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ElementError {
    #[error("Unknown element symbol '{0}'")]
    UnknownSymbol(String),
    #[error("Unsupported atomic number {0}")]
    UnsupportedAtomicNumber(u8),
}

impl Element {
    pub const H: Element = Element(1);
    pub const C: Element = Element(6);
    pub const N: Element = Element(7);
    pub const O: Element = Element(8);
    pub const F: Element = Element(9);
    pub const S: Element = Element(16);
    pub const CL: Element = Element(17);
    pub const BR: Element = Element(35);

    pub fn from_atomic_number(z: u8) -> Result<Self, ElementError> {
        if z == 0 || usize::from(z) >= ELEMENT_DATA.len() {
            return Err(ElementError::UnsupportedAtomicNumber(z));
        }
        Ok(Self(z))
    }

    #[inline]
    pub fn atomic_number(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn symbol(&self) -> &'static str {
        ELEMENT_DATA[usize::from(self.0)].0
    }

    #[inline]
    pub fn atomic_mass(&self) -> f64 {
        ELEMENT_DATA[usize::from(self.0)].1
    }

    #[inline]
    pub fn covalent_radius(&self) -> f64 {
        ELEMENT_DATA[usize::from(self.0)].2
    }

    #[inline]
    pub fn is_hydrogen(&self) -> bool {
        self.0 == 1
    }
}

impl FromStr for Element {
    type Err = ElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut chars = trimmed.chars();
        let normalized: String = match chars.next() {
            Some(first) => first
                .to_uppercase()
                .chain(chars.flat_map(char::to_lowercase))
                .collect(),
            None => return Err(ElementError::UnknownSymbol(s.to_string())),
        };
        SYMBOL_TO_ATOMIC_NUMBER
            .get(normalized.as_str())
            .map(|&z| Element(z))
            .ok_or_else(|| ElementError::UnknownSymbol(s.to_string()))
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An atom of a molecular graph.
///
/// Coordinates are deliberately not stored here: geometries live on
/// [`Conformer`](super::conformer::Conformer)s so that many conformers can share one graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// The chemical element.
    pub element: Element,
    /// Formal charge in elementary charge units.
    pub formal_charge: i8,
    /// Hydrogens attached to this atom that are not present as explicit graph atoms.
    pub implicit_hydrogens: u8,
}

impl Atom {
    pub fn new(element: Element) -> Self {
        Self {
            element,
            formal_charge: 0,
            implicit_hydrogens: 0,
        }
    }

    pub fn with_charge(mut self, charge: i8) -> Self {
        self.formal_charge = charge;
        self
    }

    pub fn with_implicit_hydrogens(mut self, count: u8) -> Self {
        self.implicit_hydrogens = count;
        self
    }
}
