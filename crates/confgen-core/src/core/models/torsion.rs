use std::fmt;

/// A dihedral defined by four bonded atom indices `a-b-c-d`; rotation happens about `b-c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Torsion {
    pub atoms: [usize; 4],
}

impl Torsion {
    pub fn new(a: usize, b: usize, c: usize, d: usize) -> Self {
        Self {
            atoms: [a, b, c, d],
        }
    }

    /// The central bond as `(b, c)`.
    #[inline]
    pub fn axis(&self) -> (usize, usize) {
        (self.atoms[1], self.atoms[2])
    }
}

impl fmt::Display for Torsion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.atoms;
        write!(f, "{a}-{b}-{c}-{d}")
    }
}

/// The ordered rotatable torsions of one molecule.
///
/// The order is fixed for a pipeline run and defines the recursion order of the torsion
/// enumerator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotatableBondSet {
    torsions: Vec<Torsion>,
}

impl RotatableBondSet {
    pub fn new(torsions: Vec<Torsion>) -> Self {
        Self { torsions }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.torsions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.torsions.is_empty()
    }

    pub fn as_slice(&self) -> &[Torsion] {
        &self.torsions
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Torsion> {
        self.torsions.iter()
    }
}

impl<'a> IntoIterator for &'a RotatableBondSet {
    type Item = &'a Torsion;
    type IntoIter = std::slice::Iter<'a, Torsion>;

    fn into_iter(self) -> Self::IntoIter {
        self.torsions.iter()
    }
}
