use itertools::Itertools;
use nalgebra::Point3;
use std::collections::BTreeMap;

/// Fixed target coordinates for a subset of atoms, used for template-constrained embedding
/// and minimization of metal complexes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnchorMap {
    positions: BTreeMap<usize, Point3<f64>>,
}

impl AnchorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, atom: usize, position: Point3<f64>) -> &mut Self {
        self.positions.insert(atom, position);
        self
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get(&self, atom: usize) -> Option<&Point3<f64>> {
        self.positions.get(&atom)
    }

    /// Anchored atoms in ascending index order.
    pub fn atoms(&self) -> Vec<usize> {
        self.positions.keys().copied().collect()
    }

    /// Anchor positions in the same order as [`AnchorMap::atoms`].
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.positions.values().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Point3<f64>)> {
        self.positions.iter().map(|(&i, p)| (i, p))
    }

    /// Every unordered anchor pair with its target distance.
    pub fn pair_distances(&self) -> Vec<(usize, usize, f64)> {
        self.positions
            .iter()
            .tuple_combinations()
            .map(|((&a, pa), (&b, pb))| (a, b, nalgebra::distance(pa, pb)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_distances_enumerates_each_pair_once() {
        let mut anchors = AnchorMap::new();
        anchors
            .insert(4, Point3::new(0.0, 0.0, 0.0))
            .insert(1, Point3::new(3.0, 0.0, 0.0))
            .insert(7, Point3::new(0.0, 4.0, 0.0));
        let pairs = anchors.pair_distances();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0, 1);
        assert_eq!(pairs[0].1, 4);
        assert!((pairs[0].2 - 3.0).abs() < 1e-12);
        let (_, _, d) = pairs.iter().find(|(a, b, _)| *a == 1 && *b == 7).unwrap();
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn atoms_and_positions_share_order() {
        let mut anchors = AnchorMap::new();
        anchors
            .insert(2, Point3::new(2.0, 0.0, 0.0))
            .insert(0, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(anchors.atoms(), vec![0, 2]);
        assert_eq!(anchors.positions()[1], Point3::new(2.0, 0.0, 0.0));
    }
}
