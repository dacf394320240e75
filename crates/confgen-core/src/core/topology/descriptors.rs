use super::rings::RingInfo;
use super::rotatable::is_rotatable_bond;
use crate::core::models::atom::Element;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;

/// Graph descriptors that drive the initial sample-count estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MolecularDescriptors {
    pub rotatable_bonds: usize,
    /// Hydrogens attached to nitrogen or oxygen.
    pub polar_hydrogens: usize,
    /// Rings made only of single bonds.
    pub saturated_rings: usize,
}

impl MolecularDescriptors {
    pub fn compute(molecule: &Molecule) -> Self {
        let rings = RingInfo::perceive(molecule);
        Self::compute_with_rings(molecule, &rings)
    }

    pub fn compute_with_rings(molecule: &Molecule, rings: &RingInfo) -> Self {
        let rotatable_bonds = (0..molecule.bonds().len())
            .filter(|&b| is_rotatable_bond(molecule, rings, b))
            .count();
        let polar_hydrogens = (0..molecule.atom_count())
            .filter(|&i| matches!(molecule.atom(i).element, Element::N | Element::O))
            .map(|i| molecule.hydrogen_count(i))
            .sum();
        let saturated_rings = rings
            .rings()
            .iter()
            .filter(|ring| {
                ring.bonds
                    .iter()
                    .all(|&b| molecule.bonds()[b].order == BondOrder::Single)
            })
            .count();
        Self {
            rotatable_bonds,
            polar_hydrogens,
            saturated_rings,
        }
    }
}
