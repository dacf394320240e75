use super::rings::RingInfo;
use crate::core::models::atom::Element;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use crate::core::models::torsion::{RotatableBondSet, Torsion};

/// Whether a bond counts as rotatable.
///
/// A rotatable bond is an acyclic single bond between two atoms that each carry at least
/// one other substituent (implicit hydrogens included). Bonds are excluded when either end
/// takes part in a triple bond, is a trihalomethyl or tert-butyl centre, or when the bond is
/// the C-X link of an amide, ester or thioester-like group.
pub fn is_rotatable_bond(molecule: &Molecule, rings: &RingInfo, bond_idx: usize) -> bool {
    let bond = &molecule.bonds()[bond_idx];
    if bond.order != BondOrder::Single || rings.is_ring_bond(bond_idx) {
        return false;
    }
    let (b, c) = (bond.atom1, bond.atom2);
    [b, c].into_iter().all(|atom| {
        molecule.total_degree(atom) > 1
            && !molecule.has_bond_of_order(atom, BondOrder::Triple)
            && !is_trihalomethyl(molecule, atom)
            && !is_tert_butyl_center(molecule, atom)
    }) && !is_carbonyl_heteroatom_link(molecule, b, c)
        && !is_carbonyl_heteroatom_link(molecule, c, b)
}

/// Detects the rotatable torsions of a molecule, one per rotatable bond, ordered by bond index.
///
/// The outer atoms of each torsion are the first heavy neighbours of the bond ends. With
/// `heavy_only` a bond whose end has no heavy neighbour is skipped; otherwise a hydrogen may
/// be used, except on carbon where a hydrogen terminal would describe a methyl-type rotor.
pub fn find_rotatable_torsions(
    molecule: &Molecule,
    rings: &RingInfo,
    heavy_only: bool,
) -> RotatableBondSet {
    let torsions = molecule
        .bonds()
        .iter()
        .enumerate()
        .filter(|(idx, _)| is_rotatable_bond(molecule, rings, *idx))
        .filter_map(|(_, bond)| {
            let (b, c) = (bond.atom1, bond.atom2);
            let a = terminal_atom(molecule, b, c, heavy_only)?;
            let d = terminal_atom(molecule, c, b, heavy_only)?;
            Some(Torsion::new(a, b, c, d))
        })
        .collect();
    RotatableBondSet::new(torsions)
}

fn terminal_atom(molecule: &Molecule, center: usize, across: usize, heavy_only: bool) -> Option<usize> {
    let mut hydrogen = None;
    for n in molecule.neighbors(center).filter(|&n| n != across) {
        if molecule.is_heavy(n) {
            return Some(n);
        }
        hydrogen.get_or_insert(n);
    }
    if heavy_only || molecule.atom(center).element == Element::C {
        None
    } else {
        hydrogen
    }
}

fn is_trihalomethyl(molecule: &Molecule, atom: usize) -> bool {
    if molecule.atom(atom).element != Element::C {
        return false;
    }
    [Element::F, Element::CL, Element::BR].into_iter().any(|halogen| {
        molecule
            .neighbors(atom)
            .filter(|&n| molecule.atom(n).element == halogen)
            .count()
            >= 3
    })
}

fn is_methyl(molecule: &Molecule, atom: usize) -> bool {
    molecule.atom(atom).element == Element::C && molecule.hydrogen_count(atom) == 3
}

fn is_tert_butyl_center(molecule: &Molecule, atom: usize) -> bool {
    molecule.atom(atom).element == Element::C
        && molecule
            .neighbors(atom)
            .filter(|&n| is_methyl(molecule, n))
            .count()
            >= 3
}

fn is_carbonyl_heteroatom_link(molecule: &Molecule, carbon: usize, other: usize) -> bool {
    let is_heteroatom = |atom: usize| {
        matches!(molecule.atom(atom).element, Element::N | Element::O | Element::S)
    };
    if molecule.atom(carbon).element != Element::C || molecule.total_degree(carbon) != 3 {
        return false;
    }
    let double_to_heteroatom = molecule.neighbor_bonds(carbon).iter().any(|&(n, b)| {
        molecule.bonds()[b].order == BondOrder::Double && is_heteroatom(n)
    });
    double_to_heteroatom && is_heteroatom(other) && molecule.total_degree(other) > 1
}
