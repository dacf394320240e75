use super::atom::{Atom, Element};
use super::topology::{Bond, BondOrder};
use std::collections::{HashSet, VecDeque};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoleculeError {
    #[error("Bond {bond} references atom {atom}, but the molecule has only {atom_count} atoms")]
    AtomIndexOutOfRange {
        bond: usize,
        atom: usize,
        atom_count: usize,
    },
    #[error("Bond {0} connects an atom to itself")]
    SelfBond(usize),
    #[error("Atoms {0} and {1} are bonded more than once")]
    DuplicateBond(usize, usize),
    #[error("Molecule has no atoms")]
    Empty,
}

/// An immutable molecular graph.
///
/// Atoms are addressed by their index in input order; every torsion, anchor map and
/// geometry in the pipeline uses the same indexing. The only post-construction change the
/// graph admits is marking metal centres, which happens before the pipeline starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
    adjacency: Vec<Vec<(usize, usize)>>,
    metal_centers: Vec<usize>,
}

impl Molecule {
    pub fn new(name: &str, atoms: Vec<Atom>, bonds: Vec<Bond>) -> Result<Self, MoleculeError> {
        if atoms.is_empty() {
            return Err(MoleculeError::Empty);
        }
        let mut adjacency = vec![Vec::new(); atoms.len()];
        let mut seen = HashSet::new();
        for (bond_idx, bond) in bonds.iter().enumerate() {
            for atom in [bond.atom1, bond.atom2] {
                if atom >= atoms.len() {
                    return Err(MoleculeError::AtomIndexOutOfRange {
                        bond: bond_idx,
                        atom,
                        atom_count: atoms.len(),
                    });
                }
            }
            if bond.atom1 == bond.atom2 {
                return Err(MoleculeError::SelfBond(bond_idx));
            }
            let key = (bond.atom1.min(bond.atom2), bond.atom1.max(bond.atom2));
            if !seen.insert(key) {
                return Err(MoleculeError::DuplicateBond(key.0, key.1));
            }
            adjacency[bond.atom1].push((bond.atom2, bond_idx));
            adjacency[bond.atom2].push((bond.atom1, bond_idx));
        }
        Ok(Self {
            name: name.to_string(),
            atoms,
            bonds,
            adjacency,
            metal_centers: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atom(&self, index: usize) -> &Atom {
        &self.atoms[index]
    }

    pub fn bonds(&self) -> &[Bond] {
        &self.bonds
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// `(neighbor, bond index)` pairs of an atom, in bond input order.
    pub fn neighbor_bonds(&self, atom: usize) -> &[(usize, usize)] {
        &self.adjacency[atom]
    }

    pub fn neighbors(&self, atom: usize) -> impl Iterator<Item = usize> + '_ {
        self.adjacency[atom].iter().map(|&(n, _)| n)
    }

    pub fn bond_between(&self, a: usize, b: usize) -> Option<&Bond> {
        self.adjacency[a]
            .iter()
            .find(|&&(n, _)| n == b)
            .map(|&(_, bond_idx)| &self.bonds[bond_idx])
    }

    /// Number of explicit graph neighbours.
    pub fn degree(&self, atom: usize) -> usize {
        self.adjacency[atom].len()
    }

    /// Explicit neighbours plus implicit hydrogens.
    pub fn total_degree(&self, atom: usize) -> usize {
        self.degree(atom) + usize::from(self.atoms[atom].implicit_hydrogens)
    }

    pub fn heavy_degree(&self, atom: usize) -> usize {
        self.neighbors(atom).filter(|&n| self.is_heavy(n)).count()
    }

    pub fn hydrogen_count(&self, atom: usize) -> usize {
        let explicit = self
            .neighbors(atom)
            .filter(|&n| self.atoms[n].element.is_hydrogen())
            .count();
        explicit + usize::from(self.atoms[atom].implicit_hydrogens)
    }

    #[inline]
    pub fn is_heavy(&self, atom: usize) -> bool {
        !self.atoms[atom].element.is_hydrogen()
    }

    pub fn heavy_atoms(&self) -> Vec<usize> {
        (0..self.atoms.len()).filter(|&i| self.is_heavy(i)).collect()
    }

    pub fn elements(&self) -> Vec<Element> {
        self.atoms.iter().map(|a| a.element).collect()
    }

    pub fn max_atomic_number(&self) -> u8 {
        self.atoms
            .iter()
            .map(|a| a.element.atomic_number())
            .max()
            .unwrap_or(0)
    }

    pub fn has_bond_of_order(&self, atom: usize, order: BondOrder) -> bool {
        self.adjacency[atom]
            .iter()
            .any(|&(_, b)| self.bonds[b].order == order)
    }

    pub fn is_aromatic(&self, atom: usize) -> bool {
        self.has_bond_of_order(atom, BondOrder::Aromatic)
    }

    pub fn total_formal_charge(&self) -> i32 {
        self.atoms.iter().map(|a| i32::from(a.formal_charge)).sum()
    }

    /// Average molecular weight including implicit hydrogens.
    pub fn molecular_weight(&self) -> f64 {
        let implicit_h: f64 = self
            .atoms
            .iter()
            .map(|a| f64::from(a.implicit_hydrogens))
            .sum();
        self.atoms
            .iter()
            .map(|a| a.element.atomic_mass())
            .sum::<f64>()
            + implicit_h * Element::H.atomic_mass()
    }

    /// Marks every atom whose element is in `metals` as a metal centre.
    pub fn mark_metal_centers(&mut self, metals: &[Element]) {
        self.metal_centers = self
            .atoms
            .iter()
            .enumerate()
            .filter(|(_, a)| metals.contains(&a.element))
            .map(|(i, _)| i)
            .collect();
    }

    pub fn metal_centers(&self) -> &[usize] {
        &self.metal_centers
    }

    pub fn is_metal_complex(&self) -> bool {
        !self.metal_centers.is_empty()
    }

    /// Connected components as sorted atom index lists, in order of their lowest atom.
    pub fn connected_components(&self) -> Vec<Vec<usize>> {
        let mut visited = vec![false; self.atoms.len()];
        let mut components = Vec::new();
        for start in 0..self.atoms.len() {
            if visited[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            visited[start] = true;
            while let Some(atom) = queue.pop_front() {
                component.push(atom);
                for n in self.neighbors(atom) {
                    if !visited[n] {
                        visited[n] = true;
                        queue.push_back(n);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Atoms on the `far` side of the `near`-`far` bond, `far` included.
    ///
    /// Returns `None` when the bond is part of a ring, because then no side can be
    /// rotated independently of the other.
    pub fn side_of_bond(&self, near: usize, far: usize) -> Option<Vec<usize>> {
        let mut visited = vec![false; self.atoms.len()];
        visited[near] = true;
        visited[far] = true;
        let mut side = vec![far];
        let mut stack = vec![far];
        while let Some(atom) = stack.pop() {
            for n in self.neighbors(atom) {
                if n == near && atom != far {
                    return None;
                }
                if !visited[n] {
                    visited[n] = true;
                    side.push(n);
                    stack.push(n);
                }
            }
        }
        side.sort_unstable();
        Some(side)
    }

    /// Extracts the component with the most atoms, dropping counter-ions and solvent.
    ///
    /// Also returns the mapping from new atom indices to the original ones.
    pub fn largest_fragment(&self) -> (Molecule, Vec<usize>) {
        let components = self.connected_components();
        let keep = components
            .into_iter()
            .max_by(|a, b| a.len().cmp(&b.len()).then(b.first().cmp(&a.first())))
            .unwrap_or_default();
        let mut remap = vec![usize::MAX; self.atoms.len()];
        for (new, &old) in keep.iter().enumerate() {
            remap[old] = new;
        }
        let atoms = keep.iter().map(|&i| self.atoms[i].clone()).collect();
        let bonds: Vec<Bond> = self
            .bonds
            .iter()
            .filter(|b| remap[b.atom1] != usize::MAX)
            .map(|b| Bond::new(remap[b.atom1], remap[b.atom2], b.order))
            .collect();
        let metals: Vec<usize> = self
            .metal_centers
            .iter()
            .filter(|&&m| remap[m] != usize::MAX)
            .map(|&m| remap[m])
            .collect();
        let fragment = Molecule {
            name: self.name.clone(),
            adjacency: Self::build_adjacency(keep.len(), &bonds),
            atoms,
            bonds,
            metal_centers: metals,
        };
        (fragment, keep)
    }

    /// Returns a copy in which every implicit hydrogen is an explicit atom.
    ///
    /// New hydrogens are appended after the existing atoms, so existing indices stay valid.
    pub fn with_explicit_hydrogens(&self) -> Molecule {
        let mut atoms = self.atoms.clone();
        let mut bonds = self.bonds.clone();
        for (parent, atom) in self.atoms.iter().enumerate() {
            for _ in 0..atom.implicit_hydrogens {
                atoms.push(Atom::new(Element::H));
                bonds.push(Bond::new(parent, atoms.len() - 1, BondOrder::Single));
            }
            atoms[parent].implicit_hydrogens = 0;
        }
        Molecule {
            name: self.name.clone(),
            adjacency: Self::build_adjacency(atoms.len(), &bonds),
            atoms,
            bonds,
            metal_centers: self.metal_centers.clone(),
        }
    }

    fn build_adjacency(atom_count: usize, bonds: &[Bond]) -> Vec<Vec<(usize, usize)>> {
        let mut adjacency = vec![Vec::new(); atom_count];
        for (idx, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, idx));
            adjacency[bond.atom2].push((bond.atom1, idx));
        }
        adjacency
    }
}

/// Incremental construction of a [`Molecule`].
#[derive(Debug, Default)]
pub struct MoleculeBuilder {
    name: String,
    atoms: Vec<Atom>,
    bonds: Vec<Bond>,
}

impl MoleculeBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn add_atom(&mut self, atom: Atom) -> usize {
        self.atoms.push(atom);
        self.atoms.len() - 1
    }

    pub fn add_bond(&mut self, atom1: usize, atom2: usize, order: BondOrder) -> &mut Self {
        self.bonds.push(Bond::new(atom1, atom2, order));
        self
    }

    pub fn build(self) -> Result<Molecule, MoleculeError> {
        Molecule::new(&self.name, self.atoms, self.bonds)
    }
}
