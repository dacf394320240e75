use crate::core::models::molecule::Molecule;
use std::collections::{HashSet, VecDeque};

/// A ring of the smallest set of smallest rings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ring {
    /// Atoms in ring traversal order.
    pub atoms: Vec<usize>,
    /// Bond indices, sorted.
    pub bonds: Vec<usize>,
}

impl Ring {
    pub fn size(&self) -> usize {
        self.atoms.len()
    }
}

/// Ring perception results for one molecule.
#[derive(Debug, Clone, Default)]
pub struct RingInfo {
    rings: Vec<Ring>,
    ring_bonds: Vec<bool>,
    ring_atoms: Vec<bool>,
}

impl RingInfo {
    /// Perceives the smallest set of smallest rings.
    ///
    /// For every bond the shortest cycle through it is found by breadth-first search with
    /// that bond removed; the candidate cycles are then taken in order of size as long as
    /// they stay linearly independent over GF(2) until the cycle rank is reached.
    pub fn perceive(molecule: &Molecule) -> Self {
        let bond_count = molecule.bonds().len();
        let mut ring_bonds = vec![false; bond_count];
        let mut ring_atoms = vec![false; molecule.atom_count()];
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for (bond_idx, bond) in molecule.bonds().iter().enumerate() {
            let Some(ring) = shortest_cycle_through(molecule, bond_idx, bond.atom1, bond.atom2)
            else {
                continue;
            };
            ring_bonds[bond_idx] = true;
            if seen.insert(ring.bonds.clone()) {
                candidates.push(ring);
            }
        }
        for ring in &candidates {
            for &atom in &ring.atoms {
                ring_atoms[atom] = true;
            }
        }

        let cycle_rank =
            (bond_count + molecule.connected_components().len()).saturating_sub(molecule.atom_count());
        candidates.sort_by(|a, b| a.size().cmp(&b.size()).then_with(|| a.bonds.cmp(&b.bonds)));

        let mut basis = CycleBasis::new(bond_count);
        let mut rings = Vec::with_capacity(cycle_rank);
        for ring in candidates {
            if rings.len() == cycle_rank {
                break;
            }
            if basis.try_insert(&ring.bonds) {
                rings.push(ring);
            }
        }

        Self {
            rings,
            ring_bonds,
            ring_atoms,
        }
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }

    pub fn ring_count(&self) -> usize {
        self.rings.len()
    }

    pub fn is_ring_bond(&self, bond: usize) -> bool {
        self.ring_bonds.get(bond).copied().unwrap_or(false)
    }

    pub fn is_ring_atom(&self, atom: usize) -> bool {
        self.ring_atoms.get(atom).copied().unwrap_or(false)
    }
}

fn shortest_cycle_through(
    molecule: &Molecule,
    excluded_bond: usize,
    start: usize,
    goal: usize,
) -> Option<Ring> {
    let mut parent: Vec<Option<(usize, usize)>> = vec![None; molecule.atom_count()];
    let mut visited = vec![false; molecule.atom_count()];
    visited[start] = true;
    let mut queue = VecDeque::from([start]);

    while let Some(atom) = queue.pop_front() {
        if atom == goal {
            break;
        }
        for &(next, bond_idx) in molecule.neighbor_bonds(atom) {
            if bond_idx == excluded_bond || visited[next] {
                continue;
            }
            visited[next] = true;
            parent[next] = Some((atom, bond_idx));
            queue.push_back(next);
        }
    }
    if !visited[goal] {
        return None;
    }

    let mut atoms = vec![goal];
    let mut bonds = vec![excluded_bond];
    let mut cursor = goal;
    while let Some((prev, bond_idx)) = parent[cursor] {
        atoms.push(prev);
        bonds.push(bond_idx);
        cursor = prev;
    }
    bonds.sort_unstable();
    Some(Ring { atoms, bonds })
}

/// Incremental GF(2) row echelon basis over bond-incidence vectors.
struct CycleBasis {
    words: usize,
    rows: Vec<(usize, Vec<u64>)>,
}

impl CycleBasis {
    fn new(bond_count: usize) -> Self {
        Self {
            words: bond_count.div_ceil(64).max(1),
            rows: Vec::new(),
        }
    }

    fn try_insert(&mut self, bonds: &[usize]) -> bool {
        let mut vector = vec![0u64; self.words];
        for &b in bonds {
            vector[b / 64] ^= 1u64 << (b % 64);
        }
        // Rows are kept sorted by pivot, and every row is zero below its pivot.
        for (pivot, row) in &self.rows {
            if vector[pivot / 64] & (1u64 << (pivot % 64)) != 0 {
                for (v, r) in vector.iter_mut().zip(row) {
                    *v ^= r;
                }
            }
        }
        let Some(pivot) = lowest_set_bit(&vector) else {
            return false;
        };
        let position = self.rows.partition_point(|(p, _)| *p < pivot);
        self.rows.insert(position, (pivot, vector));
        true
    }
}

fn lowest_set_bit(vector: &[u64]) -> Option<usize> {
    vector
        .iter()
        .enumerate()
        .find(|(_, w)| **w != 0)
        .map(|(i, w)| i * 64 + w.trailing_zeros() as usize)
}
