use crate::core::models::molecule::Molecule;
use std::collections::VecDeque;

/// Enumerates symmetry-equivalent atom mappings of the subgraph induced by `atoms`.
///
/// Each mapping lists, for every entry of `atoms`, the atom it is mapped onto. Mappings
/// preserve element, degree within the subgraph and bond orders. The identity mapping is
/// always the first result, and at most `max_matches` mappings are produced.
pub fn automorphisms(molecule: &Molecule, atoms: &[usize], max_matches: usize) -> Vec<Vec<usize>> {
    if atoms.is_empty() || max_matches == 0 {
        return Vec::new();
    }
    let search = Search::new(molecule, atoms);
    let mut results = Vec::new();
    let mut image = vec![usize::MAX; molecule.atom_count()];
    let mut used = vec![false; molecule.atom_count()];
    search.extend(0, &mut image, &mut used, &mut results, max_matches);
    results
        .into_iter()
        .map(|full| atoms.iter().map(|&a| full[a]).collect())
        .collect()
}

struct Search<'a> {
    molecule: &'a Molecule,
    in_subset: Vec<bool>,
    subset: &'a [usize],
    order: Vec<usize>,
    subset_degree: Vec<usize>,
}

impl<'a> Search<'a> {
    fn new(molecule: &'a Molecule, subset: &'a [usize]) -> Self {
        let mut in_subset = vec![false; molecule.atom_count()];
        for &a in subset {
            in_subset[a] = true;
        }
        let subset_degree = (0..molecule.atom_count())
            .map(|a| molecule.neighbors(a).filter(|&n| in_subset[n]).count())
            .collect();

        // Breadth-first order keeps every atom after at least one mapped neighbour
        // whenever its component allows it, which prunes candidates early.
        let mut order = Vec::with_capacity(subset.len());
        let mut queued = vec![false; molecule.atom_count()];
        for &root in subset {
            if queued[root] {
                continue;
            }
            queued[root] = true;
            let mut queue = VecDeque::from([root]);
            while let Some(atom) = queue.pop_front() {
                order.push(atom);
                for n in molecule.neighbors(atom) {
                    if in_subset[n] && !queued[n] {
                        queued[n] = true;
                        queue.push_back(n);
                    }
                }
            }
        }

        Self {
            molecule,
            in_subset,
            subset,
            order,
            subset_degree,
        }
    }

    fn extend(
        &self,
        depth: usize,
        image: &mut [usize],
        used: &mut [bool],
        results: &mut Vec<Vec<usize>>,
        max_matches: usize,
    ) {
        if results.len() >= max_matches {
            return;
        }
        if depth == self.order.len() {
            results.push(image.to_vec());
            return;
        }
        let atom = self.order[depth];
        for candidate in self.candidates(atom, image) {
            if used[candidate] || !self.compatible(atom, candidate, image) {
                continue;
            }
            image[atom] = candidate;
            used[candidate] = true;
            self.extend(depth + 1, image, used, results, max_matches);
            used[candidate] = false;
            image[atom] = usize::MAX;
            if results.len() >= max_matches {
                return;
            }
        }
    }

    /// Candidate images for `atom`, with `atom` itself first.
    fn candidates(&self, atom: usize, image: &[usize]) -> Vec<usize> {
        let mapped_neighbor = self
            .molecule
            .neighbors(atom)
            .find(|&n| self.in_subset[n] && image[n] != usize::MAX);
        let mut pool: Vec<usize> = match mapped_neighbor {
            Some(n) => self
                .molecule
                .neighbors(image[n])
                .filter(|&c| self.in_subset[c])
                .collect(),
            None => self.subset.to_vec(),
        };
        if let Some(pos) = pool.iter().position(|&c| c == atom) {
            pool.swap(0, pos);
            pool[1..].sort_unstable();
        }
        pool
    }

    fn compatible(&self, atom: usize, candidate: usize, image: &[usize]) -> bool {
        let mol = self.molecule;
        if mol.atom(atom).element != mol.atom(candidate).element
            || self.subset_degree[atom] != self.subset_degree[candidate]
        {
            return false;
        }
        mol.neighbor_bonds(atom).iter().all(|&(n, bond_idx)| {
            if !self.in_subset[n] || image[n] == usize::MAX {
                return true;
            }
            match mol.bond_between(candidate, image[n]) {
                Some(bond) => bond.order == mol.bonds()[bond_idx].order,
                None => false,
            }
        })
    }
}
