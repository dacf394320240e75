use super::potentials::{Term, flat_bottom, harmonic, lennard_jones_12_6, periodic_torsion};
use crate::core::engines::forcefield::{
    ForceField, ForceFieldEngine, ForceFieldError, ForceFieldFamily,
};
use crate::core::models::conformer::Geometry;
use crate::core::models::molecule::Molecule;
use crate::core::models::topology::BondOrder;
use crate::core::utils::geometry::dihedral_angle;
use nalgebra::{Point3, Vector3};
use std::collections::VecDeque;
use std::f64::consts::PI;

const ANGLE_FORCE_CONSTANT: f64 = 100.0;
const NONBONDED_WELL_DEPTH: f64 = 0.1;
const VDW_RADIUS_OFFSET: f64 = 0.8;
const ONE_FOUR_SCALE: f64 = 0.5;
const DOUBLE_BOND_BARRIER: f64 = 12.0;
const AROMATIC_BOND_BARRIER: f64 = 6.0;

const GRADIENT_TOLERANCE: f64 = 1e-3;
const INITIAL_STEP: f64 = 0.05;
const MAX_STEP: f64 = 0.3;
const MIN_STEP: f64 = 1e-7;
const FINITE_DIFFERENCE: f64 = 1e-5;

#[derive(Debug, Clone, Copy)]
struct FamilyParameters {
    bond_k: f64,
    torsion_barrier: f64,
    vdw_scale: f64,
}

impl FamilyParameters {
    fn of(family: ForceFieldFamily) -> Self {
        match family {
            ForceFieldFamily::Mmff => Self {
                bond_k: 350.0,
                torsion_barrier: 1.4,
                vdw_scale: 1.0,
            },
            ForceFieldFamily::Uff => Self {
                bond_k: 300.0,
                torsion_barrier: 1.0,
                vdw_scale: 1.05,
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct DistanceTerm {
    i: usize,
    j: usize,
    ideal: f64,
    k: f64,
}

#[derive(Debug, Clone, Copy)]
struct TorsionTerm {
    atoms: [usize; 4],
    barrier: f64,
    periodicity: f64,
    phase: f64,
}

impl TorsionTerm {
    fn energy(&self, positions: &[Point3<f64>]) -> f64 {
        let [a, b, c, d] = self.atoms;
        dihedral_angle(&positions[a], &positions[b], &positions[c], &positions[d])
            .map(|deg| periodic_torsion(deg.to_radians(), self.barrier, self.periodicity, self.phase))
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct NonbondedPair {
    i: usize,
    j: usize,
    r_min: f64,
    scale: f64,
}

#[derive(Debug, Clone, Copy)]
struct Constraint {
    i: usize,
    j: usize,
    lower: f64,
    upper: f64,
    weight: f64,
}

fn bond_order_factor(order: BondOrder) -> f64 {
    match order {
        BondOrder::Single => 1.0,
        BondOrder::Double => 0.87,
        BondOrder::Triple => 0.78,
        BondOrder::Aromatic => 0.91,
    }
}

pub(super) fn ideal_bond_length(molecule: &Molecule, i: usize, j: usize, order: BondOrder) -> f64 {
    (molecule.atom(i).element.covalent_radius() + molecule.atom(j).element.covalent_radius())
        * bond_order_factor(order)
}

/// Ideal valence angle at `center` in degrees, from its bond orders.
fn ideal_angle(molecule: &Molecule, center: usize) -> f64 {
    let orders: Vec<BondOrder> = molecule
        .neighbor_bonds(center)
        .iter()
        .map(|&(_, bond)| molecule.bonds()[bond].order)
        .collect();
    let doubles = orders.iter().filter(|&&o| o == BondOrder::Double).count();
    if orders.contains(&BondOrder::Triple) || doubles >= 2 {
        180.0
    } else if doubles == 1 || orders.contains(&BondOrder::Aromatic) {
        120.0
    } else {
        109.47
    }
}

/// Topological distances from `start`, capped at `limit`.
fn bond_distances(molecule: &Molecule, start: usize, limit: usize) -> Vec<Option<usize>> {
    let mut distance = vec![None; molecule.atom_count()];
    distance[start] = Some(0);
    let mut queue = VecDeque::from([start]);
    while let Some(atom) = queue.pop_front() {
        let Some(d) = distance[atom] else { continue };
        if d == limit {
            continue;
        }
        for n in molecule.neighbors(atom) {
            if distance[n].is_none() {
                distance[n] = Some(d + 1);
                queue.push_back(n);
            }
        }
    }
    distance
}

/// A bond/angle/torsion/Lennard-Jones force field minimized by adaptive steepest descent.
pub struct ValenceForceField {
    positions: Geometry,
    distance_terms: Vec<DistanceTerm>,
    torsion_terms: Vec<TorsionTerm>,
    nonbonded: Vec<NonbondedPair>,
    constraints: Vec<Constraint>,
    step: f64,
}

impl ValenceForceField {
    fn new(molecule: &Molecule, family: ForceFieldFamily, geometry: &[Point3<f64>]) -> Self {
        let params = FamilyParameters::of(family);
        let mut distance_terms = Vec::new();
        for bond in molecule.bonds() {
            distance_terms.push(DistanceTerm {
                i: bond.atom1,
                j: bond.atom2,
                ideal: ideal_bond_length(molecule, bond.atom1, bond.atom2, bond.order),
                k: params.bond_k,
            });
        }

        for center in 0..molecule.atom_count() {
            let theta = ideal_angle(molecule, center).to_radians();
            let arms = molecule.neighbor_bonds(center);
            for (x, &(a, bond_a)) in arms.iter().enumerate() {
                for &(b, bond_b) in &arms[x + 1..] {
                    let ra = ideal_bond_length(molecule, center, a, molecule.bonds()[bond_a].order);
                    let rb = ideal_bond_length(molecule, center, b, molecule.bonds()[bond_b].order);
                    distance_terms.push(DistanceTerm {
                        i: a,
                        j: b,
                        ideal: (ra * ra + rb * rb - 2.0 * ra * rb * theta.cos()).sqrt(),
                        k: ANGLE_FORCE_CONSTANT,
                    });
                }
            }
        }

        let mut torsion_terms = Vec::new();
        for bond in molecule.bonds() {
            let (barrier, periodicity, phase) = match bond.order {
                BondOrder::Single => (params.torsion_barrier, 3.0, 0.0),
                BondOrder::Double => (DOUBLE_BOND_BARRIER, 2.0, PI),
                BondOrder::Aromatic => (AROMATIC_BOND_BARRIER, 2.0, PI),
                BondOrder::Triple => continue,
            };
            let (b, c) = (bond.atom1, bond.atom2);
            for a in molecule.neighbors(b).filter(|&a| a != c) {
                for d in molecule.neighbors(c).filter(|&d| d != b && d != a) {
                    torsion_terms.push(TorsionTerm {
                        atoms: [a, b, c, d],
                        barrier,
                        periodicity,
                        phase,
                    });
                }
            }
        }

        let vdw = |i: usize| {
            (molecule.atom(i).element.covalent_radius() + VDW_RADIUS_OFFSET) * params.vdw_scale
        };
        let mut nonbonded = Vec::new();
        for i in 0..molecule.atom_count() {
            let distances = bond_distances(molecule, i, 3);
            for (j, distance) in distances.iter().enumerate().skip(i + 1) {
                let scale = match distance {
                    Some(d) if *d < 3 => continue,
                    Some(3) => ONE_FOUR_SCALE,
                    _ => 1.0,
                };
                nonbonded.push(NonbondedPair {
                    i,
                    j,
                    r_min: vdw(i) + vdw(j),
                    scale,
                });
            }
        }

        Self {
            positions: geometry.to_vec(),
            distance_terms,
            torsion_terms,
            nonbonded,
            constraints: Vec::new(),
            step: INITIAL_STEP,
        }
    }

    fn evaluate(&self, positions: &[Point3<f64>]) -> (f64, Vec<Vector3<f64>>) {
        let mut energy = 0.0;
        let mut gradient = vec![Vector3::zeros(); positions.len()];
        let mut accumulate = |i: usize, j: usize, term: &dyn Fn(f64) -> Term| {
            let diff = positions[i] - positions[j];
            let r = diff.norm();
            let (e, de) = term(r);
            energy += e;
            if r > 1e-9 {
                let g = diff * (de / r);
                gradient[i] += g;
                gradient[j] -= g;
            }
        };

        for t in &self.distance_terms {
            accumulate(t.i, t.j, &|r| harmonic(r, t.ideal, t.k));
        }
        for c in &self.constraints {
            accumulate(c.i, c.j, &|r| flat_bottom(r, c.lower, c.upper, c.weight));
        }
        for p in &self.nonbonded {
            accumulate(p.i, p.j, &|r| {
                let (e, de) = lennard_jones_12_6(r, p.r_min, NONBONDED_WELL_DEPTH);
                (p.scale * e, p.scale * de)
            });
        }

        let mut displaced = positions.to_vec();
        for t in &self.torsion_terms {
            energy += t.energy(positions);
            for &atom in &t.atoms {
                for axis in 0..3 {
                    let original = displaced[atom][axis];
                    displaced[atom][axis] = original + FINITE_DIFFERENCE;
                    let forward = t.energy(&displaced);
                    displaced[atom][axis] = original - FINITE_DIFFERENCE;
                    let backward = t.energy(&displaced);
                    displaced[atom][axis] = original;
                    gradient[atom][axis] += (forward - backward) / (2.0 * FINITE_DIFFERENCE);
                }
            }
        }
        (energy, gradient)
    }
}

fn max_norm(gradient: &[Vector3<f64>]) -> f64 {
    gradient.iter().map(|g| g.norm()).fold(0.0, f64::max)
}

impl ForceField for ValenceForceField {
    fn add_distance_constraint(&mut self, i: usize, j: usize, lower: f64, upper: f64, weight: f64) {
        self.constraints.push(Constraint {
            i,
            j,
            lower,
            upper,
            weight,
        });
    }

    fn minimize(&mut self, max_iterations: usize) -> bool {
        let (mut energy, mut gradient) = self.evaluate(&self.positions);
        for _ in 0..max_iterations {
            let largest = max_norm(&gradient);
            if largest < GRADIENT_TOLERANCE || self.step < MIN_STEP {
                return false;
            }
            let scale = self.step / largest;
            let trial: Geometry = self
                .positions
                .iter()
                .zip(&gradient)
                .map(|(p, g)| p - g * scale)
                .collect();
            let (trial_energy, trial_gradient) = self.evaluate(&trial);
            if trial_energy < energy {
                self.positions = trial;
                energy = trial_energy;
                gradient = trial_gradient;
                self.step = (self.step * 1.2).min(MAX_STEP);
            } else {
                self.step *= 0.5;
            }
        }
        max_norm(&gradient) >= GRADIENT_TOLERANCE && self.step >= MIN_STEP
    }

    fn energy(&self) -> f64 {
        self.evaluate(&self.positions).0
    }

    fn positions(&self) -> Geometry {
        self.positions.clone()
    }
}

/// Engine handing out [`ValenceForceField`]s for the families it is configured with.
#[derive(Debug, Clone)]
pub struct ValenceForceFieldEngine {
    families: Vec<ForceFieldFamily>,
}

impl Default for ValenceForceFieldEngine {
    fn default() -> Self {
        Self {
            families: vec![ForceFieldFamily::Mmff, ForceFieldFamily::Uff],
        }
    }
}

impl ValenceForceFieldEngine {
    pub fn with_families(families: &[ForceFieldFamily]) -> Self {
        Self {
            families: families.to_vec(),
        }
    }
}

impl ForceFieldEngine for ValenceForceFieldEngine {
    fn supports(&self, family: ForceFieldFamily) -> bool {
        self.families.contains(&family)
    }

    fn force_field<'a>(
        &'a self,
        molecule: &'a Molecule,
        family: ForceFieldFamily,
        geometry: &[Point3<f64>],
    ) -> Result<Box<dyn ForceField + 'a>, ForceFieldError> {
        if !self.supports(family) {
            return Err(ForceFieldError::UnsupportedFamily(family));
        }
        if let Some(max) = family.max_atomic_number() {
            if let Some(atom) = molecule
                .atoms()
                .iter()
                .find(|a| a.element.atomic_number() > max)
            {
                return Err(ForceFieldError::MissingParameters {
                    family,
                    element: atom.element.symbol().to_string(),
                });
            }
        }
        if geometry.len() != molecule.atom_count() {
            return Err(ForceFieldError::AtomCountMismatch {
                expected: molecule.atom_count(),
                actual: geometry.len(),
            });
        }
        Ok(Box::new(ValenceForceField::new(molecule, family, geometry)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::molecule::MoleculeBuilder;
    use crate::testing;

    fn diatomic() -> Molecule {
        let mut builder = MoleculeBuilder::new("c2");
        let a = builder.add_atom(Atom::new(Element::C));
        let b = builder.add_atom(Atom::new(Element::C));
        builder.add_bond(a, b, BondOrder::Single);
        builder.build().unwrap()
    }

    #[test]
    fn minimization_relaxes_a_stretched_bond_to_its_ideal_length() {
        let molecule = diatomic();
        let engine = ValenceForceFieldEngine::default();
        let start = vec![Point3::origin(), Point3::new(2.2, 0.0, 0.0)];
        let mut ff = engine
            .force_field(&molecule, ForceFieldFamily::Mmff, &start)
            .unwrap();
        let before = ff.energy();
        let more_to_do = ff.minimize(1000);
        let positions = ff.positions();
        assert!(!more_to_do);
        assert!(ff.energy() < before);
        assert!(((positions[1] - positions[0]).norm() - 1.52).abs() < 1e-3);
    }

    #[test]
    fn distance_constraints_hold_atoms_at_the_requested_separation() {
        let molecule = diatomic();
        let engine = ValenceForceFieldEngine::default();
        let start = vec![Point3::origin(), Point3::new(2.2, 0.0, 0.0)];
        let mut ff = engine
            .force_field(&molecule, ForceFieldFamily::Uff, &start)
            .unwrap();
        ff.add_distance_constraint(0, 1, 2.0, 2.0, 10_000.0);
        ff.minimize(1000);
        let positions = ff.positions();
        assert!(((positions[1] - positions[0]).norm() - 2.0).abs() < 0.02);
    }

    #[test]
    fn analytic_gradient_matches_finite_difference_of_the_energy() {
        let molecule = testing::pentane();
        let engine = ValenceForceFieldEngine::default();
        let mut geometry = testing::pentane_geometry();
        geometry[4].z += 0.7;
        let ff = ValenceForceField::new(&molecule, ForceFieldFamily::Mmff, &geometry);
        let (_, gradient) = ff.evaluate(&geometry);
        let h = 1e-6;
        for atom in [0, 2, 4] {
            for axis in 0..3 {
                let mut forward = geometry.clone();
                forward[atom][axis] += h;
                let mut backward = geometry.clone();
                backward[atom][axis] -= h;
                let numeric = (ff.evaluate(&forward).0 - ff.evaluate(&backward).0) / (2.0 * h);
                assert!(
                    (numeric - gradient[atom][axis]).abs() < 1e-3 * numeric.abs().max(1.0),
                    "atom {atom} axis {axis}: {numeric} vs {}",
                    gradient[atom][axis]
                );
            }
        }
        assert!(engine.supports(ForceFieldFamily::Mmff));
    }

    #[test]
    fn mmff_refuses_elements_beyond_its_range() {
        let mut builder = MoleculeBuilder::new("pd");
        let c = builder.add_atom(Atom::new(Element::C));
        let pd = builder.add_atom(Atom::new(Element::from_atomic_number(46).unwrap()));
        builder.add_bond(c, pd, BondOrder::Single);
        let molecule = builder.build().unwrap();
        let geometry = vec![Point3::origin(), Point3::new(2.0, 0.0, 0.0)];
        let engine = ValenceForceFieldEngine::default();

        let result = engine.force_field(&molecule, ForceFieldFamily::Mmff, &geometry);
        assert!(matches!(
            result,
            Err(ForceFieldError::MissingParameters { ref element, .. }) if element == "Pd"
        ));
        assert!(engine.force_field(&molecule, ForceFieldFamily::Uff, &geometry).is_ok());
    }

    #[test]
    fn engine_rejects_families_it_was_not_configured_with() {
        let engine = ValenceForceFieldEngine::with_families(&[ForceFieldFamily::Uff]);
        let molecule = diatomic();
        let geometry = vec![Point3::origin(), Point3::new(1.5, 0.0, 0.0)];
        assert!(!engine.supports(ForceFieldFamily::Mmff));
        assert!(matches!(
            engine.force_field(&molecule, ForceFieldFamily::Mmff, &geometry),
            Err(ForceFieldError::UnsupportedFamily(ForceFieldFamily::Mmff))
        ));
    }
}
