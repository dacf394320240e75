use crate::core::models::conformer::Geometry;
use crate::core::models::molecule::Molecule;
use crate::core::models::torsion::Torsion;
use nalgebra::{Matrix3, Point3, Rotation3, Unit, Vector3};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("Bond {0}-{1} is part of a ring; its dihedral cannot be set independently")]
    RingBond(usize, usize),
    #[error("Dihedral {0} is undefined because three of its atoms are collinear")]
    DegenerateDihedral(Torsion),
    #[error("Geometry has {actual} coordinates but the molecule has {expected} atoms")]
    AtomCountMismatch { expected: usize, actual: usize },
}

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

/// Signed dihedral angle `p0-p1-p2-p3` in degrees, in `(-180, 180]`.
pub fn dihedral_angle(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
) -> Option<f64> {
    let b1 = p1 - p0;
    let b2 = p2 - p1;
    let b3 = p3 - p2;
    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    if n1.norm_squared() < 1e-12 || n2.norm_squared() < 1e-12 {
        return None;
    }
    let y = b2.norm() * b1.dot(&n2);
    let x = n1.dot(&n2);
    Some(y.atan2(x).to_degrees())
}

pub fn measure_torsion(geometry: &[Point3<f64>], torsion: &Torsion) -> Option<f64> {
    let [a, b, c, d] = torsion.atoms;
    dihedral_angle(&geometry[a], &geometry[b], &geometry[c], &geometry[d])
}

/// Returns a copy of `geometry` in which `torsion` measures `degrees`.
///
/// The atoms on the `c` side of the `b-c` bond are rotated rigidly about the bond axis; the
/// `b` side stays fixed.
pub fn set_dihedral(
    molecule: &Molecule,
    geometry: &[Point3<f64>],
    torsion: &Torsion,
    degrees: f64,
) -> Result<Geometry, GeometryError> {
    if geometry.len() != molecule.atom_count() {
        return Err(GeometryError::AtomCountMismatch {
            expected: molecule.atom_count(),
            actual: geometry.len(),
        });
    }
    let (b, c) = torsion.axis();
    let current =
        measure_torsion(geometry, torsion).ok_or(GeometryError::DegenerateDihedral(*torsion))?;
    let moving = molecule
        .side_of_bond(b, c)
        .ok_or(GeometryError::RingBond(b, c))?;

    let pivot = geometry[c];
    let rotation = rotation_from_axis_angle(&(geometry[c] - geometry[b]), degrees - current);
    let mut rotated = geometry.to_vec();
    for atom in moving {
        rotated[atom] = pivot + rotation * (geometry[atom] - pivot);
    }
    Ok(rotated)
}

pub fn centroid(points: &[Point3<f64>]) -> Point3<f64> {
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Point3::from(sum / points.len().max(1) as f64)
}

/// A proper rigid-body transform that maps a mobile point set onto a target set.
#[derive(Debug, Clone, PartialEq)]
pub struct Superposition {
    pub rotation: Matrix3<f64>,
    pub mobile_centroid: Point3<f64>,
    pub target_centroid: Point3<f64>,
}

impl Superposition {
    #[inline]
    pub fn apply(&self, point: &Point3<f64>) -> Point3<f64> {
        self.target_centroid + self.rotation * (point - self.mobile_centroid)
    }

    pub fn apply_all(&self, points: &[Point3<f64>]) -> Geometry {
        points.iter().map(|p| self.apply(p)).collect()
    }
}

/// Least-squares superposition (Kabsch) of `mobile` onto `target`, excluding reflections.
pub fn kabsch(mobile: &[Point3<f64>], target: &[Point3<f64>]) -> Option<Superposition> {
    if mobile.len() != target.len() || mobile.is_empty() {
        return None;
    }
    let mobile_centroid = centroid(mobile);
    let target_centroid = centroid(target);
    let covariance = mobile
        .iter()
        .zip(target)
        .fold(Matrix3::zeros(), |acc, (m, t)| {
            acc + (m - mobile_centroid) * (t - target_centroid).transpose()
        });

    let svd = covariance.svd(true, true);
    let u = svd.u?;
    let v = svd.v_t?.transpose();
    let mut correction = Matrix3::identity();
    if (v * u.transpose()).determinant() < 0.0 {
        correction[(2, 2)] = -1.0;
    }
    Some(Superposition {
        rotation: v * correction * u.transpose(),
        mobile_centroid,
        target_centroid,
    })
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// RMSD after optimal superposition of `mobile` onto `target`.
pub fn best_fit_rmsd(mobile: &[Point3<f64>], target: &[Point3<f64>]) -> Option<f64> {
    let fit = kabsch(mobile, target)?;
    calculate_rmsd(&fit.apply_all(mobile), target)
}

/// Moves a whole geometry so that the atoms in `subset` best overlay `targets`.
pub fn align_subset(
    geometry: &[Point3<f64>],
    subset: &[usize],
    targets: &[Point3<f64>],
) -> Option<Geometry> {
    let mobile: Vec<_> = subset.iter().map(|&i| geometry[i]).collect();
    let fit = kabsch(&mobile, targets)?;
    Some(fit.apply_all(geometry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::molecule::MoleculeBuilder;
    use crate::core::models::topology::BondOrder;

    const TOLERANCE: f64 = 1e-9;

    fn butane() -> (Molecule, Geometry) {
        let mut builder = MoleculeBuilder::new("butane");
        for _ in 0..4 {
            builder.add_atom(Atom::new(Element::C));
        }
        builder
            .add_bond(0, 1, BondOrder::Single)
            .add_bond(1, 2, BondOrder::Single)
            .add_bond(2, 3, BondOrder::Single);
        let geometry = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 1.5),
            Point3::new(-1.0, 0.0, 1.5),
        ];
        (builder.build().unwrap(), geometry)
    }

    fn sample_points() -> Geometry {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(2.0, 1.4, 0.0),
            Point3::new(3.5, 1.4, 0.3),
            Point3::new(4.0, 2.8, -0.6),
        ]
    }

    #[test]
    fn dihedral_angle_of_trans_chain_is_180() {
        let (_, geometry) = butane();
        let angle = dihedral_angle(&geometry[0], &geometry[1], &geometry[2], &geometry[3]).unwrap();
        assert!((angle.abs() - 180.0).abs() < TOLERANCE);
    }

    #[test]
    fn dihedral_angle_is_none_for_collinear_atoms() {
        let p = |x: f64| Point3::new(x, 0.0, 0.0);
        assert!(dihedral_angle(&p(0.0), &p(1.0), &p(2.0), &Point3::new(3.0, 1.0, 0.0)).is_none());
    }

    #[test]
    fn set_dihedral_reaches_target_and_leaves_input_untouched() {
        let (mol, geometry) = butane();
        let torsion = Torsion::new(0, 1, 2, 3);
        for target in [0.0, 60.0, -120.0, 90.0] {
            let rotated = set_dihedral(&mol, &geometry, &torsion, target).unwrap();
            let measured = measure_torsion(&rotated, &torsion).unwrap();
            let diff = (measured - target + 540.0).rem_euclid(360.0) - 180.0;
            assert!(diff.abs() < 1e-6, "target {target}, measured {measured}");
            assert_eq!(rotated[0], geometry[0]);
            assert_eq!(rotated[1], geometry[1]);
            assert_eq!(rotated[2], geometry[2]);
        }
        assert_eq!(geometry[3], Point3::new(-1.0, 0.0, 1.5));
    }

    #[test]
    fn set_dihedral_preserves_bond_lengths() {
        let (mol, geometry) = butane();
        let rotated = set_dihedral(&mol, &geometry, &Torsion::new(0, 1, 2, 3), 60.0).unwrap();
        let before = nalgebra::distance(&geometry[2], &geometry[3]);
        let after = nalgebra::distance(&rotated[2], &rotated[3]);
        assert!((before - after).abs() < TOLERANCE);
    }

    #[test]
    fn set_dihedral_rejects_wrong_geometry_length() {
        let (mol, geometry) = butane();
        let result = set_dihedral(&mol, &geometry[..3], &Torsion::new(0, 1, 2, 3), 0.0);
        assert!(matches!(
            result,
            Err(GeometryError::AtomCountMismatch {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn kabsch_recovers_rigid_motion() {
        let target = sample_points();
        let rotation = rotation_from_axis_angle(&Vector3::new(0.3, -1.0, 0.5), 73.0);
        let shift = Vector3::new(4.0, -2.0, 7.5);
        let mobile: Geometry = target.iter().map(|p| rotation * p + shift).collect();
        let rmsd = best_fit_rmsd(&mobile, &target).unwrap();
        assert!(rmsd < 1e-6, "rmsd was {rmsd}");
    }

    #[test]
    fn kabsch_does_not_reflect_mirror_images() {
        let target = sample_points();
        let mirrored: Geometry = target.iter().map(|p| Point3::new(p.x, p.y, -p.z)).collect();
        let rmsd = best_fit_rmsd(&mirrored, &target).unwrap();
        assert!(rmsd > 1e-3);
    }

    #[test]
    fn calculate_rmsd_handles_mismatched_inputs() {
        assert!(calculate_rmsd(&[], &[]).is_none());
        assert!(calculate_rmsd(&[Point3::origin()], &[]).is_none());
        let a = [Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)];
        let b = [Point3::new(3.0, 0.0, 0.0), Point3::new(0.0, 4.0, 0.0)];
        assert!((calculate_rmsd(&a, &b).unwrap() - (12.5f64).sqrt()).abs() < TOLERANCE);
    }

    #[test]
    fn align_subset_moves_whole_geometry_onto_targets() {
        let geometry = sample_points();
        let shift = Vector3::new(10.0, 0.0, 0.0);
        let targets: Vec<_> = [0, 1, 2].iter().map(|&i| geometry[i] + shift).collect();
        let aligned = align_subset(&geometry, &[0, 1, 2], &targets).unwrap();
        for (p, q) in aligned.iter().zip(&geometry) {
            assert!(((p - q) - shift).norm() < 1e-6);
        }
    }
}
