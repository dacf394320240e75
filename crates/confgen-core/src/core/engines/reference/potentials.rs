/// Energy and its derivative with respect to distance.
pub type Term = (f64, f64);

#[inline]
pub fn harmonic(dist: f64, ideal: f64, k: f64) -> Term {
    let delta = dist - ideal;
    (k * delta * delta, 2.0 * k * delta)
}

/// Harmonic outside `[lower, upper]`, zero inside.
#[inline]
pub fn flat_bottom(dist: f64, lower: f64, upper: f64, k: f64) -> Term {
    if dist < lower {
        harmonic(dist, lower, k)
    } else if dist > upper {
        harmonic(dist, upper, k)
    } else {
        (0.0, 0.0)
    }
}

#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> Term {
    if dist < 1e-6 {
        return (1e10, 0.0);
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    (
        well_depth * (rho12 - 2.0 * rho6),
        12.0 * well_depth * (rho6 - rho12) / dist,
    )
}

/// Cosine torsion `V/2 * (1 + cos(n*phi - phase))`, angles in radians.
#[inline]
pub fn periodic_torsion(phi: f64, barrier: f64, periodicity: f64, phase: f64) -> f64 {
    0.5 * barrier * (1.0 + (periodicity * phi - phase).cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    #[test]
    fn lennard_jones_at_minimum_distance_returns_negative_well_depth_and_zero_force() {
        let (energy, derivative) = lennard_jones_12_6(2.0, 2.0, 10.0);
        assert!(f64_approx_equal(energy, -10.0));
        assert!(f64_approx_equal(derivative, 0.0));
    }

    #[test]
    fn lennard_jones_at_very_small_distance_returns_large_positive_energy() {
        let (energy, _) = lennard_jones_12_6(1e-7, 2.0, 10.0);
        assert!(f64_approx_equal(energy, 1e10));
    }

    #[test]
    fn lennard_jones_derivative_matches_finite_difference() {
        let h = 1e-6;
        let (_, analytic) = lennard_jones_12_6(2.3, 2.0, 0.5);
        let numeric = (lennard_jones_12_6(2.3 + h, 2.0, 0.5).0
            - lennard_jones_12_6(2.3 - h, 2.0, 0.5).0)
            / (2.0 * h);
        assert!((analytic - numeric).abs() < 1e-6);
    }

    #[test]
    fn flat_bottom_is_zero_inside_the_window() {
        assert_eq!(flat_bottom(1.5, 1.4, 1.6, 100.0), (0.0, 0.0));
        let (energy, derivative) = flat_bottom(1.8, 1.4, 1.6, 100.0);
        assert!(f64_approx_equal(energy, 4.0));
        assert!(f64_approx_equal(derivative, 40.0));
        assert!(flat_bottom(1.2, 1.4, 1.6, 100.0).1 < 0.0);
    }

    #[test]
    fn threefold_torsion_is_minimal_at_staggered_angles() {
        let staggered = periodic_torsion(std::f64::consts::PI, 2.0, 3.0, 0.0);
        let eclipsed = periodic_torsion(0.0, 2.0, 3.0, 0.0);
        assert!(f64_approx_equal(staggered, 0.0));
        assert!(f64_approx_equal(eclipsed, 2.0));
    }

    #[test]
    fn twofold_torsion_with_phase_keeps_double_bonds_planar() {
        use std::f64::consts::{FRAC_PI_2, PI};
        assert!(f64_approx_equal(periodic_torsion(0.0, 10.0, 2.0, PI), 0.0));
        assert!(f64_approx_equal(periodic_torsion(PI, 10.0, 2.0, PI), 0.0));
        assert!(f64_approx_equal(periodic_torsion(FRAC_PI_2, 10.0, 2.0, PI), 10.0));
    }
}
