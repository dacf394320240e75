use super::config::MinimizationConfig;
use super::error::EngineError;
use crate::core::engines::forcefield::{ForceFieldEngine, ForceFieldFamily};
use crate::core::models::anchor::AnchorMap;
use crate::core::models::conformer::{Conformer, Geometry, Stage};
use crate::core::models::molecule::Molecule;
use crate::core::utils::geometry::align_subset;
use nalgebra::Point3;
use tracing::{debug, info};

const FALLBACK_FAMILY: ForceFieldFamily = ForceFieldFamily::Uff;

/// The force-field family used for one molecule, chosen once before any minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForceFieldStrategy {
    requested: ForceFieldFamily,
    family: ForceFieldFamily,
}

impl ForceFieldStrategy {
    /// Picks the configured family, or the universal fallback when the molecule contains
    /// elements beyond the configured family's range.
    ///
    /// Fails when the engine cannot provide the family that would be used.
    pub fn resolve(
        engine: &dyn ForceFieldEngine,
        molecule: &Molecule,
        requested: ForceFieldFamily,
    ) -> Result<Self, EngineError> {
        if !engine.supports(requested) {
            return Err(EngineError::UnsupportedForceField { family: requested });
        }
        let family = if requested.covers(molecule) {
            requested
        } else {
            if !engine.supports(FALLBACK_FAMILY) {
                return Err(EngineError::UnsupportedForceField {
                    family: FALLBACK_FAMILY,
                });
            }
            info!(
                molecule = molecule.name(),
                from = %requested,
                to = %FALLBACK_FAMILY,
                max_atomic_number = molecule.max_atomic_number(),
                "Switching force-field family for elements outside the configured range"
            );
            FALLBACK_FAMILY
        };
        Ok(Self { requested, family })
    }

    pub fn family(&self) -> ForceFieldFamily {
        self.family
    }

    pub fn is_fallback(&self) -> bool {
        self.family != self.requested
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimized {
    pub geometry: Geometry,
    pub energy: f64,
    pub converged: bool,
}

/// Drives the force-field engine for one molecule.
pub struct Minimizer<'a> {
    engine: &'a dyn ForceFieldEngine,
    molecule: &'a Molecule,
    strategy: ForceFieldStrategy,
    config: &'a MinimizationConfig,
}

impl<'a> Minimizer<'a> {
    pub fn new(
        engine: &'a dyn ForceFieldEngine,
        molecule: &'a Molecule,
        strategy: ForceFieldStrategy,
        config: &'a MinimizationConfig,
    ) -> Self {
        Self {
            engine,
            molecule,
            strategy,
            config,
        }
    }

    pub fn strategy(&self) -> ForceFieldStrategy {
        self.strategy
    }

    /// Minimizes a copy of `geometry`.
    ///
    /// With anchors, every anchor pair is first restrained to its template distance, the
    /// minimizer gets extra rounds to converge, and the result is superimposed back onto the
    /// template coordinates.
    pub fn minimize(
        &self,
        geometry: &[Point3<f64>],
        anchors: Option<&AnchorMap>,
    ) -> Result<Minimized, EngineError> {
        let mut ff = self
            .engine
            .force_field(self.molecule, self.strategy.family, geometry)
            .map_err(|source| EngineError::ForceField {
                molecule: self.molecule.name().to_string(),
                source,
            })?;

        let Some(anchors) = anchors.filter(|a| !a.is_empty()) else {
            let more_to_do = ff.minimize(self.config.max_iterations);
            return Ok(Minimized {
                geometry: ff.positions(),
                energy: ff.energy(),
                converged: !more_to_do,
            });
        };

        for (i, j, distance) in anchors.pair_distances() {
            ff.add_distance_constraint(i, j, distance, distance, self.config.constraint_weight);
        }
        let mut more_to_do = ff.minimize(self.config.max_iterations);
        let mut restarts = 0;
        while more_to_do && restarts < self.config.template_restarts {
            more_to_do = ff.minimize(self.config.max_iterations);
            restarts += 1;
        }
        if restarts > 0 {
            debug!(restarts, converged = !more_to_do, "Template-constrained minimization restarted");
        }

        let aligned = align_subset(&ff.positions(), &anchors.atoms(), &anchors.positions())
            .ok_or_else(|| {
                EngineError::Internal("anchor superposition could not be computed".to_string())
            })?;
        Ok(Minimized {
            geometry: aligned,
            energy: ff.energy(),
            converged: !more_to_do,
        })
    }

    /// Minimizes every embedded geometry into a [`Stage::Minimized`] conformer, in order.
    pub fn minimize_all(
        &self,
        geometries: Vec<Geometry>,
        anchors: Option<&AnchorMap>,
        mut on_step: impl FnMut(),
    ) -> Result<Vec<Conformer>, EngineError> {
        geometries
            .into_iter()
            .map(|geometry| {
                let minimized = self.minimize(&geometry, anchors)?;
                on_step();
                Ok(
                    Conformer::new(minimized.geometry, minimized.energy, Stage::Minimized)
                        .with_convergence(minimized.converged),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engines::reference::ValenceForceFieldEngine;
    use crate::core::models::atom::{Atom, Element};
    use crate::core::models::molecule::MoleculeBuilder;
    use crate::core::models::topology::BondOrder;
    use crate::testing::{self, ScriptedForceFieldEngine};

    fn palladium_complex() -> Molecule {
        let mut builder = MoleculeBuilder::new("pd");
        let c = builder.add_atom(Atom::new(Element::C).with_implicit_hydrogens(3));
        let pd = builder.add_atom(Atom::new(Element::from_atomic_number(46).unwrap()));
        builder.add_bond(c, pd, BondOrder::Single);
        builder.build().unwrap()
    }

    #[test]
    fn organic_molecule_keeps_the_configured_family() {
        let engine = ValenceForceFieldEngine::default();
        let strategy =
            ForceFieldStrategy::resolve(&engine, &testing::pentane(), ForceFieldFamily::Mmff)
                .unwrap();
        assert_eq!(strategy.family(), ForceFieldFamily::Mmff);
        assert!(!strategy.is_fallback());
    }

    #[test]
    fn heavy_elements_switch_to_the_universal_family() {
        let engine = ValenceForceFieldEngine::default();
        let strategy =
            ForceFieldStrategy::resolve(&engine, &palladium_complex(), ForceFieldFamily::Mmff)
                .unwrap();
        assert_eq!(strategy.family(), ForceFieldFamily::Uff);
        assert!(strategy.is_fallback());
    }

    #[test]
    fn unsupported_configured_family_is_fatal() {
        let engine = ValenceForceFieldEngine::with_families(&[ForceFieldFamily::Uff]);
        let err = ForceFieldStrategy::resolve(&engine, &testing::pentane(), ForceFieldFamily::Mmff)
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::UnsupportedForceField {
                family: ForceFieldFamily::Mmff
            }
        ));
        assert_eq!(err.severity(), crate::engine::error::Severity::Fatal);
    }

    #[test]
    fn minimization_lowers_the_energy_of_a_distorted_geometry() {
        let engine = ValenceForceFieldEngine::default();
        let molecule = testing::pentane();
        let config = MinimizationConfig::default();
        let strategy = ForceFieldStrategy::resolve(&engine, &molecule, config.force_field).unwrap();
        let minimizer = Minimizer::new(&engine, &molecule, strategy, &config);

        let mut distorted = testing::pentane_geometry();
        distorted[2].y += 0.4;
        distorted[4].z += 0.5;
        let start_energy = engine
            .force_field(&molecule, strategy.family(), &distorted)
            .unwrap()
            .energy();
        let minimized = minimizer.minimize(&distorted, None).unwrap();
        assert!(minimized.energy < start_energy);
        assert_eq!(minimized.geometry.len(), 5);
    }

    #[test]
    fn template_minimization_constrains_every_anchor_pair_and_realigns() {
        let engine = ScriptedForceFieldEngine::new();
        let molecule = testing::pentane();
        let config = MinimizationConfig::default();
        let strategy = ForceFieldStrategy::resolve(&engine, &molecule, config.force_field).unwrap();
        let minimizer = Minimizer::new(&engine, &molecule, strategy, &config);

        let geometry = testing::pentane_geometry();
        let mut anchors = AnchorMap::new();
        for atom in 0..3 {
            anchors.insert(atom, geometry[atom] + nalgebra::Vector3::new(10.0, 0.0, 0.0));
        }
        let minimized = minimizer.minimize(&geometry, Some(&anchors)).unwrap();

        assert_eq!(*engine.constraints.lock().unwrap(), 3);
        for atom in 0..3 {
            assert!((minimized.geometry[atom] - anchors.get(atom).unwrap()).norm() < 1e-9);
        }
    }

    #[test]
    fn minimize_all_preserves_input_order() {
        let engine = ScriptedForceFieldEngine::new();
        let molecule = testing::pentane();
        let config = MinimizationConfig::default();
        let strategy = ForceFieldStrategy::resolve(&engine, &molecule, config.force_field).unwrap();
        let minimizer = Minimizer::new(&engine, &molecule, strategy, &config);
        let geometries: Vec<_> = (0..4).map(|k| testing::scenario_conformer(k).geometry).collect();

        let mut steps = 0;
        let conformers = minimizer.minimize_all(geometries, None, || steps += 1).unwrap();
        let energies: Vec<_> = conformers.iter().map(|c| c.energy).collect();
        assert_eq!(energies, vec![-4.441836, -5.27175, -1.57172, -3.848579]);
        assert_eq!(steps, 4);
        assert!(conformers.iter().all(|c| c.stage == Stage::Minimized));
    }
}
