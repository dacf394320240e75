use nalgebra::Point3;
use std::fmt;

/// Ordered 3-D coordinates, one per atom of the owning molecule.
pub type Geometry = Vec<Point3<f64>>;

/// The pipeline stage that produced a conformer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Stage {
    Embedded,
    Minimized,
    Rotated,
    Refined { engine: String },
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedded => f.write_str("embedded"),
            Self::Minimized => f.write_str("minimized"),
            Self::Rotated => f.write_str("rotated"),
            Self::Refined { engine } => write!(f, "refined ({engine})"),
        }
    }
}

/// One 3-D coordinate assignment for a molecular graph, with its energy in kcal/mol.
///
/// Conformers are value objects: a stage that needs a modified geometry derives a new
/// conformer with [`Conformer::derive`] and never touches the one it was given.
#[derive(Debug, Clone, PartialEq)]
pub struct Conformer {
    pub geometry: Geometry,
    pub energy: f64,
    pub stage: Stage,
    /// Set only by optimizers that report convergence.
    pub converged: Option<bool>,
    pub name: Option<String>,
}

impl Conformer {
    pub fn new(geometry: Geometry, energy: f64, stage: Stage) -> Self {
        Self {
            geometry,
            energy,
            stage,
            converged: None,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_convergence(mut self, converged: bool) -> Self {
        self.converged = Some(converged);
        self
    }

    /// A new conformer at a later stage, keeping this conformer's name.
    pub fn derive(&self, geometry: Geometry, energy: f64, stage: Stage) -> Self {
        Self {
            geometry,
            energy,
            stage,
            converged: None,
            name: self.name.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }
}

/// Sorts conformers by ascending energy; conformers of equal energy keep their input order.
pub fn sort_by_energy(conformers: &mut [Conformer]) {
    conformers.sort_by(|a, b| a.energy.total_cmp(&b.energy));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conformer(energy: f64, name: &str) -> Conformer {
        Conformer::new(vec![Point3::origin()], energy, Stage::Minimized).with_name(name)
    }

    #[test]
    fn derive_keeps_name_and_resets_convergence() {
        let parent = conformer(-1.0, "mol conformer 1").with_convergence(true);
        let child = parent.derive(vec![Point3::new(1.0, 0.0, 0.0)], -2.0, Stage::Rotated);
        assert_eq!(child.name.as_deref(), Some("mol conformer 1"));
        assert_eq!(child.converged, None);
        assert_eq!(child.stage, Stage::Rotated);
        assert_eq!(parent.geometry[0], Point3::origin());
    }

    #[test]
    fn sort_by_energy_is_stable_for_ties() {
        let mut list = vec![
            conformer(1.0, "a"),
            conformer(-1.0, "b"),
            conformer(1.0, "c"),
            conformer(-3.0, "d"),
        ];
        sort_by_energy(&mut list);
        let names: Vec<_> = list.iter().map(|c| c.display_name()).collect();
        assert_eq!(names, vec!["d", "b", "a", "c"]);
    }

    #[test]
    fn stage_display_names_refinement_engine() {
        let stage = Stage::Refined {
            engine: "xtb".to_string(),
        };
        assert_eq!(stage.to_string(), "refined (xtb)");
    }
}
