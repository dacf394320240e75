use crate::core::engines::potential::{
    HARTREE_TO_KCAL, Optimization, PotentialEngine, PotentialError,
};
use crate::core::models::atom::Element;
use crate::core::models::conformer::Geometry;
use nalgebra::Point3;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;
use std::process::Command;
use tracing::debug;

const ENGINE_NAME: &str = "xtb";
const INPUT_FILE: &str = "input.xyz";
const OPTIMIZED_FILE: &str = "xtbopt.xyz";
const LAST_STEP_FILE: &str = "xtblast.xyz";
const CONVERGED_MARKER: &str = "GEOMETRY OPTIMIZATION CONVERGED";
const SCRATCH_PREFIX: &str = "confgen-xtb-";

/// GFN-xTB geometry optimization through the external `xtb` executable.
///
/// Each call runs in its own scratch directory, so one instance can serve parallel workers.
#[derive(Debug, Clone)]
pub struct XtbPotential {
    command: String,
    max_cycles: usize,
}

impl Default for XtbPotential {
    fn default() -> Self {
        Self::new(ENGINE_NAME)
    }
}

impl XtbPotential {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            max_cycles: 200,
        }
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    fn failed(message: impl Into<String>) -> PotentialError {
        PotentialError::Failed {
            engine: ENGINE_NAME.to_string(),
            message: message.into(),
        }
    }

    fn run_in(
        &self,
        dir: &Path,
        geometry: &[Point3<f64>],
        elements: &[Element],
        charge: i32,
    ) -> Result<Optimization, PotentialError> {
        fs::write(dir.join(INPUT_FILE), format_xyz(geometry, elements))?;
        let output = Command::new(&self.command)
            .current_dir(dir)
            .arg(INPUT_FILE)
            .arg("--opt")
            .arg("--chrg")
            .arg(charge.to_string())
            .arg("--cycles")
            .arg(self.max_cycles.to_string())
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    PotentialError::Unavailable {
                        engine: ENGINE_NAME.to_string(),
                        message: format!("cannot execute '{}': {e}", self.command),
                    }
                }
                _ => PotentialError::Io(e),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let energy = parse_total_energy(&stdout).ok_or_else(|| {
            Self::failed(format!(
                "no total energy in output: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ))
        })?;
        let converged = output.status.success() && stdout.contains(CONVERGED_MARKER);

        let optimized = [OPTIMIZED_FILE, LAST_STEP_FILE]
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
            .ok_or_else(|| Self::failed("no optimized geometry was written"))?;
        let geometry = read_xyz(&fs::read_to_string(optimized)?, elements.len())
            .ok_or_else(|| Self::failed("optimized geometry could not be parsed"))?;

        Ok(Optimization {
            converged,
            energy: energy * HARTREE_TO_KCAL,
            geometry,
        })
    }
}

fn format_xyz(geometry: &[Point3<f64>], elements: &[Element]) -> String {
    let mut content = format!("{}\n\n", geometry.len());
    for (element, p) in elements.iter().zip(geometry) {
        // Writing into a String cannot fail.
        let _ = writeln!(
            content,
            "{:<2} {:>15.8} {:>15.8} {:>15.8}",
            element.symbol(),
            p.x,
            p.y,
            p.z
        );
    }
    content
}

/// Coordinates of an XYZ block with exactly `expected` atoms.
fn read_xyz(content: &str, expected: usize) -> Option<Geometry> {
    let geometry: Option<Geometry> = content
        .lines()
        .skip(2)
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            let mut fields = line.split_whitespace().skip(1).map(str::parse::<f64>);
            Some(Point3::new(
                fields.next()?.ok()?,
                fields.next()?.ok()?,
                fields.next()?.ok()?,
            ))
        })
        .collect();
    geometry.filter(|g| g.len() == expected)
}

/// The last reported total energy, in Hartree.
fn parse_total_energy(output: &str) -> Option<f64> {
    output
        .lines()
        .rev()
        .find(|l| l.contains("TOTAL ENERGY"))
        .and_then(|l| l.split_whitespace().find_map(|t| t.parse::<f64>().ok()))
}

impl PotentialEngine for XtbPotential {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn optimize(
        &self,
        geometry: &[Point3<f64>],
        elements: &[Element],
        charge: i32,
    ) -> Result<Optimization, PotentialError> {
        let scratch = tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?;
        debug!(path = %scratch.path().display(), "Running xtb");
        self.run_in(scratch.path(), geometry, elements, charge)
    }
}
