use std::fmt;
use std::sync::Arc;

/// The pipeline stage a molecule is currently in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    Embedding,
    Minimization,
    TorsionScan,
    Refinement { engine: String },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Embedding => f.write_str("embedding"),
            Self::Minimization => f.write_str("force-field minimization"),
            Self::TorsionScan => f.write_str("dihedral scan"),
            Self::Refinement { engine } => write!(f, "refinement ({engine})"),
        }
    }
}

/// Events emitted while molecules move through the pipeline.
///
/// Every event names its molecule, so consumers can follow several molecules running in
/// parallel. `steps` is the number of [`Progress::StepCompleted`] events the phase will emit,
/// when known in advance.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    MoleculeStarted {
        molecule: Arc<str>,
    },
    PhaseStarted {
        molecule: Arc<str>,
        phase: Phase,
        steps: Option<u64>,
    },
    StepCompleted {
        molecule: Arc<str>,
    },
    Notice {
        molecule: Arc<str>,
        message: String,
    },
    MoleculeFinished {
        molecule: Arc<str>,
        unique: usize,
    },
    MoleculeFailed {
        molecule: Arc<str>,
        reason: String,
    },
}

impl Progress {
    pub fn molecule(&self) -> &str {
        match self {
            Self::MoleculeStarted { molecule }
            | Self::PhaseStarted { molecule, .. }
            | Self::StepCompleted { molecule }
            | Self::Notice { molecule, .. }
            | Self::MoleculeFinished { molecule, .. }
            | Self::MoleculeFailed { molecule, .. } => molecule,
        }
    }
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

/// Forwards progress events to an optional callback; without one, reporting is a no-op.
#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// A handle that tags every event with `name` and announces the molecule.
    pub fn start_molecule(&self, name: &str) -> MoleculeProgress<'_, 'a> {
        let molecule: Arc<str> = Arc::from(name);
        self.report(Progress::MoleculeStarted {
            molecule: molecule.clone(),
        });
        MoleculeProgress {
            reporter: self,
            molecule,
        }
    }
}

/// Progress of one molecule.
pub struct MoleculeProgress<'r, 'a> {
    reporter: &'r ProgressReporter<'a>,
    molecule: Arc<str>,
}

impl MoleculeProgress<'_, '_> {
    pub fn phase(&self, phase: Phase, steps: Option<u64>) {
        self.reporter.report(Progress::PhaseStarted {
            molecule: self.molecule.clone(),
            phase,
            steps,
        });
    }

    #[inline]
    pub fn step(&self) {
        self.reporter.report(Progress::StepCompleted {
            molecule: self.molecule.clone(),
        });
    }

    pub fn notice(&self, message: impl Into<String>) {
        if self.reporter.callback.is_some() {
            self.reporter.report(Progress::Notice {
                molecule: self.molecule.clone(),
                message: message.into(),
            });
        }
    }

    pub fn finished(self, unique: usize) {
        self.reporter.report(Progress::MoleculeFinished {
            molecule: self.molecule,
            unique,
        });
    }

    pub fn failed(self, reason: impl Into<String>) {
        self.reporter.report(Progress::MoleculeFailed {
            molecule: self.molecule,
            reason: reason.into(),
        });
    }
}
