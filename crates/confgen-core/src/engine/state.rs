/// Why a conformer was dropped as a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DuplicateKind {
    /// Within the initial energy threshold of an accepted conformer.
    Prefilter,
    /// Within the energy threshold and the RMSD threshold of an accepted conformer.
    Geometry,
}

/// Why a refined conformer was discarded without being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    NonConvergent,
    HighEnergy,
}

/// The outcome of one conformer in one filtering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConformerFate {
    Accepted,
    Duplicate(DuplicateKind),
    Rejected(RejectionReason),
}

/// Counters of one filtering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FilterStats {
    pub examined: usize,
    pub prefilter_duplicates: usize,
    pub geometry_duplicates: usize,
    pub nonconvergent: usize,
    pub high_energy: usize,
    pub unique: usize,
}

impl FilterStats {
    pub fn record(&mut self, fate: ConformerFate) {
        self.examined += 1;
        match fate {
            ConformerFate::Accepted => self.unique += 1,
            ConformerFate::Duplicate(DuplicateKind::Prefilter) => self.prefilter_duplicates += 1,
            ConformerFate::Duplicate(DuplicateKind::Geometry) => self.geometry_duplicates += 1,
            ConformerFate::Rejected(RejectionReason::NonConvergent) => self.nonconvergent += 1,
            ConformerFate::Rejected(RejectionReason::HighEnergy) => self.high_energy += 1,
        }
    }

    pub fn rejected(&self) -> usize {
        self.nonconvergent + self.high_energy
    }
}
