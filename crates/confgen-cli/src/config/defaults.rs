/// Values used when neither the command line nor the configuration file provide one.
pub struct DefaultsConfig {
    pub auto_sample: usize,
    pub seed: u64,
    pub largest_fragment: bool,
    pub initial_energy_threshold: f64,
    pub energy_threshold: f64,
    pub rms_threshold: f64,
    pub heavy_only: bool,
    pub max_matches_rmsd: usize,
    pub force_field: String,
    pub max_iterations: usize,
    pub template_restarts: usize,
    pub constraint_weight: f64,
    pub dihedral_scan: bool,
    pub degree: f64,
    pub max_torsions: usize,
    pub ewin: f64,
    pub xtb_command: String,
    pub xtb_cycles: usize,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            auto_sample: 20,
            seed: 62609,
            largest_fragment: true,
            initial_energy_threshold: 0.0001,
            energy_threshold: 0.25,
            rms_threshold: 0.25,
            heavy_only: true,
            max_matches_rmsd: 1000,
            force_field: "MMFF".to_string(),
            max_iterations: 1000,
            template_restarts: 10,
            constraint_weight: 10000.0,
            dihedral_scan: true,
            degree: 30.0,
            max_torsions: 20,
            ewin: 40.0,
            xtb_command: "xtb".to_string(),
            xtb_cycles: 200,
        }
    }
}
