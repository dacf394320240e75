use crate::cli::InspectArgs;
use crate::config::builder::configured_metals;
use crate::config::file::FileConfig;
use crate::error::{CliError, Result};
use confgen::core::io::sdf::SdfFile;
use confgen::core::io::traits::MolecularFile;
use confgen::core::models::atom::Element;
use confgen::core::models::molecule::Molecule;
use confgen::core::topology::descriptors::MolecularDescriptors;
use confgen::core::topology::rings::RingInfo;
use confgen::core::topology::rotatable::find_rotatable_torsions;
use confgen::engine::sampler::from_descriptors;
use std::fmt::Write;

pub fn run(args: InspectArgs) -> Result<()> {
    let sampling = match &args.config {
        Some(path) => FileConfig::from_file(path)?.sampling.unwrap_or_default(),
        None => Default::default(),
    };
    let metals = configured_metals(&sampling)?;

    let records = SdfFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    for record in records {
        print!("{}", describe(record.molecule, &metals, args.auto_sample));
    }
    Ok(())
}

/// Metal centres are marked from `metals` the same way generation marks them.
fn describe(mut molecule: Molecule, metals: &[Element], multiplier: usize) -> String {
    molecule.mark_metal_centers(metals);
    let molecule = &molecule;
    let rings = RingInfo::perceive(molecule);
    let descriptors = MolecularDescriptors::compute_with_rings(molecule, &rings);
    let torsions = find_rotatable_torsions(molecule, &rings, true);
    let metal_centers = molecule.metal_centers().len();

    let mut out = String::new();
    let _ = writeln!(out, "{}", molecule.name());
    let _ = writeln!(
        out,
        "  atoms: {}  weight: {:.2}  charge: {}  metal centres: {}",
        molecule.atom_count(),
        molecule.molecular_weight(),
        molecule.total_formal_charge(),
        metal_centers
    );
    let _ = writeln!(
        out,
        "  rings: {}  rotatable bonds: {}  polar H: {}  saturated rings: {}",
        rings.ring_count(),
        descriptors.rotatable_bonds,
        descriptors.polar_hydrogens,
        descriptors.saturated_rings
    );
    let listed: Vec<String> = torsions.iter().map(ToString::to_string).collect();
    let _ = writeln!(out, "  heavy-atom torsions: {} [{}]", torsions.len(), listed.join(", "));
    let _ = writeln!(
        out,
        "  estimated samples: {}",
        from_descriptors(&descriptors, multiplier, metal_centers)
    );
    out
}
