use super::config::SampleSize;
use crate::core::models::molecule::Molecule;
use crate::core::topology::descriptors::MolecularDescriptors;

/// Initial embedding count from rotatable bonds, polar hydrogens and saturated rings.
///
/// For metal complexes the multiplier is first scaled by three per metal centre to cover
/// the cis/trans arrangements around each centre.
pub fn estimate_initial_samples(molecule: &Molecule, multiplier: usize) -> usize {
    let descriptors = MolecularDescriptors::compute(molecule);
    from_descriptors(&descriptors, multiplier, molecule.metal_centers().len())
}

pub fn from_descriptors(
    descriptors: &MolecularDescriptors,
    multiplier: usize,
    metal_centers: usize,
) -> usize {
    let multiplier = if metal_centers > 0 {
        multiplier * 3 * metal_centers
    } else {
        multiplier
    };
    let raw = 3 * descriptors.rotatable_bonds
        + 3 * descriptors.polar_hydrogens
        + 3 * descriptors.saturated_rings;
    if raw == 0 { multiplier } else { multiplier * raw }
}

pub fn resolve_sample_size(molecule: &Molecule, sample: SampleSize) -> usize {
    match sample {
        SampleSize::Fixed(n) => n,
        SampleSize::Auto { multiplier } => estimate_initial_samples(molecule, multiplier),
    }
}
