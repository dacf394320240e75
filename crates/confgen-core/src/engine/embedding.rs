use crate::core::engines::embedding::{EmbedOptions, EmbeddingEngine};
use crate::core::models::anchor::AnchorMap;
use crate::core::models::conformer::Geometry;
use crate::core::models::molecule::Molecule;
use tracing::{debug, info};

/// Bounding-box multiplier used by the random-coordinate retry.
pub const RETRY_BOX_SIZE_MULT: f64 = 10.0;
/// Failure budget of the random-coordinate retry.
pub const RETRY_NUM_ZERO_FAIL: usize = 1000;

fn needs_retry(obtained: usize, requested: usize) -> bool {
    obtained == 0 || (obtained == 1 && requested > 1)
}

/// Requests `n` geometries, retrying once with random coordinates when the standard call
/// yields none, or a single geometry out of several requested.
///
/// Anchors, when given, are pinned during both calls. Fewer than `n` geometries is not an
/// error.
pub fn embed(
    engine: &dyn EmbeddingEngine,
    molecule: &Molecule,
    n: usize,
    seed: u64,
    anchors: Option<&AnchorMap>,
) -> Vec<Geometry> {
    let options = EmbedOptions::standard(seed).with_anchors(anchors);
    let geometries = engine.embed_multiple(molecule, n, &options);
    if !needs_retry(geometries.len(), n) {
        debug!(molecule = molecule.name(), embedded = geometries.len(), requested = n, "Embedded geometries");
        return geometries;
    }

    info!(
        molecule = molecule.name(),
        obtained = geometries.len(),
        requested = n,
        "Retrying embedding with random coordinates"
    );
    let retry = EmbedOptions {
        use_random_coords: true,
        box_size_mult: RETRY_BOX_SIZE_MULT,
        num_zero_fail: RETRY_NUM_ZERO_FAIL,
        ..options
    };
    engine.embed_multiple(molecule, n, &retry)
}
