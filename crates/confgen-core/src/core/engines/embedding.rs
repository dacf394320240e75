use crate::core::models::anchor::AnchorMap;
use crate::core::models::conformer::Geometry;
use crate::core::models::molecule::Molecule;

/// Settings for one call into an embedding engine.
#[derive(Debug, Clone, Copy)]
pub struct EmbedOptions<'a> {
    pub seed: u64,
    /// Start from random coordinates instead of the engine's standard strategy.
    pub use_random_coords: bool,
    /// Scale of the bounding box random coordinates are drawn from.
    pub box_size_mult: f64,
    /// Failed attempts tolerated before the engine gives up on the remaining geometries.
    pub num_zero_fail: usize,
    /// Atoms pinned to fixed coordinates.
    pub anchors: Option<&'a AnchorMap>,
}

impl<'a> EmbedOptions<'a> {
    pub fn standard(seed: u64) -> Self {
        Self {
            seed,
            use_random_coords: false,
            box_size_mult: 2.0,
            num_zero_fail: 1,
            anchors: None,
        }
    }

    pub fn with_anchors(mut self, anchors: Option<&'a AnchorMap>) -> Self {
        self.anchors = anchors;
        self
    }
}

pub trait EmbeddingEngine: Send + Sync {
    /// Produces up to `count` geometries for `molecule`; fewer is not an error.
    fn embed_multiple(
        &self,
        molecule: &Molecule,
        count: usize,
        options: &EmbedOptions<'_>,
    ) -> Vec<Geometry>;
}
