pub mod sdf;
pub mod summary;
pub mod traits;
