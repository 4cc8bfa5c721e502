//! Normalization and 3D projection of embedding maps.

pub mod matrix;
pub mod normalize;
pub mod pca;
pub mod reduce;
pub mod umap;

pub use normalize::{normalize, NormalizationMethod};
pub use reduce::{reduce, ReduceParams, ReductionMethod, Reducer};
pub use umap::{Metric, UmapParams};
