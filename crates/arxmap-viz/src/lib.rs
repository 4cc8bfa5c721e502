//! Merge reduced coordinates with corpus metadata and build the
//! visualization payload and category palette.

pub mod colors;
pub mod merge;
pub mod payload;

pub use colors::{generate_category_colors, get_category_color, get_category_color_with};
pub use merge::{merge, MergeReport, MergedRow, MergedTable, VerifyPolicy};
pub use payload::{build, public_id, truncate_text, BuildOptions, VisualizationPayload};
