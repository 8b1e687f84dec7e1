//! Mosaic discovery pipeline

pub mod batch;
pub mod cancel;
pub mod catalog_walker;
pub mod geometry_filter;
pub mod page_handler;

// Re-export main types
pub use batch::{BatchOrchestrator, BatchSummary};
pub use cancel::CancelFlag;
pub use catalog_walker::{CatalogWalker, WalkOutcome, WalkStatus};
pub use geometry_filter::{in_range, GeometryFilter};
pub use page_handler::{Admission, PageHandler};
