//! Domain types for PaperTrail.
//! Defines the core data structures used by the labeling pipeline, the review
//! queue and the project store.

pub mod error;
pub mod labeling;
pub mod paper;
pub mod project;
pub mod review_item;

pub use error::*;
pub use labeling::*;
pub use paper::*;
pub use project::*;
pub use review_item::*;
