//! Application layer (use-cases, policies).
//!
//! Orchestrates domain logic over the infrastructure adapters: the labeling
//! pipeline, the manual review queue, the project store and dataset cleaning.

pub mod cleaning;
pub mod labeling;
pub mod projects;
pub mod review_queue;
