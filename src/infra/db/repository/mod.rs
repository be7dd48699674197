//! Repository implementations for data access in PaperTrail.
//!
//! Provides database operations for projects, artifacts and review queue items.

mod artifact;
mod project;
mod review_item;

pub use artifact::ArtifactRepository;
pub use project::ProjectRepository;
pub use review_item::ReviewItemRepository;

use rusqlite::Connection;
use std::sync::{Arc, Mutex};

pub(super) type DbConn = Arc<Mutex<Connection>>;

#[cfg(test)]
mod tests;
