//! Research projects and the artifacts saved into them.

pub mod render;
pub mod store;

#[cfg(test)]
mod tests;

pub use render::render_artifact;
pub use store::{DeletedProject, ProjectStore};
