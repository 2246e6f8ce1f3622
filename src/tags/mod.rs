//! Tags — per-owner colored labels and their links to todos.

pub mod associations;
pub mod model;
pub mod store;

pub use associations::Associations;
pub use model::{DEFAULT_TAG_COLOR, Tag};
pub use store::TagStore;
