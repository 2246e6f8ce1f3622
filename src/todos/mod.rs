//! Todos — owner-scoped items and the listing engine over them.

pub mod model;
pub mod query;
pub mod repo;

pub use model::{NewTodo, Todo, TodoView};
pub use query::{EffectiveParams, Filter, QueryComposer, SortOrder, ViewPrefs, ViewQuery};
pub use repo::TodoRepository;
