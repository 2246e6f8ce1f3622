//! Error types for Tagged Todos.

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}

impl DatabaseError {
    /// Classify a libsql failure, keeping the operation name for context.
    ///
    /// SQLite reports every constraint failure with a message starting
    /// with `UNIQUE constraint failed`, `FOREIGN KEY constraint failed`, etc.
    pub fn from_libsql(op: &str, e: libsql::Error) -> Self {
        let msg = e.to_string();
        if msg.contains("constraint failed") {
            DatabaseError::Constraint(format!("{op}: {msg}"))
        } else {
            DatabaseError::Query(format!("{op}: {msg}"))
        }
    }

    /// True when this error is a UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DatabaseError::Constraint(msg) if msg.contains("UNIQUE"))
    }
}

/// Domain errors surfaced by the todo service.
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("{0}")]
    Validation(String),

    #[error("No such {entity} with id {id}")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Username is already taken")]
    UsernameTaken,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Password hashing failed: {0}")]
    Credential(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl TodoError {
    pub fn validation(msg: impl Into<String>) -> Self {
        TodoError::Validation(msg.into())
    }

    pub fn todo_not_found(id: i64) -> Self {
        TodoError::NotFound { entity: "todo", id }
    }

    pub fn tag_not_found(id: i64) -> Self {
        TodoError::NotFound { entity: "tag", id }
    }
}
