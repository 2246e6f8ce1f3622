//! TodoRepository — owner-scoped CRUD over the `todos` table.
//!
//! Every statement carries `owner_id = ?`, so another owner's row behaves
//! exactly like a missing one.

use chrono::Utc;
use libsql::{Connection, params};
use tracing::debug;

use super::model::{NewTodo, Todo};
use crate::error::DatabaseError;
use crate::store::{atomically, parse_datetime, query_scalar};
use crate::tags::Associations;

/// Column list for todo SELECT queries.
const TODO_COLUMNS: &str = "id, owner_id, name, description, completed, created_at";

/// Todo queries over a borrowed connection.
pub struct TodoRepository<'c> {
    conn: &'c Connection,
}

impl<'c> TodoRepository<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, owner_id: i64, new: &NewTodo) -> Result<Todo, DatabaseError> {
        let now = Utc::now();
        self.conn
            .execute(
                "INSERT INTO todos (owner_id, name, description, completed, created_at)
                 VALUES (?1, ?2, ?3, 0, ?4)",
                params![
                    owner_id,
                    new.name.as_str(),
                    new.description.as_deref(),
                    now.to_rfc3339()
                ],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("create_todo", e))?;

        let id = self.conn.last_insert_rowid();
        debug!(owner_id, todo_id = id, "Todo created");
        Ok(Todo {
            id,
            owner_id,
            name: new.name.clone(),
            description: new.description.clone(),
            completed: false,
            created_at: now,
        })
    }

    pub async fn get(&self, owner_id: i64, id: i64) -> Result<Option<Todo>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TODO_COLUMNS} FROM todos WHERE id = ?1 AND owner_id = ?2"),
                params![id, owner_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("get_todo", e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_todo(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("get_todo row: {e}"))),
        }
    }

    /// All of the owner's todos in creation order.
    pub async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Todo>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TODO_COLUMNS} FROM todos WHERE owner_id = ?1 ORDER BY id ASC"),
                params![owner_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("list_todos", e))?;

        let mut todos = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_todos row: {e}")))?
        {
            todos.push(row_to_todo(&row)?);
        }
        Ok(todos)
    }

    /// Overwrite name and description. Returns false when no such todo
    /// exists for this owner.
    pub async fn update(
        &self,
        owner_id: i64,
        id: i64,
        name: &str,
        description: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let count = self
            .conn
            .execute(
                "UPDATE todos SET name = ?1, description = ?2 WHERE id = ?3 AND owner_id = ?4",
                params![name, description, id, owner_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("update_todo", e))?;
        Ok(count > 0)
    }

    pub async fn set_completed(
        &self,
        owner_id: i64,
        id: i64,
        completed: bool,
    ) -> Result<bool, DatabaseError> {
        let count = self
            .conn
            .execute(
                "UPDATE todos SET completed = ?1 WHERE id = ?2 AND owner_id = ?3",
                params![completed as i64, id, owner_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("set_completed", e))?;
        if count > 0 {
            debug!(owner_id, todo_id = id, completed, "Todo completion set");
        }
        Ok(count > 0)
    }

    /// Flip the completion flag. Returns the new value, or `None` when no
    /// such todo exists for this owner.
    pub async fn toggle(&self, owner_id: i64, id: i64) -> Result<Option<bool>, DatabaseError> {
        let count = self
            .conn
            .execute(
                "UPDATE todos SET completed = 1 - completed WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("toggle_todo", e))?;
        if count == 0 {
            return Ok(None);
        }

        let flag = query_scalar(
            self.conn,
            "toggle_todo",
            "SELECT completed FROM todos WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )
        .await?;
        Ok(flag.map(|v| v != 0))
    }

    /// Delete a todo together with its tag links, atomically. Returns false
    /// when no such todo exists for this owner.
    pub async fn delete(&self, owner_id: i64, id: i64) -> Result<bool, DatabaseError> {
        atomically(self.conn, "delete_todo", async {
            Associations::new(self.conn)
                .delete_all_for_todo(owner_id, id)
                .await?;
            let count = self
                .conn
                .execute(
                    "DELETE FROM todos WHERE id = ?1 AND owner_id = ?2",
                    params![id, owner_id],
                )
                .await
                .map_err(|e| DatabaseError::from_libsql("delete_todo", e))?;
            if count > 0 {
                debug!(owner_id, todo_id = id, "Todo deleted");
            }
            Ok(count > 0)
        })
        .await
    }
}

fn row_to_todo(row: &libsql::Row) -> Result<Todo, DatabaseError> {
    let id: i64 = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("todo.id: {e}")))?;
    let owner_id: i64 = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("todo.owner_id: {e}")))?;
    let name: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("todo.name: {e}")))?;

    let description: Option<String> = row.get(3).ok();
    let description = description.filter(|d| !d.is_empty());

    let completed = row
        .get::<i64>(4)
        .map_err(|e| DatabaseError::Query(format!("todo.completed: {e}")))?
        != 0;

    let created_at_str: String = row
        .get(5)
        .map_err(|e| DatabaseError::Query(format!("todo.created_at: {e}")))?;
    let created_at = parse_datetime(&created_at_str);

    Ok(Todo {
        id,
        owner_id,
        name,
        description,
        completed,
        created_at,
    })
}
