//! TodoService — the transactional layer between the HTTP surface and the
//! repositories.
//!
//! Inputs are validated before the store is touched. Every operation that
//! writes more than one statement runs in a single transaction.

use std::sync::Arc;

use libsql::Connection;
use secrecy::{ExposeSecret, SecretString};
use tracing::info;

use crate::accounts::{self, Account, AccountStore};
use crate::error::TodoError;
use crate::store::Store;
use crate::tags::model::{normalize_color, normalize_name};
use crate::tags::{Associations, Tag, TagStore};
use crate::todos::model::{normalize_description, normalize_todo_name};
use crate::todos::{EffectiveParams, NewTodo, QueryComposer, TodoRepository, TodoView};

/// Tag input attached to a todo create or update.
#[derive(Debug, Clone, Default)]
pub struct TagInput {
    /// Free-text names, resolved (and created if missing) per owner.
    pub names: Vec<String>,
    /// Ids of existing tags picked directly.
    pub ids: Vec<i64>,
}

/// Fields for creating or updating a todo.
#[derive(Debug, Clone, Default)]
pub struct TodoInput {
    pub name: String,
    pub description: Option<String>,
    /// `None` leaves associations alone on update; `Some` replaces them.
    pub tags: Option<TagInput>,
}

#[derive(Clone)]
pub struct TodoService {
    store: Arc<Store>,
}

impl TodoService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    // ── Accounts ────────────────────────────────────────────────────

    pub async fn signup(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Account, TodoError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TodoError::validation("Username must not be empty"));
        }
        if password.expose_secret().is_empty() {
            return Err(TodoError::validation("Password must not be empty"));
        }

        {
            let conn = self.store.conn().await;
            if AccountStore::new(&conn).find_by_username(username).await?.is_some() {
                return Err(TodoError::UsernameTaken);
            }
        }

        // Hash outside the connection lock, on the blocking pool.
        let secret = SecretString::from(password.expose_secret().to_owned());
        let digest = tokio::task::spawn_blocking(move || accounts::hash_password(&secret))
            .await
            .map_err(|e| TodoError::Credential(format!("hashing task failed: {e}")))??;

        let conn = self.store.conn().await;
        let account = AccountStore::new(&conn)
            .create(username, &digest)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    TodoError::UsernameTaken
                } else {
                    TodoError::Database(e)
                }
            })?;
        info!(account_id = account.id, username, "Account signed up");
        Ok(account)
    }

    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Account, TodoError> {
        let found = {
            let conn = self.store.conn().await;
            AccountStore::new(&conn)
                .find_by_username(username.trim())
                .await?
        };

        let Some((account, digest)) = found else {
            return Err(TodoError::InvalidCredentials);
        };

        let secret = SecretString::from(password.expose_secret().to_owned());
        let verified =
            tokio::task::spawn_blocking(move || accounts::verify_password(&secret, &digest))
                .await
                .map_err(|e| TodoError::Credential(format!("verification task failed: {e}")))?;
        if !verified {
            return Err(TodoError::InvalidCredentials);
        }

        info!(account_id = account.id, "Account logged in");
        Ok(account)
    }

    // ── Todos ───────────────────────────────────────────────────────

    /// Insert a todo, resolve its tags and link them, all or nothing.
    pub async fn create_todo(&self, owner_id: i64, input: TodoInput) -> Result<TodoView, TodoError> {
        let new = NewTodo {
            name: normalize_todo_name(&input.name)?,
            description: normalize_description(input.description.as_deref()),
        };

        let tx = self.store.begin().await?;
        let result: Result<TodoView, TodoError> = async {
            let todo = TodoRepository::new(&tx).create(owner_id, &new).await?;
            if let Some(tags) = &input.tags {
                link_tags(&tx, owner_id, todo.id, tags).await?;
            }
            load_view(&tx, owner_id, todo.id).await
        }
        .await;
        let view = tx.finish(result).await?;

        info!(owner_id, todo_id = view.id, tags = view.tags.len(), "Todo created");
        Ok(view)
    }

    /// Overwrite name and description; replace tags only when tag input is
    /// present.
    pub async fn update_todo(
        &self,
        owner_id: i64,
        todo_id: i64,
        input: TodoInput,
    ) -> Result<TodoView, TodoError> {
        let name = normalize_todo_name(&input.name)?;
        let description = normalize_description(input.description.as_deref());

        let tx = self.store.begin().await?;
        let result: Result<TodoView, TodoError> = async {
            let updated = TodoRepository::new(&tx)
                .update(owner_id, todo_id, &name, description.as_deref())
                .await?;
            if !updated {
                return Err(TodoError::todo_not_found(todo_id));
            }
            if let Some(tags) = &input.tags {
                link_tags(&tx, owner_id, todo_id, tags).await?;
            }
            load_view(&tx, owner_id, todo_id).await
        }
        .await;
        let view = tx.finish(result).await?;

        info!(owner_id, todo_id, "Todo updated");
        Ok(view)
    }

    pub async fn set_completed(
        &self,
        owner_id: i64,
        todo_id: i64,
        completed: bool,
    ) -> Result<TodoView, TodoError> {
        let conn = self.store.conn().await;
        if !TodoRepository::new(&conn)
            .set_completed(owner_id, todo_id, completed)
            .await?
        {
            return Err(TodoError::todo_not_found(todo_id));
        }
        load_view(&conn, owner_id, todo_id).await
    }

    pub async fn toggle_completed(&self, owner_id: i64, todo_id: i64) -> Result<TodoView, TodoError> {
        let conn = self.store.conn().await;
        TodoRepository::new(&conn)
            .toggle(owner_id, todo_id)
            .await?
            .ok_or_else(|| TodoError::todo_not_found(todo_id))?;
        load_view(&conn, owner_id, todo_id).await
    }

    pub async fn delete_todo(&self, owner_id: i64, todo_id: i64) -> Result<(), TodoError> {
        let conn = self.store.conn().await;
        if !TodoRepository::new(&conn).delete(owner_id, todo_id).await? {
            return Err(TodoError::todo_not_found(todo_id));
        }
        info!(owner_id, todo_id, "Todo deleted");
        Ok(())
    }

    pub async fn get_todo(&self, owner_id: i64, todo_id: i64) -> Result<TodoView, TodoError> {
        let conn = self.store.conn().await;
        load_view(&conn, owner_id, todo_id).await
    }

    pub async fn build_view(
        &self,
        owner_id: i64,
        params: &EffectiveParams,
    ) -> Result<Vec<TodoView>, TodoError> {
        let conn = self.store.conn().await;
        Ok(QueryComposer::new(&conn).build_view(owner_id, params).await?)
    }

    // ── Tags ────────────────────────────────────────────────────────

    pub async fn list_tags(&self, owner_id: i64) -> Result<Vec<Tag>, TodoError> {
        let conn = self.store.conn().await;
        Ok(TagStore::new(&conn).list_for_owner(owner_id).await?)
    }

    /// Create a tag, or return the owner's existing tag with the same name
    /// (case-insensitively) unchanged. The flag is true when a tag was
    /// created.
    pub async fn create_tag(
        &self,
        owner_id: i64,
        name: &str,
        color: Option<&str>,
    ) -> Result<(Tag, bool), TodoError> {
        let name = normalize_name(name)?;
        let color = normalize_color(color)?;

        let conn = self.store.conn().await;
        let (tag, created) = TagStore::new(&conn)
            .get_or_insert(owner_id, &name, &color)
            .await?;
        if created {
            info!(owner_id, tag_id = tag.id, "Tag created");
        }
        Ok((tag, created))
    }

    pub async fn rename_tag(
        &self,
        owner_id: i64,
        tag_id: i64,
        name: &str,
        color: Option<&str>,
    ) -> Result<Tag, TodoError> {
        let name = normalize_name(name)?;
        let color = normalize_color(color)?;

        let conn = self.store.conn().await;
        let tags = TagStore::new(&conn);
        let renamed = tags
            .rename(owner_id, tag_id, &name, &color)
            .await
            .map_err(|e| {
                if e.is_unique_violation() {
                    TodoError::validation(format!("A tag named '{name}' already exists"))
                } else {
                    TodoError::Database(e)
                }
            })?;
        if !renamed {
            return Err(TodoError::tag_not_found(tag_id));
        }
        tags.get(owner_id, tag_id)
            .await?
            .ok_or_else(|| TodoError::tag_not_found(tag_id))
    }

    pub async fn delete_tag(&self, owner_id: i64, tag_id: i64) -> Result<(), TodoError> {
        let conn = self.store.conn().await;
        if !TagStore::new(&conn).delete(owner_id, tag_id).await? {
            return Err(TodoError::tag_not_found(tag_id));
        }
        info!(owner_id, tag_id, "Tag deleted");
        Ok(())
    }
}

/// Resolve free-text names, merge in picked ids, and replace the todo's
/// links with the result.
async fn link_tags(
    conn: &Connection,
    owner_id: i64,
    todo_id: i64,
    input: &TagInput,
) -> Result<Vec<i64>, TodoError> {
    let mut ids = TagStore::new(conn)
        .resolve_or_create(owner_id, &input.names)
        .await?;
    ids.extend_from_slice(&input.ids);
    Ok(Associations::new(conn).replace(owner_id, todo_id, &ids).await?)
}

async fn load_view(conn: &Connection, owner_id: i64, todo_id: i64) -> Result<TodoView, TodoError> {
    QueryComposer::new(conn)
        .view_one(owner_id, todo_id)
        .await?
        .ok_or_else(|| TodoError::todo_not_found(todo_id))
}
