//! Associations — the owner-scoped many-to-many link between todos and tags.

use std::collections::{BTreeMap, BTreeSet};

use libsql::{Connection, Value, params};
use libsql::params::Params;
use tracing::{debug, warn};

use super::store::TagStore;
use crate::error::DatabaseError;
use crate::store::{atomically, query_scalar};

/// Link-table queries over a borrowed connection.
pub struct Associations<'c> {
    conn: &'c Connection,
}

impl<'c> Associations<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Replace every tag on a todo with `tag_ids`.
    ///
    /// Ids the owner does not own are dropped, duplicates collapse, and the
    /// old links are deleted before the new ones are inserted. The whole
    /// replacement runs in a savepoint: on any failure the previous set is
    /// left untouched. A todo the owner does not own is left alone and
    /// yields an empty set.
    ///
    /// Returns the tag ids actually linked, ascending.
    pub async fn replace(
        &self,
        owner_id: i64,
        todo_id: i64,
        tag_ids: &[i64],
    ) -> Result<Vec<i64>, DatabaseError> {
        atomically(self.conn, "replace_todo_tags", async {
            let owns_todo = query_scalar(
                self.conn,
                "replace_todo_tags",
                "SELECT 1 FROM todos WHERE id = ?1 AND owner_id = ?2",
                params![todo_id, owner_id],
            )
            .await?
            .is_some();
            if !owns_todo {
                warn!(owner_id, todo_id, "Refusing to link tags to a todo the owner does not own");
                return Ok(Vec::new());
            }

            let owned = TagStore::new(self.conn).owned_ids(owner_id).await?;
            let wanted: BTreeSet<i64> = tag_ids.iter().copied().collect();
            let kept: Vec<i64> = wanted.intersection(&owned).copied().collect();
            if kept.len() < wanted.len() {
                warn!(
                    owner_id,
                    todo_id,
                    dropped = wanted.len() - kept.len(),
                    "Dropped tag ids not owned by this account"
                );
            }

            self.conn
                .execute(
                    "DELETE FROM todo_tags WHERE owner_id = ?1 AND todo_id = ?2",
                    params![owner_id, todo_id],
                )
                .await
                .map_err(|e| DatabaseError::from_libsql("clear_todo_tags", e))?;

            for tag_id in &kept {
                self.conn
                    .execute(
                        "INSERT INTO todo_tags (todo_id, tag_id, owner_id) VALUES (?1, ?2, ?3)",
                        params![todo_id, *tag_id, owner_id],
                    )
                    .await
                    .map_err(|e| DatabaseError::from_libsql("insert_todo_tag", e))?;
            }

            debug!(owner_id, todo_id, tags = ?kept, "Todo tags replaced");
            Ok(kept)
        })
        .await
    }

    /// Tag ids linked to one todo.
    pub async fn tag_ids_for_todo(
        &self,
        owner_id: i64,
        todo_id: i64,
    ) -> Result<BTreeSet<i64>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT tag_id FROM todo_tags WHERE owner_id = ?1 AND todo_id = ?2",
                params![owner_id, todo_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("tag_ids_for_todo", e))?;

        let mut ids = BTreeSet::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("tag_ids_for_todo row: {e}")))?
        {
            ids.insert(
                row.get::<i64>(0)
                    .map_err(|e| DatabaseError::Query(format!("todo_tags.tag_id: {e}")))?,
            );
        }
        Ok(ids)
    }

    /// Todos carrying at least one of `tag_ids`.
    pub async fn todo_ids_for_tags(
        &self,
        owner_id: i64,
        tag_ids: &BTreeSet<i64>,
    ) -> Result<BTreeSet<i64>, DatabaseError> {
        if tag_ids.is_empty() {
            return Ok(BTreeSet::new());
        }

        let placeholders = (0..tag_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT DISTINCT todo_id FROM todo_tags WHERE owner_id = ?1 AND tag_id IN ({placeholders})"
        );
        let mut values = Vec::with_capacity(tag_ids.len() + 1);
        values.push(Value::Integer(owner_id));
        values.extend(tag_ids.iter().map(|id| Value::Integer(*id)));

        let mut rows = self
            .conn
            .query(&sql, Params::Positional(values))
            .await
            .map_err(|e| DatabaseError::from_libsql("todo_ids_for_tags", e))?;

        let mut ids = BTreeSet::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("todo_ids_for_tags row: {e}")))?
        {
            ids.insert(
                row.get::<i64>(0)
                    .map_err(|e| DatabaseError::Query(format!("todo_tags.todo_id: {e}")))?,
            );
        }
        Ok(ids)
    }

    /// Every link the owner has, grouped by todo id.
    pub async fn links_for_owner(
        &self,
        owner_id: i64,
    ) -> Result<BTreeMap<i64, BTreeSet<i64>>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT todo_id, tag_id FROM todo_tags WHERE owner_id = ?1",
                params![owner_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("links_for_owner", e))?;

        let mut links: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("links_for_owner row: {e}")))?
        {
            let read = |e: libsql::Error| DatabaseError::Query(format!("todo_tags row: {e}"));
            let todo_id: i64 = row.get(0).map_err(read)?;
            let tag_id: i64 = row.get(1).map_err(read)?;
            links.entry(todo_id).or_default().insert(tag_id);
        }
        Ok(links)
    }

    /// Remove every link from one todo. Returns the number removed.
    pub async fn delete_all_for_todo(&self, owner_id: i64, todo_id: i64) -> Result<u64, DatabaseError> {
        self.conn
            .execute(
                "DELETE FROM todo_tags WHERE owner_id = ?1 AND todo_id = ?2",
                params![owner_id, todo_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("delete_links_for_todo", e))
    }

    /// Remove every link to one tag. Returns the number removed.
    pub async fn delete_all_for_tag(&self, owner_id: i64, tag_id: i64) -> Result<u64, DatabaseError> {
        self.conn
            .execute(
                "DELETE FROM todo_tags WHERE owner_id = ?1 AND tag_id = ?2",
                params![owner_id, tag_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("delete_links_for_tag", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::seed_account;
    use crate::store::Store;
    use crate::todos::{NewTodo, TodoRepository};

    async fn seed_todo(conn: &Connection, owner: i64, name: &str) -> i64 {
        TodoRepository::new(conn)
            .create(owner, &NewTodo::named(name))
            .await
            .unwrap()
            .id
    }

    fn set(ids: &[i64]) -> BTreeSet<i64> {
        ids.iter().copied().collect()
    }

    #[tokio::test]
    async fn replace_drops_foreign_tag_ids() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let ann = seed_account(&conn, "ann").await;
        let bob = seed_account(&conn, "bob").await;
        let tags = TagStore::new(&conn);
        let mine = tags.resolve_or_create(ann, &["Work"]).await.unwrap()[0];
        let theirs = tags.resolve_or_create(bob, &["Secret"]).await.unwrap()[0];
        let todo = seed_todo(&conn, ann, "Report").await;

        let links = Associations::new(&conn);
        let kept = links.replace(ann, todo, &[mine, theirs]).await.unwrap();
        assert_eq!(kept, vec![mine]);
        assert_eq!(links.tag_ids_for_todo(ann, todo).await.unwrap(), set(&[mine]));
    }

    #[tokio::test]
    async fn replace_is_idempotent() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let owner = seed_account(&conn, "ann").await;
        let ids = TagStore::new(&conn)
            .resolve_or_create(owner, &["a", "b"])
            .await
            .unwrap();
        let todo = seed_todo(&conn, owner, "Report").await;

        let links = Associations::new(&conn);
        links.replace(owner, todo, &ids).await.unwrap();
        links.replace(owner, todo, &ids).await.unwrap();
        assert_eq!(links.tag_ids_for_todo(owner, todo).await.unwrap(), set(&ids));

        let rows = query_scalar(
            &conn,
            "count",
            "SELECT COUNT(*) FROM todo_tags WHERE todo_id = ?1",
            params![todo],
        )
        .await
        .unwrap();
        assert_eq!(rows, Some(2));
    }

    #[tokio::test]
    async fn replace_deduplicates_input() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let owner = seed_account(&conn, "ann").await;
        let ids = TagStore::new(&conn)
            .resolve_or_create(owner, &["Work", "work"])
            .await
            .unwrap();
        let todo = seed_todo(&conn, owner, "Report").await;

        let kept = Associations::new(&conn).replace(owner, todo, &ids).await.unwrap();
        assert_eq!(kept, vec![ids[0]]);
    }

    #[tokio::test]
    async fn replace_with_empty_clears() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let owner = seed_account(&conn, "ann").await;
        let ids = TagStore::new(&conn)
            .resolve_or_create(owner, &["a"])
            .await
            .unwrap();
        let todo = seed_todo(&conn, owner, "Report").await;

        let links = Associations::new(&conn);
        links.replace(owner, todo, &ids).await.unwrap();
        links.replace(owner, todo, &[]).await.unwrap();
        assert!(links.tag_ids_for_todo(owner, todo).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replace_ignores_foreign_todo() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let ann = seed_account(&conn, "ann").await;
        let bob = seed_account(&conn, "bob").await;
        let bobs_tag = TagStore::new(&conn)
            .resolve_or_create(bob, &["x"])
            .await
            .unwrap();
        let anns_todo = seed_todo(&conn, ann, "Private").await;

        let kept = Associations::new(&conn)
            .replace(bob, anns_todo, &bobs_tag)
            .await
            .unwrap();
        assert!(kept.is_empty());
        assert!(Associations::new(&conn)
            .tag_ids_for_todo(ann, anns_todo)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn failed_insert_keeps_previous_set() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let owner = seed_account(&conn, "ann").await;
        let ids = TagStore::new(&conn)
            .resolve_or_create(owner, &["old", "new", "poison"])
            .await
            .unwrap();
        let (old, new, poison) = (ids[0], ids[1], ids[2]);
        let todo = seed_todo(&conn, owner, "Report").await;

        let links = Associations::new(&conn);
        links.replace(owner, todo, &[old]).await.unwrap();

        // Make inserting the third tag blow up after the delete has run.
        conn.execute(
            &format!(
                "CREATE TRIGGER fail_poison BEFORE INSERT ON todo_tags
                 WHEN NEW.tag_id = {poison}
                 BEGIN SELECT RAISE(ABORT, 'forced failure'); END"
            ),
            (),
        )
        .await
        .unwrap();

        let result = links.replace(owner, todo, &[new, poison]).await;
        assert!(result.is_err());
        assert_eq!(links.tag_ids_for_todo(owner, todo).await.unwrap(), set(&[old]));
    }

    #[tokio::test]
    async fn todo_ids_for_tags_uses_or() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let owner = seed_account(&conn, "ann").await;
        let ids = TagStore::new(&conn)
            .resolve_or_create(owner, &["a", "b", "c"])
            .await
            .unwrap();
        let t1 = seed_todo(&conn, owner, "one").await;
        let t2 = seed_todo(&conn, owner, "two").await;
        let t3 = seed_todo(&conn, owner, "three").await;

        let links = Associations::new(&conn);
        links.replace(owner, t1, &[ids[0]]).await.unwrap();
        links.replace(owner, t2, &[ids[1], ids[2]]).await.unwrap();
        links.replace(owner, t3, &[ids[2]]).await.unwrap();

        let hits = links
            .todo_ids_for_tags(owner, &set(&[ids[0], ids[1]]))
            .await
            .unwrap();
        assert_eq!(hits, set(&[t1, t2]));
        assert!(links.todo_ids_for_tags(owner, &BTreeSet::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_tag_removes_links() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let owner = seed_account(&conn, "ann").await;
        let tags = TagStore::new(&conn);
        let ids = tags.resolve_or_create(owner, &["a", "b"]).await.unwrap();
        let t1 = seed_todo(&conn, owner, "one").await;
        let t2 = seed_todo(&conn, owner, "two").await;

        let links = Associations::new(&conn);
        links.replace(owner, t1, &ids).await.unwrap();
        links.replace(owner, t2, &[ids[0]]).await.unwrap();

        assert!(tags.delete(owner, ids[0]).await.unwrap());
        assert_eq!(links.tag_ids_for_todo(owner, t1).await.unwrap(), set(&[ids[1]]));
        assert!(links.tag_ids_for_todo(owner, t2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn links_are_grouped_by_todo() {
        let store = Store::new_memory().await.unwrap();
        let conn = store.conn().await;
        let owner = seed_account(&conn, "ann").await;
        let ids = TagStore::new(&conn)
            .resolve_or_create(owner, &["a", "b"])
            .await
            .unwrap();
        let t1 = seed_todo(&conn, owner, "one").await;

        let links = Associations::new(&conn);
        links.replace(owner, t1, &ids).await.unwrap();
        let grouped = links.links_for_owner(owner).await.unwrap();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[&t1], set(&ids));

        assert_eq!(links.delete_all_for_todo(owner, t1).await.unwrap(), 2);
        assert!(links.links_for_owner(owner).await.unwrap().is_empty());
    }
}
