//! TagStore — per-owner tag records with case-insensitive identity.

use std::collections::BTreeSet;

use libsql::{Connection, params};
use tracing::debug;

use super::associations::Associations;
use super::model::{DEFAULT_TAG_COLOR, Tag, display_color, name_key};
use crate::error::DatabaseError;
use crate::store::atomically;

/// Tag queries over a borrowed connection.
pub struct TagStore<'c> {
    conn: &'c Connection,
}

impl<'c> TagStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Map raw tag names to tag ids, creating missing tags with the default
    /// color.
    ///
    /// Names are trimmed and blank ones skipped. Output follows input order
    /// and is not deduplicated: `["Work", "work"]` yields the same id twice.
    pub async fn resolve_or_create<S: AsRef<str>>(
        &self,
        owner_id: i64,
        names: &[S],
    ) -> Result<Vec<i64>, DatabaseError> {
        let mut ids = Vec::with_capacity(names.len());
        for raw in names {
            let name = raw.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            let (tag, _) = self.get_or_insert(owner_id, name, DEFAULT_TAG_COLOR).await?;
            ids.push(tag.id);
        }
        Ok(ids)
    }

    /// Return the owner's tag matching `name` case-insensitively, or insert
    /// it with `color`. The flag is true when a row was inserted.
    ///
    /// A concurrent insert of the same name hits the `(owner_id, name_key)`
    /// unique key, is ignored, and the re-read picks up the winner's row.
    pub async fn get_or_insert(
        &self,
        owner_id: i64,
        name: &str,
        color: &str,
    ) -> Result<(Tag, bool), DatabaseError> {
        let key = name_key(name);
        if let Some(tag) = self.find_by_key(owner_id, &key).await? {
            return Ok((tag, false));
        }

        let inserted = self
            .conn
            .execute(
                "INSERT INTO tags (owner_id, name, name_key, color) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (owner_id, name_key) DO NOTHING",
                params![owner_id, name, key.as_str(), color],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("insert_tag", e))?;

        if inserted > 0 {
            let id = self.conn.last_insert_rowid();
            debug!(owner_id, tag_id = id, name, "Tag created");
            return Ok((
                Tag {
                    id,
                    name: name.to_string(),
                    color: color.to_string(),
                },
                true,
            ));
        }

        let tag = self.find_by_key(owner_id, &key).await?.ok_or_else(|| {
            DatabaseError::Query(format!("insert_tag: tag '{name}' vanished after conflict"))
        })?;
        Ok((tag, false))
    }

    /// All of the owner's tags ordered by name, case-insensitively.
    pub async fn list_for_owner(&self, owner_id: i64) -> Result<Vec<Tag>, DatabaseError> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, name, color FROM tags WHERE owner_id = ?1 ORDER BY name_key ASC, id ASC",
                params![owner_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("list_tags", e))?;

        let mut tags = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_tags row: {e}")))?
        {
            tags.push(row_to_tag(&row)?);
        }
        Ok(tags)
    }

    pub async fn get(&self, owner_id: i64, tag_id: i64) -> Result<Option<Tag>, DatabaseError> {
        self.fetch_one(
            "get_tag",
            "SELECT id, name, color FROM tags WHERE id = ?1 AND owner_id = ?2",
            params![tag_id, owner_id],
        )
        .await
    }

    async fn find_by_key(&self, owner_id: i64, key: &str) -> Result<Option<Tag>, DatabaseError> {
        self.fetch_one(
            "find_tag",
            "SELECT id, name, color FROM tags WHERE owner_id = ?1 AND name_key = ?2",
            params![owner_id, key],
        )
        .await
    }

    /// Ids of every tag the owner has.
    pub async fn owned_ids(&self, owner_id: i64) -> Result<BTreeSet<i64>, DatabaseError> {
        let mut rows = self
            .conn
            .query("SELECT id FROM tags WHERE owner_id = ?1", params![owner_id])
            .await
            .map_err(|e| DatabaseError::from_libsql("owned_tag_ids", e))?;

        let mut ids = BTreeSet::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("owned_tag_ids row: {e}")))?
        {
            ids.insert(
                row.get::<i64>(0)
                    .map_err(|e| DatabaseError::Query(format!("tag.id: {e}")))?,
            );
        }
        Ok(ids)
    }

    /// Change a tag's name and color. Returns false, changing nothing, when
    /// the tag does not exist for this owner.
    ///
    /// Callers pass an already-normalized name and color. Renaming onto
    /// another of the owner's tag names is a UNIQUE violation.
    pub async fn rename(
        &self,
        owner_id: i64,
        tag_id: i64,
        new_name: &str,
        new_color: &str,
    ) -> Result<bool, DatabaseError> {
        let color = if new_color.trim().is_empty() {
            DEFAULT_TAG_COLOR
        } else {
            new_color
        };
        let count = self
            .conn
            .execute(
                "UPDATE tags SET name = ?1, name_key = ?2, color = ?3 WHERE id = ?4 AND owner_id = ?5",
                params![new_name, name_key(new_name), color, tag_id, owner_id],
            )
            .await
            .map_err(|e| DatabaseError::from_libsql("rename_tag", e))?;
        if count > 0 {
            debug!(owner_id, tag_id, name = new_name, "Tag renamed");
        }
        Ok(count > 0)
    }

    /// Delete a tag and every association pointing at it, atomically.
    /// Returns false when the tag does not exist for this owner.
    pub async fn delete(&self, owner_id: i64, tag_id: i64) -> Result<bool, DatabaseError> {
        atomically(self.conn, "delete_tag", async {
            let unlinked = Associations::new(self.conn)
                .delete_all_for_tag(owner_id, tag_id)
                .await?;
            let count = self
                .conn
                .execute(
                    "DELETE FROM tags WHERE id = ?1 AND owner_id = ?2",
                    params![tag_id, owner_id],
                )
                .await
                .map_err(|e| DatabaseError::from_libsql("delete_tag", e))?;
            if count > 0 {
                debug!(owner_id, tag_id, unlinked, "Tag deleted");
            }
            Ok(count > 0)
        })
        .await
    }

    async fn fetch_one(
        &self,
        op: &str,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Option<Tag>, DatabaseError> {
        let mut rows = self
            .conn
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::from_libsql(op, e))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(row_to_tag(&row)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(DatabaseError::Query(format!("{op} row: {e}"))),
        }
    }
}

/// Map a row of `id, name, color` to a [`Tag`].
fn row_to_tag(row: &libsql::Row) -> Result<Tag, DatabaseError> {
    Ok(Tag {
        id: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("tag.id: {e}")))?,
        name: row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("tag.name: {e}")))?,
        color: display_color(row.get::<String>(2).ok()),
    })
}
