//! Query composition — the filtered, tag-scoped, sorted view of one owner's
//! todos, and the resolution of the parameters that drive it.

use std::collections::BTreeSet;

use libsql::Connection;
use serde::{Deserialize, Serialize};

use super::model::TodoView;
use super::repo::TodoRepository;
use crate::error::DatabaseError;
use crate::tags::{Associations, Tag, TagStore};

/// Completion filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    #[default]
    All,
    Complete,
    Incomplete,
}

impl Filter {
    /// Parse leniently: anything unrecognized is `All`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "complete" => Filter::Complete,
            "incomplete" => Filter::Incomplete,
            _ => Filter::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Filter::All => "all",
            Filter::Complete => "complete",
            Filter::Incomplete => "incomplete",
        }
    }

    fn keeps(&self, completed: bool) -> bool {
        match self {
            Filter::All => true,
            Filter::Complete => completed,
            Filter::Incomplete => !completed,
        }
    }
}

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    NameAsc,
    NameDesc,
    Status,
}

impl SortOrder {
    /// Parse leniently: anything unrecognized is `Newest`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "oldest" => SortOrder::Oldest,
            "name_asc" => SortOrder::NameAsc,
            "name_desc" => SortOrder::NameDesc,
            "status" => SortOrder::Status,
            _ => SortOrder::Newest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::Oldest => "oldest",
            SortOrder::NameAsc => "name_asc",
            SortOrder::NameDesc => "name_desc",
            SortOrder::Status => "status",
        }
    }
}

/// View parameters exactly as the request carried them.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewQuery {
    pub filter: Option<String>,
    pub sort: Option<String>,
    /// Comma-separated tag ids. Present-but-empty selects no tags.
    pub tags: Option<String>,
}

/// The last effective parameters, remembered per browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewPrefs {
    pub filter: Option<Filter>,
    pub sort: Option<SortOrder>,
    pub tag_ids: Option<BTreeSet<i64>>,
}

/// Filter, sort and tag selection after request values, session fallback
/// and defaults have been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveParams {
    pub filter: Filter,
    pub sort: SortOrder,
    pub tag_ids: BTreeSet<i64>,
}

impl EffectiveParams {
    /// Each parameter comes from the request when present, else from the
    /// session preferences, else the default.
    pub fn resolve(request: &ViewQuery, prefs: &ViewPrefs) -> Self {
        let filter = match request.filter.as_deref() {
            Some(raw) => Filter::normalize(raw),
            None => prefs.filter.unwrap_or_default(),
        };
        let sort = match request.sort.as_deref() {
            Some(raw) => SortOrder::normalize(raw),
            None => prefs.sort.unwrap_or_default(),
        };
        let tag_ids = match request.tags.as_deref() {
            Some(raw) => parse_tag_ids(raw),
            None => prefs.tag_ids.clone().unwrap_or_default(),
        };
        Self {
            filter,
            sort,
            tag_ids,
        }
    }

    /// The preferences to remember for the next request.
    pub fn to_prefs(&self) -> ViewPrefs {
        ViewPrefs {
            filter: Some(self.filter),
            sort: Some(self.sort),
            tag_ids: Some(self.tag_ids.clone()),
        }
    }
}

/// Parse `"1, 2,x,3"` into `{1, 2, 3}`; pieces that are not integers are
/// ignored.
pub fn parse_tag_ids(raw: &str) -> BTreeSet<i64> {
    raw.split(',')
        .filter_map(|piece| piece.trim().parse::<i64>().ok())
        .collect()
}

/// Order views in place. Name orders are case-insensitive and stable, so
/// equal names keep their incoming relative order.
pub fn sort_views(views: &mut [TodoView], sort: SortOrder) {
    match sort {
        SortOrder::Oldest => views.sort_by(|a, b| a.id.cmp(&b.id)),
        SortOrder::Newest => views.sort_by(|a, b| b.id.cmp(&a.id)),
        SortOrder::NameAsc => views.sort_by_cached_key(|v| v.name.to_lowercase()),
        SortOrder::NameDesc => {
            views.sort_by(|a, b| b.name.to_lowercase().cmp(&a.name.to_lowercase()))
        }
        SortOrder::Status => views.sort_by(|a, b| {
            b.completed
                .cmp(&a.completed)
                .then_with(|| b.id.cmp(&a.id))
        }),
    }
}

/// Builds listings by combining the todo, tag and association queries.
/// Read-only.
pub struct QueryComposer<'c> {
    conn: &'c Connection,
}

impl<'c> QueryComposer<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    pub async fn build_view(
        &self,
        owner_id: i64,
        params: &EffectiveParams,
    ) -> Result<Vec<TodoView>, DatabaseError> {
        let links = Associations::new(self.conn);

        let mut todos = TodoRepository::new(self.conn).list_for_owner(owner_id).await?;
        todos.retain(|t| params.filter.keeps(t.completed));

        if !params.tag_ids.is_empty() {
            let matching = links.todo_ids_for_tags(owner_id, &params.tag_ids).await?;
            todos.retain(|t| matching.contains(&t.id));
        }

        let tags = TagStore::new(self.conn).list_for_owner(owner_id).await?;
        let by_todo = links.links_for_owner(owner_id).await?;
        let empty = BTreeSet::new();

        let mut views: Vec<TodoView> = todos
            .into_iter()
            .map(|todo| {
                let linked = by_todo.get(&todo.id).unwrap_or(&empty);
                TodoView::new(todo, tags_in_order(&tags, linked))
            })
            .collect();

        sort_views(&mut views, params.sort);
        Ok(views)
    }

    /// One todo with its tags attached, or `None` when the owner has no such
    /// todo.
    pub async fn view_one(&self, owner_id: i64, todo_id: i64) -> Result<Option<TodoView>, DatabaseError> {
        let Some(todo) = TodoRepository::new(self.conn).get(owner_id, todo_id).await? else {
            return Ok(None);
        };
        let linked = Associations::new(self.conn)
            .tag_ids_for_todo(owner_id, todo_id)
            .await?;
        let tags = TagStore::new(self.conn).list_for_owner(owner_id).await?;
        Ok(Some(TodoView::new(todo, tags_in_order(&tags, &linked))))
    }
}

/// Pick the linked tags out of the owner's name-ordered listing.
fn tags_in_order(all: &[Tag], linked: &BTreeSet<i64>) -> Vec<Tag> {
    if linked.is_empty() {
        return Vec::new();
    }
    all.iter()
        .filter(|t| linked.contains(&t.id))
        .cloned()
        .collect()
}
