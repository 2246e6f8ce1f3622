//! Tag data model and input normalization.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::TodoError;

/// Color given to tags created without one.
pub const DEFAULT_TAG_COLOR: &str = "#6c757d";

static HEX_COLOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#?([0-9a-fA-F]{6}|[0-9a-fA-F]{3})$").unwrap());

/// A named, colored label owned by one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// Case-insensitive identity of a tag name within one owner.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Trim a tag name, rejecting names that are empty afterwards.
pub fn normalize_name(raw: &str) -> Result<String, TodoError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(TodoError::validation("Tag name must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// Normalize user color input to lowercase `#rrggbb`.
///
/// Missing or blank input yields [`DEFAULT_TAG_COLOR`]; anything that is not
/// a 3- or 6-digit hex color is rejected.
pub fn normalize_color(raw: Option<&str>) -> Result<String, TodoError> {
    let trimmed = raw.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Ok(DEFAULT_TAG_COLOR.to_string());
    }

    let caps = HEX_COLOR
        .captures(trimmed)
        .ok_or_else(|| TodoError::validation(format!("Invalid color: {trimmed}")))?;
    let digits = caps[1].to_lowercase();
    if digits.len() == 3 {
        let expanded: String = digits.chars().flat_map(|c| [c, c]).collect();
        Ok(format!("#{expanded}"))
    } else {
        Ok(format!("#{digits}"))
    }
}

/// Color to display for a stored value; null or blank falls back to the
/// default.
pub fn display_color(stored: Option<String>) -> String {
    stored
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string())
}

/// Split free-text tag input on commas. Blank pieces are kept for
/// `resolve_or_create`, which skips them.
pub fn split_tag_input(input: &str) -> Vec<String> {
    input.split(',').map(|s| s.to_string()).collect()
}
