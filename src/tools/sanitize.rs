//! Tool name sanitization.
//!
//! Backends accept tool names matching `[A-Za-z0-9_-]{1,64}`. Every other
//! character becomes `_`, an empty result becomes `tool`, and names are cut
//! to 64 characters. [`ToolNameTable`] keeps the per-request mapping back to
//! the original names and refuses collisions.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::SwitchyardError;

pub const MAX_TOOL_NAME_LEN: usize = 64;
const FALLBACK_NAME: &str = "tool";

static INVALID_CHARS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_-]").expect("tool name sanitization regex must compile")
});

/// Normalize an arbitrary identifier into a backend-safe tool name.
pub fn sanitize_tool_name(name: &str) -> String {
    let replaced = INVALID_CHARS_RE.replace_all(name, "_");
    if replaced.is_empty() {
        return FALLBACK_NAME.to_string();
    }
    replaced.chars().take(MAX_TOOL_NAME_LEN).collect()
}

/// Bijective sanitized ↔ original mapping for one request.
#[derive(Debug, Clone, Default)]
pub struct ToolNameTable {
    to_original: HashMap<String, String>,
    to_sanitized: HashMap<String, String>,
}

impl ToolNameTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `original`, returning its sanitized name.
    ///
    /// Re-registering the same original is a no-op. Two distinct originals
    /// that sanitize to the same name fail with a validation error.
    pub fn insert(&mut self, original: &str) -> Result<String, SwitchyardError> {
        if let Some(existing) = self.to_sanitized.get(original) {
            return Ok(existing.clone());
        }
        let sanitized = sanitize_tool_name(original);
        if let Some(other) = self.to_original.get(&sanitized) {
            return Err(SwitchyardError::Validation(format!(
                "tool names '{other}' and '{original}' both sanitize to '{sanitized}'"
            )));
        }
        self.to_original
            .insert(sanitized.clone(), original.to_string());
        self.to_sanitized
            .insert(original.to_string(), sanitized.clone());
        Ok(sanitized)
    }

    pub fn original(&self, sanitized: &str) -> Option<&str> {
        self.to_original.get(sanitized).map(String::as_str)
    }

    pub fn sanitized(&self, original: &str) -> Option<&str> {
        self.to_sanitized.get(original).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.to_original.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_original.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_each_invalid_character() {
        assert_eq!(sanitize_tool_name("tool/name?"), "tool_name_");
        assert_eq!(sanitize_tool_name("ok-name_1"), "ok-name_1");
        assert_eq!(sanitize_tool_name("émoji 🙂"), "_moji__");
    }

    #[test]
    fn empty_name_falls_back() {
        assert_eq!(sanitize_tool_name(""), "tool");
    }

    #[test]
    fn long_names_truncate_to_limit() {
        let long = "a".repeat(100);
        assert_eq!(sanitize_tool_name(&long).len(), MAX_TOOL_NAME_LEN);
    }

    #[test]
    fn table_maps_both_directions() {
        let mut table = ToolNameTable::new();
        let s = table.insert("files/read").unwrap();
        assert_eq!(s, "files_read");
        assert_eq!(table.original("files_read"), Some("files/read"));
        assert_eq!(table.sanitized("files/read"), Some("files_read"));
        assert_eq!(table.insert("files/read").unwrap(), "files_read");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn table_rejects_collisions_between_distinct_names() {
        let mut table = ToolNameTable::new();
        table.insert("a/b").unwrap();
        let err = table.insert("a?b").unwrap_err();
        assert!(matches!(err, SwitchyardError::Validation(_)));
    }
}
