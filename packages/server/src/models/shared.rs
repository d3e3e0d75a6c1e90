use std::collections::BTreeMap;

use executor::languages;
use serde::{Deserialize, Deserializer};

use crate::error::AppError;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TEXT_BYTES: usize = 1_000_000;
pub const MAX_TAGS: usize = 32;

/// Serde helper for PATCH semantics on nullable fields.
///
/// * JSON field absent  => `None`          (don't update)
/// * JSON field = null  => `Some(None)`    (set to NULL)
/// * JSON field = value => `Some(Some(v))` (set to value)
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// Validate a trimmed title (1-200 Unicode characters).
pub fn validate_title(title: &str) -> Result<(), AppError> {
    let title = title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Title must be 1-{MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(())
}

pub fn validate_text(value: &str, field: &str, required: bool) -> Result<(), AppError> {
    if required && value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if value.len() > MAX_TEXT_BYTES {
        return Err(AppError::Validation(format!("{field} must be at most 1MB")));
    }
    Ok(())
}

/// Validate an optional position field (must be >= 0 when present).
pub fn validate_optional_position(pos: Option<i32>) -> Result<(), AppError> {
    if let Some(pos) = pos
        && pos < 0
    {
        return Err(AppError::Validation("Position must be >= 0".into()));
    }
    Ok(())
}

/// Time caps are milliseconds in `1..=30000`, memory caps megabytes in `1..=1024`.
pub fn validate_limits(time_limit: Option<i32>, memory_limit: Option<i32>) -> Result<(), AppError> {
    if let Some(tl) = time_limit
        && !(1..=30_000).contains(&tl)
    {
        return Err(AppError::Validation("Time limit must be 1-30000 ms".into()));
    }
    if let Some(ml) = memory_limit
        && !(1..=1024).contains(&ml)
    {
        return Err(AppError::Validation("Memory limit must be 1-1024 MB".into()));
    }
    Ok(())
}

/// Every id must name a registered language.
pub fn validate_languages(ids: &[String]) -> Result<(), AppError> {
    match ids.iter().find(|id| !languages::is_registered(id)) {
        Some(unknown) => Err(AppError::UnsupportedLanguage(unknown.clone())),
        None => Ok(()),
    }
}

pub fn validate_initial_code(code: &BTreeMap<String, String>) -> Result<(), AppError> {
    match code.keys().find(|id| !languages::is_registered(id)) {
        Some(unknown) => Err(AppError::UnsupportedLanguage(unknown.clone())),
        None => Ok(()),
    }
}

pub fn validate_tags(tags: &[String]) -> Result<(), AppError> {
    if tags.len() > MAX_TAGS {
        return Err(AppError::Validation(format!("At most {MAX_TAGS} tags allowed")));
    }
    if tags.iter().any(|t| t.trim().is_empty() || t.chars().count() > 50) {
        return Err(AppError::Validation("Tags must be 1-50 characters".into()));
    }
    Ok(())
}

/// Trim each tag and drop duplicates, keeping first occurrence.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_string();
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}
