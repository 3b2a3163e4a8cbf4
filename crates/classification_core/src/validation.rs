//! crates/classification_core/src/validation.rs
//!
//! Field-level input checks. Each function trims its input and returns the
//! cleaned value, or a `CoreError::Validation` naming the offending field.

use crate::error::{CoreError, CoreResult};

pub const CATEGORY_NAME_MAX: usize = 100;
pub const MATERIAL_TITLE_MAX: usize = 200;
pub const MATERIAL_AUTHOR_MAX: usize = 100;
/// The most characters a single spreadsheet cell can hold.
pub const SEGMENT_CONTENT_MAX: usize = 32_767;
pub const USERNAME_MIN: usize = 3;
pub const PASSWORD_MIN: usize = 6;

fn bounded_text(field: &'static str, value: &str, max: usize) -> CoreResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation(field, "must not be empty"));
    }
    // Lengths are counted in characters, not bytes: names are mostly Arabic.
    let len = trimmed.chars().count();
    if len > max {
        return Err(CoreError::validation(
            field,
            format!("must be at most {} characters, got {}", max, len),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn category_name(name: &str) -> CoreResult<String> {
    bounded_text("name", name, CATEGORY_NAME_MAX)
}

pub fn material_title(title: &str) -> CoreResult<String> {
    bounded_text("title", title, MATERIAL_TITLE_MAX)
}

pub fn material_author(author: &str) -> CoreResult<String> {
    bounded_text("author", author, MATERIAL_AUTHOR_MAX)
}

pub fn segment_content(content: &str) -> CoreResult<String> {
    bounded_text("content", content, SEGMENT_CONTENT_MAX)
}

pub fn page_number(page: i32) -> CoreResult<i32> {
    if page < 1 {
        return Err(CoreError::validation(
            "page_number",
            format!("must be 1 or greater, got {}", page),
        ));
    }
    Ok(page)
}

pub fn username(username: &str) -> CoreResult<String> {
    let trimmed = username.trim();
    if trimmed.chars().count() < USERNAME_MIN {
        return Err(CoreError::validation(
            "username",
            format!("must be at least {} characters", USERNAME_MIN),
        ));
    }
    Ok(trimmed.to_string())
}

pub fn password(password: &str) -> CoreResult<()> {
    if password.chars().count() < PASSWORD_MIN {
        return Err(CoreError::validation(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN),
        ));
    }
    Ok(())
}
