//! HTTP handlers, one module per resource.
//!
//! Handlers own authorization (role and ownership checks), input
//! normalisation and the cross-row rules (slug resolution, publish-once,
//! reply depth). The repository below them is plain data access.

pub mod admin;
pub mod auth;
pub mod comments;
pub mod hero_posts;
pub mod posts;
pub mod users;

/// Trims a text field and drops it when nothing is left.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// For nullable columns: explicit `null` or a blank string clears the value.
pub(crate) fn nullable_text(value: Option<Option<String>>) -> Option<Option<String>> {
    value.map(non_blank)
}
