//! Object key derivation for uploaded assets.
//!
//! Default keys are `{sanitized_stem}_{millis}` so repeated uploads of the
//! same file never collide. Callers that need a stable address (overwriting
//! a profile image, for example) pass an explicit key instead, and explicit
//! keys always win.

use chrono::{DateTime, Utc};

/// Strip the extension from a file name and sanitize the stem to the
/// character set `[A-Za-z0-9-_]`. Every other character becomes `_`.
pub fn sanitize_stem(file_name: &str) -> String {
    let stem = match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(idx) => &file_name[..idx],
    };

    stem.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Derive the default object key for a file uploaded at `now`.
pub fn object_key(file_name: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", sanitize_stem(file_name), now.timestamp_millis())
}
