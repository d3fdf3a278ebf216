//! Database paths

use crate::error::{ApiError, ApiResult};
use std::fmt;

/// Longest key the database accepts, in bytes
const MAX_KEY_BYTES: usize = 768;

/// Characters the database forbids inside a key
const FORBIDDEN: [char; 6] = ['.', '$', '#', '[', ']', '/'];

/// A validated, slash separated location in the database tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// Parse `a/b/c`; leading and trailing slashes are ignored.
    pub fn parse(raw: &str) -> ApiResult<Self> {
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| validate_key(s).map(|()| s.to_string()))
            .collect::<ApiResult<Vec<_>>>()?;

        if segments.is_empty() {
            return Err(ApiError::InvalidPath {
                segment: raw.to_string(),
                reason: "path has no segments",
            });
        }

        Ok(Self { segments })
    }

    /// Path of a direct child
    pub fn child(&self, key: &str) -> ApiResult<Self> {
        validate_key(key)?;
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Ok(Self { segments })
    }

    /// Segments from the root down
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment
    #[must_use]
    pub fn key(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

fn validate_key(key: &str) -> ApiResult<()> {
    let reject = |reason| {
        Err(ApiError::InvalidPath {
            segment: key.to_string(),
            reason,
        })
    };

    if key.is_empty() {
        return reject("key is empty");
    }
    if key.len() > MAX_KEY_BYTES {
        return reject("key is longer than 768 bytes");
    }
    if key.chars().any(|c| FORBIDDEN.contains(&c)) {
        return reject("key contains one of . $ # [ ] /");
    }
    if key.chars().any(char::is_control) {
        return reject("key contains a control character");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = StorePath::parse("/users/a1b2c3/").unwrap();
        assert_eq!(path.segments(), ["users", "a1b2c3"]);
        assert_eq!(path.to_string(), "users/a1b2c3");
        assert_eq!(path.key(), "a1b2c3");
    }

    #[test]
    fn test_child() {
        let path = StorePath::parse("users").unwrap().child("dev").unwrap().child("latitude").unwrap();
        assert_eq!(path.to_string(), "users/dev/latitude");
    }

    #[test]
    fn test_rejects_forbidden_keys() {
        let users = StorePath::parse("users").unwrap();
        assert!(users.child("").is_err());
        assert!(users.child("a.b").is_err());
        assert!(users.child("a/b").is_err());
        assert!(users.child("$id").is_err());
        assert!(users.child("tab\there").is_err());
        assert!(users.child(&"x".repeat(769)).is_err());
        assert!(StorePath::parse("//").is_err());
    }
}
