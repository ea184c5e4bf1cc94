//! Cookie mutations requested by resources.
//!
//! Resources never write headers themselves. They record cookie changes on
//! the request's [`CookieJar`], and the HTTP adapter renders them as
//! `Set-Cookie` headers once the response is built.

use std::collections::{BTreeMap, BTreeSet};

/// A single `Set-Cookie` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    path: Option<String>,
    max_age: Option<u64>,
    secure: bool,
    http_only: bool,
}

impl SetCookie {
    /// Creates a cookie assignment.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            max_age: None,
            secure: false,
            http_only: false,
        }
    }

    /// Creates a cookie that the client removes (`Max-Age=0`).
    #[must_use]
    pub fn remove(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age_secs(0)
    }

    /// Sets the `Path` attribute.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the `Max-Age` attribute in seconds.
    #[must_use]
    pub const fn max_age_secs(mut self, seconds: u64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    /// Sets the `Secure` attribute.
    #[must_use]
    pub const fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets the `HttpOnly` attribute.
    #[must_use]
    pub const fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Renders the header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];

        if let Some(ref path) = self.path {
            parts.push(format!("Path={path}"));
        }
        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={max_age}"));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }

        parts.join("; ")
    }
}

/// Cookies set or deleted while handling one request.
///
/// A later `set` of a deleted name cancels the deletion and vice versa, so
/// the jar always renders at most one header per name.
///
/// # Example
///
/// ```rust
/// use critic_api_extract::CookieJar;
///
/// let mut jar = CookieJar::new();
/// jar.set("sid", "abc", true);
/// jar.delete("has_sid");
///
/// let headers = jar.to_set_cookie_headers();
/// assert_eq!(headers, vec![
///     "sid=abc; Path=/; Secure; HttpOnly".to_string(),
///     "has_sid=; Path=/; Max-Age=0".to_string(),
/// ]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    set: BTreeMap<String, (String, bool)>,
    deleted: BTreeSet<String>,
}

impl CookieJar {
    /// Creates an empty jar.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a cookie assignment.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>, secure: bool) {
        let name = name.into();
        self.deleted.remove(&name);
        self.set.insert(name, (value.into(), secure));
    }

    /// Records a cookie deletion.
    pub fn delete(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.set.remove(&name);
        self.deleted.insert(name);
    }

    /// Returns `true` if no cookie was touched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.deleted.is_empty()
    }

    /// Returns the value most recently set for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.set.get(name).map(|(value, _)| value.as_str())
    }

    /// Returns `true` if `name` is scheduled for deletion.
    #[must_use]
    pub fn is_deleted(&self, name: &str) -> bool {
        self.deleted.contains(name)
    }

    /// Returns the recorded changes as `Set-Cookie` entries.
    #[must_use]
    pub fn to_set_cookies(&self) -> Vec<SetCookie> {
        let assigned = self.set.iter().map(|(name, (value, secure))| {
            SetCookie::new(name.clone(), value.clone())
                .path("/")
                .secure(*secure)
                .http_only(true)
        });
        let removed = self
            .deleted
            .iter()
            .map(|name| SetCookie::remove(name.clone()).path("/"));
        assigned.chain(removed).collect()
    }

    /// Renders the recorded changes as `Set-Cookie` header values.
    #[must_use]
    pub fn to_set_cookie_headers(&self) -> Vec<String> {
        self.to_set_cookies()
            .iter()
            .map(SetCookie::to_header_value)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_simple() {
        let cookie = SetCookie::new("sid", "abc");
        assert_eq!(cookie.to_header_value(), "sid=abc");
        assert_eq!(cookie.name(), "sid");
        assert_eq!(cookie.value(), "abc");
    }

    #[test]
    fn test_set_cookie_remove() {
        let cookie = SetCookie::remove("sid");
        assert_eq!(cookie.to_header_value(), "sid=; Max-Age=0");
    }

    #[test]
    fn test_empty_jar() {
        let jar = CookieJar::new();
        assert!(jar.is_empty());
        assert!(jar.to_set_cookie_headers().is_empty());
    }

    #[test]
    fn test_delete_cancels_set() {
        let mut jar = CookieJar::new();
        jar.set("sid", "abc", false);
        jar.delete("sid");
        assert_eq!(jar.get("sid"), None);
        assert!(jar.is_deleted("sid"));
        assert_eq!(jar.to_set_cookie_headers(), vec!["sid=; Path=/; Max-Age=0"]);
    }

    #[test]
    fn test_set_cancels_delete() {
        let mut jar = CookieJar::new();
        jar.delete("sid");
        jar.set("sid", "xyz", false);
        assert!(!jar.is_deleted("sid"));
        assert_eq!(jar.get("sid"), Some("xyz"));
        assert_eq!(jar.to_set_cookie_headers(), vec!["sid=xyz; Path=/; HttpOnly"]);
    }
}
