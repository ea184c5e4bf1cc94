//! The immutable request view handed to the framework.

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};

use critic_api_core::{ApiError, ApiResult};

use crate::query::QueryString;

/// An immutable view of one API request.
///
/// The HTTP adapter collects the body before dispatch, so reading it never
/// suspends.
///
/// # Example
///
/// ```
/// use critic_api_extract::ApiRequest;
/// use http::Method;
///
/// let request = ApiRequest::new(Method::GET, "/api/v1/users/42?fields=name").unwrap();
/// assert_eq!(request.path(), "/api/v1/users/42");
/// assert_eq!(request.query().get("fields"), Some("name"));
/// ```
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: QueryString,
    headers: HeaderMap,
    body: Bytes,
}

impl ApiRequest {
    /// Creates a request from a method and a URI (path plus optional query).
    ///
    /// # Errors
    ///
    /// Returns a usage error if the URI or its query string cannot be parsed.
    pub fn new(method: Method, uri: &str) -> ApiResult<Self> {
        let uri: Uri = uri
            .parse()
            .map_err(|_| ApiError::usage(format!("Invalid request URI: {uri}")))?;
        Self::from_parts(method, &uri, HeaderMap::new(), Bytes::new())
    }

    /// Creates a request from already split HTTP parts.
    pub fn from_parts(
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> ApiResult<Self> {
        let query = QueryString::parse(uri.query().unwrap_or(""))?;
        Ok(Self {
            method,
            path: uri.path().to_string(),
            query,
            headers,
            body,
        })
    }

    /// Creates a request from an HTTP request whose body has been collected.
    pub fn from_http(request: http::Request<Bytes>) -> ApiResult<Self> {
        let (parts, body) = request.into_parts();
        Self::from_parts(parts.method, &parts.uri, parts.headers, body)
    }

    /// Replaces the request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the full path, without the query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the query parameters.
    #[must_use]
    pub const fn query(&self) -> &QueryString {
        &self.query
    }

    /// Returns the request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the raw body.
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Parses the body as a single JSON document.
    ///
    /// # Errors
    ///
    /// Returns a usage error if the body is not valid JSON.
    pub fn json(&self) -> ApiResult<serde_json::Value> {
        serde_json::from_slice(&self.body)
            .map_err(|error| ApiError::usage(format!("Invalid JSON input: {error}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_splits_path_and_query() {
        let request = ApiRequest::new(Method::GET, "/api/v1/reviews?state=open&count=5").unwrap();
        assert_eq!(request.method(), Method::GET);
        assert_eq!(request.path(), "/api/v1/reviews");
        assert_eq!(request.query().get("state"), Some("open"));
        assert_eq!(request.query().get("count"), Some("5"));
    }

    #[test]
    fn test_json_body() {
        let request = ApiRequest::new(Method::POST, "/api/v1/reviews")
            .unwrap()
            .with_body(r#"{"repository": 5}"#);
        assert_eq!(request.json().unwrap()["repository"], 5);
    }

    #[test]
    fn test_invalid_json_is_usage_error() {
        let request = ApiRequest::new(Method::POST, "/api/v1/reviews")
            .unwrap()
            .with_body("{not json");
        let error = request.json().unwrap_err();
        assert_eq!(error.kind(), critic_api_core::ErrorKind::Usage);
    }

    #[test]
    fn test_from_http() {
        let request = http::Request::builder()
            .method(Method::PUT)
            .uri("/api/v1/users/1?fields=name")
            .body(Bytes::from_static(b"{}"))
            .unwrap();
        let request = ApiRequest::from_http(request).unwrap();
        assert_eq!(request.method(), Method::PUT);
        assert_eq!(request.query().get("fields"), Some("name"));
        assert_eq!(request.body().as_ref(), b"{}");
    }
}
