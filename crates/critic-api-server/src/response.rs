//! API responses and their HTTP rendering.

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, SET_COOKIE};
use http::{Response, StatusCode};
use http_body_util::Full;
use tracing::warn;

use critic_api_core::{ApiError, RequestId};
use critic_api_extract::CookieJar;

/// HTTP response body type.
pub type ResponseBody = Full<Bytes>;

/// HTTP response type produced by the adapter.
pub type HttpResponse = Response<ResponseBody>;

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// The result of handling one API request.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: Option<serde_json::Value>,
    cookies: CookieJar,
    request_id: Option<RequestId>,
}

impl ApiResponse {
    /// A `200 OK` response with a JSON body.
    #[must_use]
    pub fn ok(body: serde_json::Value) -> Self {
        Self::new(StatusCode::OK, Some(body))
    }

    /// A `204 No Content` response.
    #[must_use]
    pub fn no_content() -> Self {
        Self::new(StatusCode::NO_CONTENT, None)
    }

    /// The error envelope for `error`, with its kind's status.
    #[must_use]
    pub fn error(error: &ApiError) -> Self {
        let body = serde_json::to_value(error.to_envelope()).unwrap_or_else(|_| {
            serde_json::json!({"error": {"title": error.kind().title(), "message": "", "code": null}})
        });
        Self::new(error.status_code(), Some(body))
    }

    fn new(status: StatusCode, body: Option<serde_json::Value>) -> Self {
        Self {
            status,
            body,
            cookies: CookieJar::default(),
            request_id: None,
        }
    }

    /// Attaches cookie changes.
    #[must_use]
    pub fn with_cookies(mut self, cookies: CookieJar) -> Self {
        self.cookies = cookies;
        self
    }

    /// Attaches the request id.
    #[must_use]
    pub const fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    /// The HTTP status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// The JSON body, absent for `204`.
    #[must_use]
    pub const fn body(&self) -> Option<&serde_json::Value> {
        self.body.as_ref()
    }

    /// Cookie changes to send.
    #[must_use]
    pub const fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    /// The id of the request this answers.
    #[must_use]
    pub const fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    /// Renders the HTTP response.
    #[must_use]
    pub fn into_http(self) -> HttpResponse {
        let body = self
            .body
            .as_ref()
            .map_or_else(Bytes::new, |body| Bytes::from(body.to_string()));

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        if self.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(request_id) = self.request_id {
            if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                headers.insert(REQUEST_ID_HEADER, value);
            }
        }
        for cookie in self.cookies.to_set_cookie_headers() {
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    headers.append(SET_COOKIE, value);
                }
                Err(error) => warn!(%error, "dropping unrepresentable cookie"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn body_text(response: HttpResponse) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_ok_renders_json() {
        let request_id = RequestId::new();
        let response = ApiResponse::ok(json!({"users": []}))
            .with_request_id(request_id)
            .into_http();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            response.headers()[REQUEST_ID_HEADER],
            request_id.to_string().as_str()
        );
        assert_eq!(body_text(response).await, r#"{"users":[]}"#);
    }

    #[tokio::test]
    async fn test_no_content_has_empty_body() {
        let response = ApiResponse::no_content().into_http();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
        assert!(body_text(response).await.is_empty());
    }

    #[test]
    fn test_error_uses_envelope() {
        let response = ApiResponse::error(&ApiError::delayed("Changeset not ready"));
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            response.body().unwrap(),
            &json!({"error": {
                "title": "Resource temporarily unavailable",
                "message": "Changeset not ready",
                "code": null
            }})
        );
    }

    #[test]
    fn test_cookies_become_headers() {
        let mut cookies = CookieJar::default();
        cookies.set("sid", "abc", true);
        cookies.delete("old");
        let response = ApiResponse::no_content().with_cookies(cookies).into_http();
        assert_eq!(response.headers().get_all(SET_COOKIE).iter().count(), 2);
    }
}
