//! The request dispatcher.

use std::sync::Arc;
use std::time::Instant;

use http::{Method, StatusCode};
use tracing::{error, info, info_span, warn, Instrument};

use critic_api_core::{ApiError, ApiResult, Critic, RequestId};
use critic_api_extract::{ApiRequest, DebugFlags};
use critic_api_router::{ParameterDefaults, Parameters, Registry};

use crate::finalize::{finalize, Outcome};
use crate::resolver::resolve;
use crate::response::ApiResponse;

/// Default cap on request bodies.
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct ApiOptions {
    /// Path prefix the API is mounted under.
    pub prefix: String,
    /// Defaults for framework parameters.
    pub defaults: ParameterDefaults,
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            prefix: "/api".to_string(),
            defaults: ParameterDefaults::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Dispatches API requests against a registry.
///
/// Cloning is cheap; clones share the registry.
///
/// # Example
///
/// ```rust,ignore
/// use critic_api_extract::ApiRequest;
/// use critic_api_server::Api;
/// use http::Method;
///
/// let api = Api::new(registry);
/// let request = ApiRequest::new(Method::GET, "/api/v1/users/1")?;
/// let response = api.handle(critic, &request).await;
/// assert_eq!(response.status(), 200);
/// ```
#[derive(Debug, Clone)]
pub struct Api {
    registry: Arc<Registry>,
    options: Arc<ApiOptions>,
}

impl Api {
    /// Creates a dispatcher with default options.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        Self::with_options(registry, ApiOptions::default())
    }

    /// Creates a dispatcher with explicit options.
    #[must_use]
    pub fn with_options(registry: Arc<Registry>, options: ApiOptions) -> Self {
        Self {
            registry,
            options: Arc::new(options),
        }
    }

    /// The registry requests are resolved against.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// The dispatcher settings.
    #[must_use]
    pub fn options(&self) -> &ApiOptions {
        &self.options
    }

    /// Handles one request on behalf of `critic`.
    ///
    /// Never fails: errors are rendered as error envelopes.
    pub async fn handle(&self, critic: Arc<dyn Critic>, request: &ApiRequest) -> ApiResponse {
        let request_id = RequestId::new();
        let span = info_span!(
            "api_request",
            request_id = %request_id,
            method = %request.method(),
            path = request.path(),
        );
        self.dispatch(critic, request, request_id)
            .instrument(span)
            .await
            .with_request_id(request_id)
    }

    async fn dispatch(
        &self,
        critic: Arc<dyn Critic>,
        request: &ApiRequest,
        request_id: RequestId,
    ) -> ApiResponse {
        let started = Instant::now();
        let parameters = match Parameters::new(
            critic,
            Arc::clone(&self.registry),
            request.query().clone(),
            &self.options.defaults,
        ) {
            Ok(parameters) => parameters.with_request_id(request_id),
            Err(error) => return report(&error, started),
        };

        let response = match self.process(&parameters, request).await {
            Ok(Outcome::Json(body)) => ApiResponse::ok(attach_debug(&parameters, body)),
            Ok(Outcome::NoContent) => ApiResponse::no_content(),
            Err(error) => report(&error, started),
        };

        if response.status().is_success() {
            info!(
                status = response.status().as_u16(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "request completed"
            );
        }
        response.with_cookies(parameters.cookies())
    }

    async fn process(&self, parameters: &Parameters, request: &ApiRequest) -> ApiResult<Outcome> {
        let method = request.method();
        let segments = self.segments(request.path())?;
        let (version, rest) = segments
            .split_first()
            .ok_or_else(|| ApiError::usage("Missing API version"))?;
        if *version != self.registry.version() {
            return Err(ApiError::path(format!("Unsupported API version: {version}")));
        }

        if rest.is_empty() {
            return if method == Method::GET {
                Ok(Outcome::Json(self.registry.documentation()))
            } else {
                Err(ApiError::usage(format!(
                    "Invalid {method} request: no resource specified"
                )))
            };
        }

        let body = match *method {
            Method::GET | Method::DELETE => None,
            Method::POST | Method::PUT => {
                if request.body().len() > self.options.max_body_bytes {
                    return Err(ApiError::usage(format!(
                        "Request body exceeds {} bytes",
                        self.options.max_body_bytes
                    )));
                }
                Some(request.json()?)
            }
            _ => return Err(ApiError::usage(format!("Unsupported method: {method}"))),
        };
        let list_body = body.as_ref().is_some_and(serde_json::Value::is_array);

        let phase = parameters.trace().phase("resolve");
        let resolution = resolve(parameters, method, rest, list_body).await?;
        phase.finish();

        finalize(parameters, method, resolution, body.as_ref()).await
    }

    /// Splits the path below the prefix into segments; empty segments,
    /// including a trailing slash, are ignored.
    fn segments<'p>(&self, path: &'p str) -> ApiResult<Vec<&'p str>> {
        let rest = path
            .strip_prefix(self.options.prefix.trim_end_matches('/'))
            .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            .ok_or_else(|| ApiError::path(format!("Invalid API path: {path}")))?;
        Ok(rest.split('/').filter(|segment| !segment.is_empty()).collect())
    }
}

fn report(error: &ApiError, started: Instant) -> ApiResponse {
    let response = ApiResponse::error(error);
    let status = response.status();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if status.is_server_error() {
        error!(status = status.as_u16(), elapsed_ms, error = ?error, "request failed");
    } else if status == StatusCode::ACCEPTED {
        info!(status = status.as_u16(), elapsed_ms, %error, "request delayed");
    } else {
        warn!(status = status.as_u16(), elapsed_ms, %error, "request rejected");
    }
    response
}

fn attach_debug(parameters: &Parameters, mut body: serde_json::Value) -> serde_json::Value {
    let flags = parameters.debug();
    if flags.is_empty() {
        return body;
    }

    let mut debug = serde_json::Map::new();
    if flags.contains(DebugFlags::DBQUERIES) {
        debug.insert(
            DebugFlags::DBQUERIES.to_string(),
            parameters
                .critic()
                .database_queries()
                .unwrap_or(serde_json::Value::Null),
        );
    }
    if flags.contains(DebugFlags::TRACING) {
        debug.insert(DebugFlags::TRACING.to_string(), parameters.trace().to_json());
    }
    if let Some(object) = body.as_object_mut() {
        if !debug.is_empty() {
            object.insert("debug".to_string(), serde_json::Value::Object(debug));
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::testing::{critic, registry};

    async fn call(method: Method, uri: &str, body: Option<&str>) -> ApiResponse {
        call_with(&Api::new(registry()), method, uri, body).await
    }

    async fn call_with(api: &Api, method: Method, uri: &str, body: Option<&str>) -> ApiResponse {
        let mut request = ApiRequest::new(method, uri).unwrap();
        if let Some(body) = body {
            request = request.with_body(body.to_string());
        }
        api.handle(critic(Some(1)), &request).await
    }

    #[tokio::test]
    async fn test_get_single() {
        let response = call(Method::GET, "/api/v1/users/1?fields=name,email", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.body().unwrap(),
            &json!({"users": {"name": "alice", "email": "a@e", "is_partial": true}})
        );
        assert!(response.request_id().is_some());
    }

    #[tokio::test]
    async fn test_trailing_slash_ignored() {
        let response = call(Method::GET, "/api/v1/users/2/", None).await;
        assert_eq!(response.body().unwrap()["users"]["name"], "bob");
    }

    #[tokio::test]
    async fn test_invalid_id_is_path_error_with_hint() {
        let response = call(Method::GET, "/api/v1/reviews/9999", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.body().unwrap();
        assert_eq!(body["error"]["title"], "No such resource");
        assert_eq!(body["invalid"], json!({"reviews": [9999]}));
    }

    #[tokio::test]
    async fn test_version_handling() {
        let response = call(Method::GET, "/api/v2/users", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = call(Method::GET, "/api", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = call(Method::GET, "/elsewhere/v1/users", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_version_documentation() {
        let response = call(Method::GET, "/api/v1", None).await;
        let body = response.body().unwrap();
        assert_eq!(body["version"], "v1");
        assert_eq!(body["resources"]["reviews"]["methods"], json!(["GET", "POST", "DELETE"]));

        let response = call(Method::POST, "/api/v1", Some("{}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_body_rejections() {
        let response = call(Method::POST, "/api/v1/reviews", Some("{not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body().unwrap()["error"]["title"], "Invalid API request");

        let api = Api::with_options(
            registry(),
            ApiOptions {
                max_body_bytes: 8,
                ..ApiOptions::default()
            },
        );
        let response = call_with(
            &api,
            Method::POST,
            "/api/v1/reviews",
            Some(r#"{"summary": "too long for the cap"}"#),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = call(Method::PATCH, "/api/v1/reviews/7", Some("{}")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_delete_has_no_content() {
        let response = call(Method::DELETE, "/api/v1/reviews/8", None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.body().is_none());
    }

    #[tokio::test]
    async fn test_debug_payloads() {
        let response = call(Method::GET, "/api/v1/users/1?debug=tracing,dbqueries", None).await;
        let debug = &response.body().unwrap()["debug"];
        assert!(debug["dbqueries"].is_null());
        let phases: Vec<&str> = debug["tracing"]["phases"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|phase| phase["name"].as_str())
            .collect();
        assert!(phases.contains(&"resolve"));
        assert!(phases.contains(&"reduce"));
    }

    #[tokio::test]
    async fn test_debug_ignored_when_disallowed() {
        let api = Api::with_options(
            registry(),
            ApiOptions {
                defaults: ParameterDefaults {
                    allow_debug: false,
                    ..ParameterDefaults::default()
                },
                ..ApiOptions::default()
            },
        );
        let response = call_with(&api, Method::GET, "/api/v1/users/1?debug=tracing", None).await;
        assert!(response.body().unwrap().get("debug").is_none());
    }

    #[tokio::test]
    async fn test_cookies_attached() {
        let response = call(Method::GET, "/api/v1/sessions/5", None).await;
        assert_eq!(response.cookies().get("session"), Some("5"));
    }
}
