//! In-memory API client.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, Request};

use critic_api_core::{ApiResult, Critic};
use critic_api_extract::ApiRequest;
use critic_api_server::{Api, ApiService, CriticProvider};

use crate::error::TestError;
use crate::response::TestResponse;

/// Sends requests through an [`ApiService`] without a network.
///
/// Requests take the same path as ones accepted by the HTTP server, from
/// `http::Request` parsing to the rendered `http::Response`.
///
/// # Example
///
/// ```ignore
/// use critic_api_test::{fixtures, TestClient};
///
/// let client = fixtures::client(Some(1));
/// let response = client.get("/api/v1/users/42?fields=name").send().await;
/// response.assert_json_field("users.name", &"alice".into());
/// ```
#[must_use]
pub struct TestClient {
    service: ApiService,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client for a service.
    pub fn new(service: ApiService) -> Self {
        Self {
            service,
            default_headers: Vec::new(),
        }
    }

    /// Creates a client whose every request runs against `critic`.
    pub fn with_critic(api: Api, critic: Arc<dyn Critic>) -> Self {
        let provider = move |_: &ApiRequest| -> ApiResult<Arc<dyn Critic>> { Ok(Arc::clone(&critic)) };
        Self::new(ApiService::new(api, provider))
    }

    /// Creates a client with an explicit provider.
    pub fn with_provider(api: Api, provider: impl CriticProvider) -> Self {
        Self::new(ApiService::new(api, provider))
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// The wrapped service.
    #[must_use]
    pub const fn service(&self) -> &ApiService {
        &self.service
    }

    /// Starts a `GET` request.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Starts a `POST` request.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Starts a `PUT` request.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Starts a `DELETE` request.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Starts a request with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        let mut builder = Request::builder().method(method).uri(uri.as_ref());
        for (name, value) in &self.default_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        TestClientRequest {
            client: self,
            builder,
            body: Bytes::new(),
            error: None,
        }
    }

    async fn send_internal(&self, request: Request<Bytes>) -> Result<TestResponse, TestError> {
        TestResponse::from_http(self.service.call(request).await).await
    }
}

impl std::fmt::Debug for TestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestClient")
            .field("service", &self.service)
            .field("default_headers", &self.default_headers)
            .finish()
    }
}

/// A request being built by a [`TestClient`].
#[must_use]
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: http::request::Builder,
    body: Bytes,
    error: Option<TestError>,
}

impl TestClientRequest<'_> {
    /// Sets a header.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name.as_ref(), value.as_ref());
        self
    }

    /// Sets the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body and its content type.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => {
                self.body = Bytes::from(body);
                self.header("content-type", "application/json")
            }
            Err(error) => {
                self.error = Some(TestError::Json(error));
                self
            }
        }
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(self) -> TestResponse {
        self.try_send().await.expect("request should succeed")
    }

    /// Sends the request, reporting build and read failures.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let request = self
            .builder
            .body(self.body)
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;
        self.client.send_internal(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use critic_api_core::ApiError;
    use http::StatusCode;
    use serde_json::json;

    use crate::fixtures;

    #[tokio::test]
    async fn test_get_through_service() {
        let client = fixtures::client(Some(1));
        let response = client.get("/api/v1/users/1").send().await;
        response
            .assert_status(StatusCode::OK)
            .assert_json_content_type()
            .assert_json_field("users.name", &json!("erin"));
        assert!(response.request_id().is_some());
    }

    #[tokio::test]
    async fn test_invalid_uri_reported() {
        let client = fixtures::client(None);
        let result = client.get("not a uri").try_send().await;
        assert!(matches!(result, Err(TestError::RequestBuild(_))));
    }

    #[tokio::test]
    async fn test_default_headers_reach_provider() {
        let api = Api::new(fixtures::registry());
        let provider = |request: &ApiRequest| -> ApiResult<Arc<dyn Critic>> {
            match request.headers().get("x-token") {
                Some(_) => Ok(fixtures::critic(Some(1))),
                None => Err(ApiError::permission("Missing token")),
            }
        };
        let client = TestClient::with_provider(api.clone(), provider);
        client
            .get("/api/v1/users")
            .send()
            .await
            .assert_error(StatusCode::FORBIDDEN, "Permission denied");

        let client = TestClient::with_provider(api, provider).with_default_header("x-token", "t");
        client.get("/api/v1/users").send().await.assert_success();
    }
}
