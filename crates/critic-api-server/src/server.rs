//! The hyper HTTP/1 adapter.
//!
//! Each connection is served on its own task. Request bodies are collected
//! up to the API's body cap before dispatch, and the host's
//! [`CriticProvider`] supplies the domain handle per request.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::Request;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use critic_api_core::{ApiError, ApiResult, Critic};
use critic_api_extract::ApiRequest;

use crate::api::Api;
use crate::response::{ApiResponse, HttpResponse};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Default time to wait for open connections after shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that stop the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The address could not be parsed.
    #[error("invalid listen address {0:?}")]
    InvalidAddress(String),

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The requested address.
        addr: SocketAddr,
        /// The bind failure.
        #[source]
        source: std::io::Error,
    },

    /// The listener failed.
    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the domain handle a request runs against, typically after
/// authenticating it.
#[async_trait]
pub trait CriticProvider: Send + Sync + 'static {
    /// The handle for `request`. Errors are rendered as error envelopes.
    async fn critic(&self, request: &ApiRequest) -> ApiResult<Arc<dyn Critic>>;
}

#[async_trait]
impl<F> CriticProvider for F
where
    F: Fn(&ApiRequest) -> ApiResult<Arc<dyn Critic>> + Send + Sync + 'static,
{
    async fn critic(&self, request: &ApiRequest) -> ApiResult<Arc<dyn Critic>> {
        self(request)
    }
}

/// Turns collected HTTP requests into HTTP responses.
#[derive(Clone)]
pub struct ApiService {
    api: Api,
    provider: Arc<dyn CriticProvider>,
}

impl std::fmt::Debug for ApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiService").field("api", &self.api).finish_non_exhaustive()
    }
}

impl ApiService {
    /// Creates a service.
    pub fn new(api: Api, provider: impl CriticProvider) -> Self {
        Self {
            api,
            provider: Arc::new(provider),
        }
    }

    /// The dispatcher.
    #[must_use]
    pub const fn api(&self) -> &Api {
        &self.api
    }

    /// Handles one request whose body has been collected.
    pub async fn call(&self, request: Request<Bytes>) -> HttpResponse {
        self.respond(request).await.into_http()
    }

    async fn respond(&self, request: Request<Bytes>) -> ApiResponse {
        let request = match ApiRequest::from_http(request) {
            Ok(request) => request,
            Err(error) => return ApiResponse::error(&error),
        };
        match self.provider.critic(&request).await {
            Ok(critic) => self.api.handle(critic, &request).await,
            Err(error) => {
                warn!(%error, path = request.path(), "no critic for request");
                ApiResponse::error(&error)
            }
        }
    }

    async fn call_incoming(&self, request: Request<Incoming>) -> HttpResponse {
        let limit = self.api.options().max_body_bytes;
        let (parts, body) = request.into_parts();
        match Limited::new(body, limit).collect().await {
            Ok(collected) => {
                self.call(Request::from_parts(parts, collected.to_bytes()))
                    .await
            }
            Err(error) => {
                let error = if error.downcast_ref::<LengthLimitError>().is_some() {
                    ApiError::usage(format!("Request body exceeds {limit} bytes"))
                } else {
                    ApiError::usage(format!("Failed to read request body: {error}"))
                };
                ApiResponse::error(&error).into_http()
            }
        }
    }
}

/// Serves an [`ApiService`] over HTTP/1.
///
/// # Example
///
/// ```rust,ignore
/// use critic_api_server::{ApiService, Server};
///
/// let server = Server::new(ApiService::new(api, provider));
/// server.serve("127.0.0.1:8080").await?;
/// ```
#[derive(Debug)]
pub struct Server {
    service: Arc<ApiService>,
    shutdown_timeout: Duration,
}

impl Server {
    /// Creates a server for `service`.
    #[must_use]
    pub fn new(service: ApiService) -> Self {
        Self {
            service: Arc::new(service),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Sets how long to wait for open connections after shutdown.
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Binds `addr` and serves until SIGINT or SIGTERM.
    pub async fn serve(self, addr: &str) -> Result<(), ServerError> {
        let listener = bind(addr).await?;
        self.serve_with_shutdown(listener, ShutdownSignal::with_os_signals())
            .await
    }

    /// Serves connections from `listener` until `shutdown` triggers, then
    /// waits up to the shutdown timeout for open connections.
    pub async fn serve_with_shutdown(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        info!(addr = %listener.local_addr()?, "listening");
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        let service = Arc::clone(&self.service);
                        let token = tracker.acquire();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(error) = serve_connection(service, stream, shutdown).await {
                                debug!(%remote, %error, "connection error");
                            }
                            drop(token);
                        });
                    }
                    Err(error) => error!(%error, "failed to accept connection"),
                },
                () = shutdown.triggered() => {
                    info!("shutdown requested, no longer accepting connections");
                    break;
                }
            }
        }

        let open = tracker.active_connections();
        if tokio::time::timeout(self.shutdown_timeout, tracker.wait_idle())
            .await
            .is_err()
        {
            warn!(open, remaining = tracker.active_connections(), "shutdown timeout reached");
        }
        info!("server stopped");
        Ok(())
    }
}

/// Binds a listener on `addr`.
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|_| ServerError::InvalidAddress(addr.to_string()))?;
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

async fn serve_connection(
    service: Arc<ApiService>,
    stream: TcpStream,
    shutdown: ShutdownSignal,
) -> Result<(), hyper::Error> {
    let handler = service_fn(move |request: Request<Incoming>| {
        let service = Arc::clone(&service);
        async move { Ok::<_, Infallible>(service.call_incoming(request).await) }
    });
    let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), handler);
    tokio::pin!(connection);

    tokio::select! {
        result = connection.as_mut() => result,
        () = shutdown.triggered() => {
            connection.as_mut().graceful_shutdown();
            connection.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    use crate::testing::{critic, registry};

    fn service() -> ApiService {
        ApiService::new(
            Api::new(registry()),
            |_: &ApiRequest| -> ApiResult<Arc<dyn Critic>> { Ok(critic(Some(1))) },
        )
    }

    #[tokio::test]
    async fn test_call_collected_request() {
        let request = Request::get("/api/v1/users/2").body(Bytes::new()).unwrap();
        let response = service().call(request).await;
        assert_eq!(response.status(), 200);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["users"]["name"], "bob");
    }

    #[tokio::test]
    async fn test_provider_errors_rendered() {
        let service = ApiService::new(
            Api::new(registry()),
            |_: &ApiRequest| -> ApiResult<Arc<dyn Critic>> {
                Err(ApiError::permission("Invalid session"))
            },
        );
        let request = Request::get("/api/v1/users/2").body(Bytes::new()).unwrap();
        assert_eq!(service.call(request).await.status(), 403);
    }

    #[tokio::test]
    async fn test_bind_rejects_bad_address() {
        assert!(matches!(
            bind("not an address").await,
            Err(ServerError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn test_serve_over_tcp_until_shutdown() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = tokio::spawn(
            Server::new(service())
                .with_shutdown_timeout(Duration::from_secs(1))
                .serve_with_shutdown(listener, shutdown.clone()),
        );

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /api/v1/users/1 HTTP/1.1\r\nHost: test\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();
        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.contains("x-request-id"));
        assert!(raw.contains(r#""name":"alice""#));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
