//! Server module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. This separation lets the composition root log the actual
//! bound port (useful with port 0) before traffic is accepted.

use std::future::Future;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tracing::info;

use super::config::NetworkConfig;
use super::handlers::{health_handler, root_handler, AppState, ServiceInfo};
use super::middleware::build_http_layers;
use crate::error::{self, ApiError};

/// Manages the full HTTP server lifecycle.
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- holds configuration and service identity
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- accepts connections until the shutdown future resolves
pub struct ServerModule {
    config: NetworkConfig,
    info: ServiceInfo,
    listener: Option<TcpListener>,
}

impl ServerModule {
    /// Creates a new server module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, info: ServiceInfo) -> Self {
        Self {
            config,
            info,
            listener: None,
        }
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /` -- service description and version
    /// - `GET /health` -- liveness probe
    /// - anything else -- enveloped 404/405
    #[must_use]
    pub fn build_router(&self) -> Router {
        build_router(
            &self.config,
            AppState {
                info: Arc::new(self.info.clone()),
            },
        )
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Starts serving connections until the shutdown future resolves.
    ///
    /// Consumes `self` because the listener is moved into the server.
    /// After the shutdown future resolves, `axum::serve` stops accepting
    /// connections, lets in-flight requests complete, and returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error.
    ///
    /// # Panics
    ///
    /// Panics if `start()` was not called before `serve()`.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .expect("start() must be called before serve()");
        let router = build_router(
            &self.config,
            AppState {
                info: Arc::new(self.info.clone()),
            },
        );

        info!("Serving HTTP connections");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

/// Assembles the router with the error-translation and middleware stages.
#[must_use]
pub fn build_router(config: &NetworkConfig, state: AppState) -> Router {
    apply_stack(base_routes(), config).with_state(state)
}

fn base_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .fallback(fallback_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
}

/// Wraps a route set with error translation and the HTTP middleware stack.
///
/// From the outside in: the transport stack (request id, tracing, admission,
/// CORS, timeout), then the failure-logging dispatcher, then the catch-panic
/// stage, then the routes. Panics are converted to envelopes before the
/// dispatcher sees the response, so every failure is logged with request
/// context.
fn apply_stack(router: Router<AppState>, config: &NetworkConfig) -> Router<AppState> {
    router
        .layer(CatchPanicLayer::custom(error::panic_response))
        .layer(middleware::from_fn(error::log_failures))
        .layer(build_http_layers(config))
}

/// Unknown routes are declared failures, not bare 404s.
async fn fallback_handler() -> ApiError {
    ApiError::http(StatusCode::NOT_FOUND, "Not Found")
}

/// Known route, wrong method: declared failure as well.
async fn method_not_allowed_handler() -> ApiError {
    ApiError::http(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
        CONTENT_TYPE, ORIGIN,
    };
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;

    const ALLOWED_ORIGIN: &str = "http://localhost:4321";

    fn test_state() -> AppState {
        AppState {
            info: Arc::new(ServiceInfo {
                description: "Backend API service for tarot.vn".to_owned(),
                version: "1.2.3".to_owned(),
            }),
        }
    }

    fn test_router() -> Router {
        build_router(&NetworkConfig::default(), test_state())
    }

    /// Router with extra failing routes behind the same stack, standing in
    /// for externally supplied handlers.
    fn failing_router() -> Router {
        let routes = base_routes()
            .route(
                "/teapot",
                get(|| async {
                    Err::<(), ApiError>(ApiError::http(
                        StatusCode::IM_A_TEAPOT,
                        "short and stout",
                    ))
                }),
            )
            .route(
                "/broken",
                get(|| async {
                    Err::<(), ApiError>(ApiError::internal(std::io::Error::new(
                        std::io::ErrorKind::Other,
                        "card deck missing",
                    )))
                }),
            )
            .route(
                "/panic",
                get(|| async {
                    panic!("handler exploded");
                    #[allow(unreachable_code)]
                    ()
                }),
            );
        apply_stack(routes, &NetworkConfig::default()).with_state(test_state())
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn root_returns_message_and_version() {
        let response = test_router().oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_json(response).await,
            json!({
                "message": "Backend API service for tarot.vn",
                "version": "1.2.3",
            })
        );
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let response = test_router().oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "OK");
    }

    #[tokio::test]
    async fn unknown_route_is_enveloped_404() {
        let response = test_router().oneshot(get_request("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "detail": "Not Found" }));
    }

    #[tokio::test]
    async fn wrong_method_is_enveloped_405() {
        let request = Request::builder()
            .method("POST")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "Method Not Allowed" })
        );
    }

    #[tokio::test]
    async fn upgrade_probe_bypasses_everything() {
        let request = Request::builder()
            .method("PRI")
            .uri("*")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // No CORS headers: the probe never reached the policy stage.
        assert!(response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "text/plain; charset=utf-8"
        );
        assert_eq!(body_text(response).await, "Bad Request");
    }

    #[tokio::test]
    async fn allowed_origin_gets_cors_headers() {
        let request = Request::builder()
            .uri("/")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();

        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            ALLOWED_ORIGIN
        );
        assert_eq!(
            response
                .headers()
                .get(ACCESS_CONTROL_ALLOW_CREDENTIALS)
                .unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn disallowed_origin_gets_no_cors_headers() {
        let request = Request::builder()
            .uri("/")
            .header(ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get(ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none());
    }

    #[tokio::test]
    async fn preflight_answers_with_policy_headers() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .header("access-control-request-method", "PATCH")
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            ALLOWED_ORIGIN
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_MAX_AGE).unwrap(),
            "600"
        );
        let methods = response
            .headers()
            .get("access-control-allow-methods")
            .unwrap()
            .to_str()
            .unwrap()
            .to_owned();
        assert!(methods.contains("PATCH"), "methods: {methods}");
        assert!(methods.contains("DELETE"), "methods: {methods}");
    }

    #[tokio::test]
    async fn declared_failure_keeps_status_and_detail() {
        let response = failing_router().oneshot(get_request("/teapot")).await.unwrap();
        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "short and stout" })
        );
    }

    #[tokio::test]
    async fn internal_failure_is_enveloped_500() {
        let response = failing_router().oneshot(get_request("/broken")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "Internal server error");
        assert_eq!(body["error_type"], std::any::type_name::<std::io::Error>());
        assert_eq!(body["error_message"], "card deck missing");
    }

    #[tokio::test]
    async fn panicking_handler_is_enveloped_500() {
        let response = failing_router().oneshot(get_request("/panic")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["detail"], "Internal server error");
        assert_eq!(body["error_type"], "panic");
        assert_eq!(body["error_message"], "handler exploded");
    }

    #[tokio::test]
    async fn error_responses_still_carry_cors_headers() {
        let request = Request::builder()
            .uri("/teapot")
            .header(ORIGIN, ALLOWED_ORIGIN)
            .body(Body::empty())
            .unwrap();
        let response = failing_router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            ALLOWED_ORIGIN
        );
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let config = NetworkConfig {
            port: 0,
            ..NetworkConfig::default()
        };
        let mut module = ServerModule::new(
            config,
            ServiceInfo {
                description: "test".to_owned(),
                version: "0.0.0".to_owned(),
            },
        );
        let port = module.start().await.expect("start should succeed");
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    #[should_panic(expected = "start() must be called before serve()")]
    async fn serve_panics_without_start() {
        let module = ServerModule::new(
            NetworkConfig::default(),
            ServiceInfo {
                description: "test".to_owned(),
                version: "0.0.0".to_owned(),
            },
        );
        let _ = module.serve(std::future::pending::<()>()).await;
    }
}
