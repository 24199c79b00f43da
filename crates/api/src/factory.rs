//! Application factory.
//!
//! The factory accumulates configuration in any order and assembles the
//! router in a fixed order when [`ApplicationFactory::build`] consumes it.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;

use anyhow::Context;
use axum::{Json, Router, middleware::from_fn, routing::get};
use serde_json::{Value, json};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::cors::{CorsError, CorsPolicy};
use crate::docs::{self, ApiInfo, OPENAPI_PATH, REDOC_PATH, SWAGGER_PATH};
use crate::lifespan::{Hook, Lifespan};
use crate::middleware::{not_found, panic_response, unauthorized_handler};
use crate::registry::RouterRegistration;

pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExceptionHandler {
    /// Uniform body for every `401`.
    Unauthorized,
    /// Handler panics become `500` responses.
    Panic,
    /// JSON `404` for unmatched routes.
    NotFound,
}

impl ExceptionHandler {
    pub const ALL: [ExceptionHandler; 3] = [
        ExceptionHandler::Unauthorized,
        ExceptionHandler::Panic,
        ExceptionHandler::NotFound,
    ];
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("prefix `{prefix}` is registered by both `{first}` and `{second}`")]
    DuplicatePrefix {
        prefix: String,
        first: String,
        second: String,
    },

    #[error("prefix `{prefix}` of `{app}` collides with the built-in `{prefix}` route")]
    ReservedPath { app: String, prefix: String },

    #[error("prefix `{prefix}` of `{app}` must start with `/` and name a path below the root")]
    InvalidPrefix { app: String, prefix: String },

    #[error(transparent)]
    Cors(#[from] CorsError),

    #[error("failed to serialize the OpenAPI document")]
    OpenApi(#[source] serde_json::Error),
}

/// Builder for the HTTP application.
pub struct ApplicationFactory<S> {
    state: S,
    info: ApiInfo,
    cors: Option<CorsPolicy>,
    exception_handlers: BTreeSet<ExceptionHandler>,
    lifespan: Lifespan,
    health_check: bool,
    docs: bool,
    registrations: Vec<RouterRegistration<S>>,
}

impl<S> ApplicationFactory<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new(state: S) -> Self {
        Self {
            state,
            info: ApiInfo {
                title: "Launchpad".to_string(),
                description: String::new(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            cors: None,
            exception_handlers: BTreeSet::new(),
            lifespan: Lifespan::new(),
            health_check: false,
            docs: false,
            registrations: Vec::new(),
        }
    }

    pub fn metadata(
        mut self,
        title: impl Into<String>,
        description: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.info = ApiInfo {
            title: title.into(),
            description: description.into(),
            version: version.into(),
        };
        self
    }

    pub fn cors(mut self, policy: CorsPolicy) -> Self {
        self.cors = Some(policy);
        self
    }

    pub fn health_check(mut self) -> Self {
        self.health_check = true;
        self
    }

    pub fn default_exception_handlers(mut self) -> Self {
        self.exception_handlers.extend(ExceptionHandler::ALL);
        self
    }

    pub fn exception_handler(mut self, handler: ExceptionHandler) -> Self {
        self.exception_handlers.insert(handler);
        self
    }

    /// Serve `/openapi.json`, `/docs` and `/redoc`.
    pub fn docs(mut self) -> Self {
        self.docs = true;
        self
    }

    pub fn on_startup<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.lifespan.on_startup(Hook::new(name, hook));
        self
    }

    pub fn on_shutdown<F, Fut>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.lifespan.on_shutdown(Hook::new(name, hook));
        self
    }

    pub fn include(mut self, registration: RouterRegistration<S>) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn build(self) -> Result<Application, BuildError> {
        self.check_prefixes()?;

        let mut router = Router::new();
        let mut mounted = Vec::with_capacity(self.registrations.len());

        let spec = if self.docs {
            let doc = docs::build_openapi(&self.info, &self.registrations);
            Some(serde_json::to_value(&doc).map_err(BuildError::OpenApi)?)
        } else {
            None
        };

        for registration in self.registrations {
            info!(app = %registration.app_name, prefix = %registration.prefix, "mounting router");
            router = router.nest(&registration.prefix, registration.router);
            mounted.push(registration.prefix);
        }

        if self.health_check {
            router = router.route(HEALTH_PATH, get(health));
        }
        if let Some(spec) = spec {
            router = router.merge(docs::router(spec, &self.info.title));
        }
        if self.exception_handlers.contains(&ExceptionHandler::NotFound) {
            router = router.fallback(not_found);
        }

        let mut router: Router = router.with_state(self.state);

        if self.exception_handlers.contains(&ExceptionHandler::Panic) {
            router = router.layer(CatchPanicLayer::custom(panic_response));
        }
        if self.exception_handlers.contains(&ExceptionHandler::Unauthorized) {
            router = router.layer(from_fn(unauthorized_handler));
        }
        if let Some(policy) = &self.cors {
            router = router.layer(policy.layer()?);
        }
        let router = router.layer(TraceLayer::new_for_http());

        info!(
            title = %self.info.title,
            version = %self.info.version,
            routers = mounted.len(),
            "application built"
        );

        Ok(Application {
            router,
            lifespan: self.lifespan,
            mounted,
        })
    }

    fn check_prefixes(&self) -> Result<(), BuildError> {
        let mut reserved = Vec::new();
        if self.health_check {
            reserved.push(HEALTH_PATH);
        }
        if self.docs {
            reserved.extend([OPENAPI_PATH, SWAGGER_PATH, REDOC_PATH]);
        }

        let mut seen: HashMap<&str, &str> = HashMap::new();
        for registration in &self.registrations {
            let prefix = registration.prefix.as_str();
            let app = registration.app_name.as_str();

            if !prefix.starts_with('/') || prefix.trim_end_matches('/').is_empty() {
                return Err(BuildError::InvalidPrefix {
                    app: app.to_string(),
                    prefix: prefix.to_string(),
                });
            }
            if reserved.contains(&prefix) {
                return Err(BuildError::ReservedPath {
                    app: app.to_string(),
                    prefix: prefix.to_string(),
                });
            }
            if let Some(first) = seen.insert(prefix, app) {
                return Err(BuildError::DuplicatePrefix {
                    prefix: prefix.to_string(),
                    first: first.to_string(),
                    second: app.to_string(),
                });
            }
        }
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// A built application: the router plus the hooks around serving it.
pub struct Application {
    router: Router,
    lifespan: Lifespan,
    mounted: Vec<String>,
}

impl Application {
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Prefixes of the mounted app routers, in mount order.
    pub fn mounted(&self) -> &[String] {
        &self.mounted
    }

    pub fn lifespan(&self) -> &Lifespan {
        &self.lifespan
    }

    pub fn into_parts(self) -> (Router, Lifespan) {
        (self.router, self.lifespan)
    }

    /// Serves until ctrl-c or SIGTERM.
    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Runs the startup hooks, serves until `signal` resolves, then runs
    /// the shutdown hooks.
    ///
    /// A failed startup hook is returned without serving; shutdown hooks
    /// still run so resources acquired so far are released.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let shutdown = match self.lifespan.startup().await {
            Ok(shutdown) => shutdown,
            Err((err, shutdown)) => {
                if let Err(cleanup) = shutdown.run().await {
                    warn!(error = %format!("{cleanup:#}"), "cleanup after failed startup also failed");
                }
                return Err(err);
            }
        };

        let addr = listener.local_addr().context("listener has no local address")?;
        info!(%addr, "listening");

        let served = axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .await
            .context("server error");
        info!("server stopped");

        let stopped = shutdown.run().await;
        served?;
        stopped
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("mounted", &self.mounted)
            .field("lifespan", &self.lifespan)
            .finish_non_exhaustive()
    }
}

/// Resolves on ctrl-c, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        body::{Body, to_bytes},
        extract::State,
        http::{Request, StatusCode, header},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::registry::{Loaded, ModuleLoadError, RegistryConfig, RouteModule, RouterRegistry};

    async fn call(router: Router, method: &str, uri: &str) -> (StatusCode, Value) {
        let response = router
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn ping(app: &str, prefix: &str) -> RouterRegistration<()> {
        RouterRegistration::new(app, prefix, Router::new().route("/ping", get(|| async { "pong" })))
    }

    #[tokio::test]
    async fn health_check_reports_ok() {
        let app = ApplicationFactory::new(()).health_check().build().unwrap();

        let (status, body) = call(app.router(), "GET", "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn health_check_is_opt_in() {
        let app = ApplicationFactory::new(()).build().unwrap();

        let (status, _) = call(app.router(), "GET", "/health").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn included_routers_are_nested_under_their_prefix() {
        let app = ApplicationFactory::new(())
            .include(ping("users", "/api/users"))
            .include(ping("products", "/api/products"))
            .build()
            .unwrap();

        assert_eq!(app.mounted(), ["/api/users", "/api/products"]);
        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/api/products/ping")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"pong");
    }

    #[tokio::test]
    async fn state_reaches_nested_handlers() {
        #[derive(Clone)]
        struct Greeting(&'static str);

        let router = Router::new().route(
            "/hello",
            get(|State(greeting): State<Greeting>| async move { greeting.0 }),
        );
        let app = ApplicationFactory::new(Greeting("hi"))
            .include(RouterRegistration::new("greet", "/api/greet", router))
            .build()
            .unwrap();

        let response = app
            .router()
            .oneshot(Request::builder().uri("/api/greet/hello").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hi");
    }

    #[test]
    fn duplicate_prefixes_fail_the_build() {
        let err = ApplicationFactory::new(())
            .include(ping("users", "/api/users"))
            .include(ping("accounts", "/api/users"))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            BuildError::DuplicatePrefix { ref prefix, ref first, ref second }
                if prefix == "/api/users" && first == "users" && second == "accounts"
        ));
    }

    #[test]
    fn registering_twice_is_detected() {
        let root = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("users")).unwrap();
        std::fs::write(root.path().join("users").join("routes.rs"), "").unwrap();

        let loader = |_: &RouteModule| -> Result<Option<Loaded<()>>, ModuleLoadError> {
            Ok(Some(Router::new().route("/ping", get(|| async { "pong" })).into()))
        };
        let registry = RouterRegistry::new(RegistryConfig::new(root.path())).unwrap();

        let factory = registry.register(ApplicationFactory::new(()), &loader).unwrap();
        let factory = registry.register(factory, &loader).unwrap();

        assert!(matches!(
            factory.build(),
            Err(BuildError::DuplicatePrefix { prefix, .. }) if prefix == "/api/users"
        ));
    }

    #[test]
    fn reserved_paths_cannot_be_prefixes() {
        let err = ApplicationFactory::new(())
            .health_check()
            .include(ping("health", "/health"))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::ReservedPath { .. }));

        let err = ApplicationFactory::new(())
            .docs()
            .include(ping("docs", "/docs"))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::ReservedPath { .. }));

        let err = ApplicationFactory::new(())
            .include(ping("root", "/"))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::InvalidPrefix { .. }));
    }

    #[tokio::test]
    async fn configuration_order_does_not_matter() {
        let a = ApplicationFactory::new(())
            .health_check()
            .default_exception_handlers()
            .include(ping("users", "/api/users"))
            .metadata("Ordered", "", "1.0.0")
            .build()
            .unwrap();
        let b = ApplicationFactory::new(())
            .metadata("Ordered", "", "1.0.0")
            .include(ping("users", "/api/users"))
            .default_exception_handlers()
            .health_check()
            .build()
            .unwrap();

        for uri in ["/health", "/api/users/ping", "/missing"] {
            let (status_a, body_a) = call(a.router(), "GET", uri).await;
            let (status_b, body_b) = call(b.router(), "GET", uri).await;
            assert_eq!(status_a, status_b, "{uri}");
            assert_eq!(body_a, body_b, "{uri}");
        }
    }

    #[tokio::test]
    async fn not_found_handler_returns_json() {
        let app = ApplicationFactory::new(())
            .exception_handler(ExceptionHandler::NotFound)
            .build()
            .unwrap();

        let (status, body) = call(app.router(), "GET", "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({ "detail": "Not Found" }));
    }

    #[tokio::test]
    async fn unauthorized_handler_applies_to_app_routes() {
        let secret = Router::new().route("/me", get(|| async { StatusCode::UNAUTHORIZED }));
        let app = ApplicationFactory::new(())
            .default_exception_handlers()
            .include(RouterRegistration::new("users", "/api/users", secret))
            .build()
            .unwrap();

        let (status, body) = call(app.router(), "GET", "/api/users/me").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "UNAUTHORIZED");
        assert_eq!(body["detail"], "Authentication required");
    }

    #[tokio::test]
    async fn cors_layer_covers_built_in_routes() {
        let app = ApplicationFactory::new(())
            .health_check()
            .cors(CorsPolicy::permissive())
            .build()
            .unwrap();

        let response = app
            .router()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(header::ORIGIN, "https://app.example.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn docs_routes_serve_the_merged_document() {
        let app = ApplicationFactory::new(())
            .metadata("Docs Test", "desc", "0.9.0")
            .docs()
            .build()
            .unwrap();

        let (status, body) = call(app.router(), "GET", "/openapi.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["info"]["title"], "Docs Test");
        assert_eq!(body["info"]["version"], "0.9.0");

        for page in ["/docs", "/redoc"] {
            let (status, _) = call(app.router(), "GET", page).await;
            assert_eq!(status, StatusCode::OK, "{page}");
        }
    }

    #[tokio::test]
    async fn serve_runs_hooks_around_the_server() {
        let log: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let hook = |label: &'static str| {
            let log = Arc::clone(&log);
            move || async move {
                log.lock().unwrap().push(label);
                Ok(())
            }
        };

        let app = ApplicationFactory::new(())
            .health_check()
            .on_shutdown("close-db", hook("close-db"))
            .on_startup("connect-db", hook("connect-db"))
            .on_startup("warm-cache", hook("warm-cache"))
            .on_shutdown("flush-cache", hook("flush-cache"))
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(app.serve_with_shutdown(listener, async {
            let _ = stop_rx.await;
        }));

        let response = reqwest::get(format!("http://{addr}/health")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), ["connect-db", "warm-cache"]);

        stop_tx.send(()).unwrap();
        server.await.unwrap().unwrap();

        assert_eq!(
            *log.lock().unwrap(),
            ["connect-db", "warm-cache", "flush-cache", "close-db"]
        );
    }

    #[tokio::test]
    async fn failed_startup_never_serves() {
        let cleaned_up = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&cleaned_up);

        let app = ApplicationFactory::new(())
            .health_check()
            .on_startup("database", || async { anyhow::bail!("connection refused") })
            .on_shutdown("close", move || async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
            .build()
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let err = app
            .serve_with_shutdown(listener, std::future::pending())
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("connection refused"));
        assert!(*cleaned_up.lock().unwrap());
    }
}
