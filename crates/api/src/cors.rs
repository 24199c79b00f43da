//! Cross-origin policy.
//!
//! Allowed origins are echoed back rather than answered with `*`, which
//! keeps the policy usable together with credentials.

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue, Method, request::Parts};
use thiserror::Error;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use launchpad_core::CorsSettings;

pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(86_400);

const WILDCARD: &str = "*";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CorsError {
    #[error("invalid CORS method `{0}`")]
    InvalidMethod(String),

    #[error("invalid CORS header `{0}`")]
    InvalidHeader(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allow_origins: Vec<String>,
    pub allow_credentials: bool,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub max_age: Duration,
}

impl CorsPolicy {
    /// Any origin, method and header; credentials allowed.
    pub fn permissive() -> Self {
        Self {
            allow_origins: vec![WILDCARD.to_string()],
            allow_credentials: true,
            allow_methods: vec![WILDCARD.to_string()],
            allow_headers: vec![WILDCARD.to_string()],
            max_age: DEFAULT_MAX_AGE,
        }
    }

    pub fn from_settings(settings: &CorsSettings) -> Self {
        Self {
            allow_origins: settings.allow_origins.clone(),
            allow_credentials: settings.allow_credentials,
            allow_methods: settings.allow_methods.clone(),
            allow_headers: settings.allow_headers.clone(),
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// `*` allows everything, `*.example.com` allows subdomains of
    /// `example.com` on any scheme, anything else must match exactly.
    pub fn is_origin_allowed(&self, origin: &str) -> bool {
        self.allow_origins
            .iter()
            .any(|allowed| origin_matches(allowed.trim(), origin))
    }

    pub fn layer(&self) -> Result<CorsLayer, CorsError> {
        let allow_methods = if contains_wildcard(&self.allow_methods) {
            AllowMethods::mirror_request()
        } else {
            let methods = self
                .allow_methods
                .iter()
                .map(|m| {
                    Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                        .map_err(|_| CorsError::InvalidMethod(m.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            AllowMethods::list(methods)
        };

        let allow_headers = if contains_wildcard(&self.allow_headers) {
            AllowHeaders::mirror_request()
        } else {
            let headers = self
                .allow_headers
                .iter()
                .map(|h| {
                    HeaderName::from_bytes(h.trim().as_bytes())
                        .map_err(|_| CorsError::InvalidHeader(h.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            AllowHeaders::list(headers)
        };

        let policy = self.clone();
        let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _: &Parts| {
            origin
                .to_str()
                .map(|origin| policy.is_origin_allowed(origin))
                .unwrap_or(false)
        });

        Ok(CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods(allow_methods)
            .allow_headers(allow_headers)
            .allow_credentials(self.allow_credentials)
            .max_age(self.max_age))
    }
}

fn contains_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v.trim() == WILDCARD)
}

fn origin_matches(allowed: &str, origin: &str) -> bool {
    if allowed == WILDCARD {
        return true;
    }

    match allowed.strip_prefix("*.") {
        Some(domain) => {
            let host = origin
                .split_once("://")
                .map_or(origin, |(_, rest)| rest);
            let host = host.split(':').next().unwrap_or(host);
            host.len() > domain.len() + 1
                && host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
        }
        None => allowed.eq_ignore_ascii_case(origin.trim_end_matches('/')),
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode, header},
        routing::get,
    };
    use tower::ServiceExt;

    use super::*;

    fn policy(origins: &[&str]) -> CorsPolicy {
        CorsPolicy {
            allow_origins: origins.iter().map(|o| o.to_string()).collect(),
            ..CorsPolicy::permissive()
        }
    }

    #[test]
    fn wildcard_allows_everything() {
        let policy = CorsPolicy::permissive();
        assert!(policy.is_origin_allowed("https://anything.test"));
        assert!(policy.is_origin_allowed("null"));
    }

    #[test]
    fn exact_origins_must_match() {
        let policy = policy(&["https://app.example.com", "http://localhost:3000"]);
        assert!(policy.is_origin_allowed("https://app.example.com"));
        assert!(policy.is_origin_allowed("http://localhost:3000"));
        assert!(!policy.is_origin_allowed("http://app.example.com"));
        assert!(!policy.is_origin_allowed("http://localhost:3001"));
    }

    #[test]
    fn subdomain_wildcards_match_on_host_suffix() {
        let policy = policy(&["*.example.com"]);
        assert!(policy.is_origin_allowed("https://app.example.com"));
        assert!(policy.is_origin_allowed("http://a.b.example.com:8080"));
        assert!(!policy.is_origin_allowed("https://example.com"));
        assert!(!policy.is_origin_allowed("https://evilexample.com"));
        assert!(!policy.is_origin_allowed("https://example.com.evil.io"));
    }

    #[test]
    fn invalid_method_or_header_is_rejected() {
        let mut bad = CorsPolicy::permissive();
        bad.allow_methods = vec!["GET".into(), "NOT A METHOD".into()];
        assert_eq!(
            bad.layer().unwrap_err(),
            CorsError::InvalidMethod("NOT A METHOD".into())
        );

        let mut bad = CorsPolicy::permissive();
        bad.allow_headers = vec!["x ok".into()];
        assert!(matches!(bad.layer(), Err(CorsError::InvalidHeader(_))));
    }

    fn app(policy: &CorsPolicy) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(policy.layer().unwrap())
    }

    fn preflight(origin: &str) -> Request<Body> {
        Request::builder()
            .method("OPTIONS")
            .uri("/")
            .header(header::ORIGIN, origin)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn preflight_mirrors_allowed_origin_with_credentials() {
        let response = app(&policy(&["https://app.example.com"]))
            .oneshot(preflight("https://app.example.com"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "https://app.example.com"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "POST");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "authorization");
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[tokio::test]
    async fn disallowed_origin_gets_no_cors_headers() {
        let response = app(&policy(&["https://app.example.com"]))
            .oneshot(preflight("https://evil.test"))
            .await
            .unwrap();

        assert!(
            !response
                .headers()
                .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        );
    }

    #[tokio::test]
    async fn explicit_method_list_is_sent_verbatim() {
        let mut policy = policy(&["*"]);
        policy.allow_methods = vec!["get".into(), "POST".into()];

        let response = app(&policy)
            .oneshot(preflight("https://any.test"))
            .await
            .unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET,POST"
        );
    }
}
