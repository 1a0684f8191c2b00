//! HTTP Basic authentication for the RPC route.
//!
//! Runs before the body is read, so a request with bad credentials is
//! answered 401 whatever its body looks like.

use crate::domain::{AdmissionError, ApiError, AuthConfig};
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use complex_telemetry::LANDLORD_JOBS_REJECTED;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::warn;

/// Basic auth layer
#[derive(Clone)]
pub struct BasicAuthLayer {
    config: Arc<AuthConfig>,
}

impl BasicAuthLayer {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl<S> Layer<S> for BasicAuthLayer {
    type Service = BasicAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BasicAuthService {
            inner,
            config: Arc::clone(&self.config),
        }
    }
}

/// Basic auth service
#[derive(Clone)]
pub struct BasicAuthService<S> {
    inner: S,
    config: Arc<AuthConfig>,
}

impl<S> Service<Request<Body>> for BasicAuthService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let authorized = check_basic_auth(req.headers(), &self.config);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if !authorized {
                warn!(uri = %req.uri(), "Rejected request with bad credentials");
                LANDLORD_JOBS_REJECTED
                    .with_label_values(&[AdmissionError::Unauthorized.reason()])
                    .inc();
                return Ok(unauthorized_response());
            }
            inner.call(req).await
        })
    }
}

/// Check the `Authorization: Basic` header against the configured pair.
pub fn check_basic_auth(headers: &HeaderMap, config: &AuthConfig) -> bool {
    let Some((username, password)) = basic_credentials(headers) else {
        return false;
    };
    // Both halves are always compared.
    let user_ok = constant_time_compare(&username, &config.username);
    let pass_ok = constant_time_compare(&password, &config.password);
    user_ok & pass_ok
}

fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// Constant-time string comparison.
///
/// Takes the same time however many leading bytes match.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    // Different pad bytes so unequal lengths never compare equal
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);

    (lengths_equal & contents_equal).into()
}

fn unauthorized_response() -> Response {
    let mut response = ApiError::from(AdmissionError::Unauthorized).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"landlord\""),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            username: "landlord".into(),
            password: "s3cret".into(),
        }
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn basic(user: &str, pass: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
    }

    #[test]
    fn test_constant_time_compare() {
        assert!(constant_time_compare("secret", "secret"));
        assert!(!constant_time_compare("secret", "Secret"));
        assert!(!constant_time_compare("secret", "secre"));
        assert!(!constant_time_compare("secret", "secrets"));
        assert!(constant_time_compare("", ""));
    }

    #[test]
    fn test_valid_credentials() {
        assert!(check_basic_auth(&headers(&basic("landlord", "s3cret")), &config()));
    }

    #[test]
    fn test_password_may_contain_colon() {
        let config = AuthConfig {
            username: "u".into(),
            password: "a:b".into(),
        };
        assert!(check_basic_auth(&headers(&basic("u", "a:b")), &config));
    }

    #[test]
    fn test_wrong_or_missing_credentials() {
        assert!(!check_basic_auth(&headers(&basic("landlord", "nope")), &config()));
        assert!(!check_basic_auth(&headers(&basic("other", "s3cret")), &config()));
        assert!(!check_basic_auth(&HeaderMap::new(), &config()));
        assert!(!check_basic_auth(&headers("Bearer s3cret"), &config()));
        assert!(!check_basic_auth(&headers("Basic !!!notbase64"), &config()));
    }
}
