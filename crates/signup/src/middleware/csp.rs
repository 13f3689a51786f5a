//! CSP nonce and policy.
//!
//! The only inline script the form renders is the analytics tag. It carries
//! a per-request nonce, and the policy allows scripts with that nonce only.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use base64::{Engine, engine::general_purpose::STANDARD};
use rand::RngCore;

/// Google tag script host.
const GTAG_HOST: &str = "https://www.googletagmanager.com";

/// Hosts the Google tag reports to.
const GTAG_CONNECT: &str = "https://*.google-analytics.com https://*.analytics.google.com \
                            https://*.googletagmanager.com";

/// A CSP nonce value for inline scripts (128-bit, base64-encoded).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CspNonce(pub String);

impl CspNonce {
    /// Generate a new random nonce.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        Self(STANDARD.encode(bytes))
    }

    /// Get the nonce value for use in templates.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }
}

/// Build the `Content-Security-Policy` header value.
///
/// Without analytics the policy allows same-origin resources only. With
/// analytics it also admits the nonced inline tag and the Google tag hosts.
#[must_use]
pub fn content_security_policy(nonce: &CspNonce, analytics: bool) -> String {
    let (script_src, connect_src, img_src) = if analytics {
        (
            format!("'self' 'nonce-{}' {GTAG_HOST}", nonce.value()),
            format!("'self' {GTAG_CONNECT}"),
            format!("'self' {GTAG_CONNECT}"),
        )
    } else {
        (
            "'self'".to_string(),
            "'self'".to_string(),
            "'self'".to_string(),
        )
    };

    format!(
        "default-src 'none'; \
         script-src {script_src}; \
         style-src 'self'; \
         font-src 'self'; \
         img-src {img_src}; \
         connect-src {connect_src}; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self'; \
         frame-ancestors 'none'"
    )
}

/// Middleware that generates a CSP nonce and stores it in request extensions.
///
/// Must run before `security_headers_middleware`, which reads the nonce.
pub async fn csp_nonce_middleware(mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(CspNonce::generate());
    next.run(request).await
}

impl<S> FromRequestParts<S> for CspNonce
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Self>().cloned().unwrap_or_else(|| {
            tracing::warn!(
                "CSP nonce not found in request extensions - middleware may be misconfigured"
            );
            Self(String::new())
        }))
    }
}
