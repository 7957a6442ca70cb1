//! Proxy parameters smuggled in `X-UrlFetch-*` request headers.
//!
//! # Responsibilities
//! - Collect every reserved-prefix header into a parameter map
//! - Strip those headers so the upstream never sees them
//! - Enforce the optional shared secret carried in `X-UrlFetch-Password`
//!
//! # Design Decisions
//! - Header names are case-insensitive; parameter names are lower-cased
//! - A repeated header contributes its first value only
//! - Unknown parameters are accepted and ignored

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Reserved header-name prefix, in the lower-case form header names are
/// stored in.
pub const PARAM_PREFIX: &str = "x-urlfetch-";

/// Parameter carrying the shared secret.
pub const PASSWORD_PARAM: &str = "password";

/// Parameters extracted from one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchParams(HashMap<String, String>);

impl FetchParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn password(&self) -> Option<&str> {
        self.get(PASSWORD_PARAM)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Read every reserved-prefix header into [`FetchParams`] and remove all of
/// them, every value included, from `headers`.
pub fn extract_params(headers: &mut HeaderMap) -> FetchParams {
    let reserved: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with(PARAM_PREFIX))
        .cloned()
        .collect();

    let mut params = HashMap::with_capacity(reserved.len());
    for name in reserved {
        // `remove` returns the first value and drops the rest.
        if let Some(value) = headers.remove(&name) {
            let key = name.as_str()[PARAM_PREFIX.len()..].to_string();
            params.insert(key, header_text(&value));
        }
    }
    FetchParams(params)
}

fn header_text(value: &HeaderValue) -> String {
    match value.to_str() {
        Ok(text) => text.to_string(),
        Err(_) => String::from_utf8_lossy(value.as_bytes()).into_owned(),
    }
}

/// The configured shared secret. Empty means authentication is disabled.
#[derive(Clone, Default)]
pub struct SharedSecret(Option<Arc<str>>);

impl SharedSecret {
    pub fn new(secret: &str) -> Self {
        if secret.is_empty() {
            Self(None)
        } else {
            Self(Some(Arc::from(secret)))
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Check a request's parameters against the secret.
    pub fn authenticate(&self, params: &FetchParams) -> Result<(), AuthError> {
        let Some(expected) = self.0.as_deref() else {
            return Ok(());
        };
        match params.password() {
            Some(given) if given == expected => Ok(()),
            given => Err(AuthError {
                given: given.map(str::to_string),
            }),
        }
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedSecret")
            .field(&if self.is_enabled() { "<set>" } else { "<none>" })
            .finish()
    }
}

/// Strip the reserved headers, then authenticate.
///
/// Headers are removed before the secret is checked, so a rejected request
/// has been cleaned too.
pub fn extract_and_authenticate(
    headers: &mut HeaderMap,
    secret: &SharedSecret,
) -> Result<FetchParams, AuthError> {
    let params = extract_params(headers);
    secret.authenticate(&params)?;
    Ok(params)
}

/// A missing or wrong `X-UrlFetch-Password`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("wrong password {:?}", .given.as_deref().unwrap_or_default())]
pub struct AuthError {
    /// The value the caller sent, if any.
    pub given: Option<String>,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        plain_error(StatusCode::FORBIDDEN, &self.to_string())
    }
}

/// A `text/plain` error reply whose body is `message` plus a newline.
pub(crate) fn plain_error(status: StatusCode, message: &str) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        ],
        format!("{message}\n"),
    )
        .into_response()
}
