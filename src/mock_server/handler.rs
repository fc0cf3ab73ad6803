//! Request and handler types exposed to test code.

use std::fmt;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use super::response::MockResponse;
use crate::multipart;

/// Header carrying the registry API key on push and delete requests.
pub const API_KEY_HEADER: &str = "X-NuGet-ApiKey";

/// A route handler: maps an inbound request to a [`HandlerResult`].
pub type Handler = Arc<dyn Fn(&MockRequest) -> HandlerResult + Send + Sync>;

/// Callback notified with every completed request/response pair.
pub type RequestObserver = Arc<dyn Fn(&MockRequest, &MockResponse) + Send + Sync>;

/// A fully buffered inbound request.
#[derive(Debug, Clone)]
pub struct MockRequest {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl MockRequest {
    /// Build a request from its parts.
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
        }
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The full request target as received.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The path without the query string.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path plus query string, the string routes are matched against.
    pub fn path_and_query(&self) -> &str {
        self.uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), |pq| pq.as_str())
    }

    /// The query string, without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// All request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a header value as a string, if present and valid.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    /// The buffered request body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The package uploaded by a push request.
    ///
    /// Empty if the request is not a well-formed multipart upload.
    pub fn pushed_package(&self) -> Bytes {
        multipart::package_range(self.content_type(), &self.body)
            .map(|range| self.body.slice(range))
            .unwrap_or_default()
    }

    /// The identity the request authenticates as, if any.
    pub fn principal(&self) -> Option<Principal> {
        Principal::from_headers(&self.headers)
    }
}

/// How a [`Principal`] presented its credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Bearer,
    ApiKey,
}

/// The caller identity a request carries.
///
/// Credentials are never checked; this only reports what the client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub name: String,
    pub scheme: AuthScheme,
}

impl Principal {
    fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let authorization = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        if let Some((scheme, credentials)) = authorization.and_then(|v| v.split_once(' ')) {
            let credentials = credentials.trim();
            if scheme.eq_ignore_ascii_case("basic") {
                let decoded = STANDARD.decode(credentials).ok()?;
                let decoded = String::from_utf8(decoded).ok()?;
                let user = decoded.split_once(':').map_or(decoded.as_str(), |(u, _)| u);
                return Some(Self {
                    name: user.to_string(),
                    scheme: AuthScheme::Basic,
                });
            }
            if scheme.eq_ignore_ascii_case("bearer") {
                return Some(Self {
                    name: credentials.to_string(),
                    scheme: AuthScheme::Bearer,
                });
            }
        }

        headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|key| Self {
                name: key.to_string(),
                scheme: AuthScheme::ApiKey,
            })
    }
}

/// What a handler asks the server to do with the response.
pub enum HandlerResult {
    /// Write this text as the response body.
    Body(String),
    /// Set the status code and write nothing else.
    Status(StatusCode),
    /// Take full control of the response.
    Respond(Box<dyn FnOnce(&mut MockResponse) + Send>),
    /// Take full control of the response, with the caller identity.
    RespondAs(Box<dyn FnOnce(&mut MockResponse, Option<&Principal>) + Send>),
    /// Produce no body; the status stays at 200.
    Empty,
}

impl HandlerResult {
    pub fn body(text: impl Into<String>) -> Self {
        Self::Body(text.into())
    }

    pub fn status(status: StatusCode) -> Self {
        Self::Status(status)
    }

    pub fn respond(f: impl FnOnce(&mut MockResponse) + Send + 'static) -> Self {
        Self::Respond(Box::new(f))
    }

    pub fn respond_as(f: impl FnOnce(&mut MockResponse, Option<&Principal>) + Send + 'static) -> Self {
        Self::RespondAs(Box::new(f))
    }

    /// Apply this result to `response`.
    pub(crate) fn write_to(self, response: &mut MockResponse, request: &MockRequest) {
        match self {
            Self::Body(text) => response.set_text_content(&text),
            Self::Status(status) => response.set_status(status),
            Self::Respond(f) => f(response),
            Self::RespondAs(f) => {
                let principal = request.principal();
                f(response, principal.as_ref());
            }
            Self::Empty => {}
        }
    }
}

impl fmt::Debug for HandlerResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(text) => f.debug_tuple("Body").field(text).finish(),
            Self::Status(status) => f.debug_tuple("Status").field(status).finish(),
            Self::Respond(_) => f.write_str("Respond(..)"),
            Self::RespondAs(_) => f.write_str("RespondAs(..)"),
            Self::Empty => f.write_str("Empty"),
        }
    }
}

impl From<&str> for HandlerResult {
    fn from(text: &str) -> Self {
        Self::Body(text.to_string())
    }
}

impl From<String> for HandlerResult {
    fn from(text: String) -> Self {
        Self::Body(text)
    }
}

impl From<StatusCode> for HandlerResult {
    fn from(status: StatusCode) -> Self {
        Self::Status(status)
    }
}

impl From<()> for HandlerResult {
    fn from((): ()) -> Self {
        Self::Empty
    }
}
