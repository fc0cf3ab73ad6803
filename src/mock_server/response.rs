//! Response assembly helpers.

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use serde::Serialize;

use crate::error::Result;

/// Body written for requests no route matches.
pub const NOT_FOUND_BODY: &str = "404 not found";

const NO_CACHE: &str = "no-cache, no-store";

/// A response under construction by a handler.
///
/// Starts as an empty 200. Cloning is cheap: the body is reference counted.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResponse {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// The canned response for unmatched requests.
    pub fn not_found() -> Self {
        let mut response = Self::new();
        response.set_not_found();
        response
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Replace a header value.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    /// Add a header value, keeping existing values for the same name.
    pub fn append_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.append(name, value);
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Use `content` as the full response body.
    ///
    /// Marks the response as uncacheable and sets its length.
    pub fn set_response_content(&mut self, content: impl Into<Bytes>) {
        let content = content.into();
        self.headers
            .insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        self.headers
            .insert(header::CONTENT_LENGTH, HeaderValue::from(content.len()));
        self.body = content;
    }

    /// Use UTF-8 `text` as the full response body.
    pub fn set_text_content(&mut self, text: &str) {
        self.set_response_content(Bytes::copy_from_slice(text.as_bytes()));
    }

    /// Serialize `value` as the JSON response body.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be serialized.
    pub fn set_json_content<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let json = serde_json::to_vec(value)?;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.set_response_content(json);
        Ok(())
    }

    /// Turn this into the registry's 404 response.
    pub fn set_not_found(&mut self) {
        self.status = StatusCode::NOT_FOUND;
        self.set_text_content(NOT_FOUND_BODY);
    }

    /// Convert into the response written to the socket.
    pub(crate) fn to_http(&self) -> Response<Body> {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}
