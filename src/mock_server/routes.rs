//! Per-verb route tables.
//!
//! Routes are literal path-and-query prefixes checked in registration order;
//! the first prefix that matches wins. Register specific prefixes before the
//! general ones that would otherwise shadow them.

use std::fmt;
use std::sync::Arc;

use super::handler::{Handler, HandlerResult, MockRequest};

/// Ordered `(pattern, handler)` pairs for one HTTP verb under one base path.
#[derive(Clone)]
pub struct RouteTable {
    base_path: String,
    routes: Vec<(String, Handler)>,
}

impl RouteTable {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            routes: Vec::new(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Append a route for `base_path + pattern`.
    pub fn add<F, R>(&mut self, pattern: &str, handler: F)
    where
        F: Fn(&MockRequest) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        let handler: Handler = Arc::new(move |request| handler(request).into());
        self.routes
            .push((format!("{}{}", self.base_path, pattern), handler));
    }

    /// First handler whose full pattern prefixes `path_and_query`.
    pub fn find(&self, path_and_query: &str) -> Option<&Handler> {
        self.routes
            .iter()
            .find(|(pattern, _)| path_and_query.starts_with(pattern.as_str()))
            .map(|(_, handler)| handler)
    }

    /// Full patterns in registration order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(pattern, _)| pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("base_path", &self.base_path)
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}
