//! Shared mock server state.
//!
//! Route tables, the warning list and the request observer are shared between
//! the test thread that configures them and the accept loop that reads them.
//! Locks are held only while registering and while assembling a response,
//! never while a handler runs.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::http::{HeaderName, Method};
use parking_lot::RwLock;

use super::dispatch::panic_message;
use super::handler::{Handler, HandlerResult, MockRequest, RequestObserver};
use super::response::MockResponse;
use super::routes::RouteTable;

/// Routing and response state for one mock server.
pub struct MockState {
    base_path: String,
    warning_header: HeaderName,
    get: RwLock<RouteTable>,
    put: RwLock<RouteTable>,
    delete: RwLock<RouteTable>,
    warnings: RwLock<Vec<String>>,
    observer: RwLock<Option<RequestObserver>>,
}

impl MockState {
    pub fn new(base_path: String, warning_header: HeaderName) -> Self {
        Self {
            get: RwLock::new(RouteTable::new(base_path.clone())),
            put: RwLock::new(RouteTable::new(base_path.clone())),
            delete: RwLock::new(RouteTable::new(base_path.clone())),
            base_path,
            warning_header,
            warnings: RwLock::default(),
            observer: RwLock::default(),
        }
    }

    /// Create state wrapped in an Arc for sharing with the accept loop.
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    pub fn warning_header(&self) -> &HeaderName {
        &self.warning_header
    }

    /// The route table for `method`, if the server routes that verb.
    pub fn table(&self, method: &Method) -> Option<&RwLock<RouteTable>> {
        match *method {
            Method::GET => Some(&self.get),
            Method::PUT => Some(&self.put),
            Method::DELETE => Some(&self.delete),
            _ => None,
        }
    }

    /// Register a route on the table for `method`.
    ///
    /// Returns `false` if the server does not route that verb.
    pub fn add_route<F, R>(&self, method: &Method, pattern: &str, handler: F) -> bool
    where
        F: Fn(&MockRequest) -> R + Send + Sync + 'static,
        R: Into<HandlerResult>,
    {
        match self.table(method) {
            Some(table) => {
                table.write().add(pattern, handler);
                true
            }
            None => false,
        }
    }

    /// Find the handler for a request without holding the table lock afterwards.
    pub fn find_handler(&self, request: &MockRequest) -> Option<Handler> {
        let table = self.table(request.method())?.read();
        table.find(request.path_and_query()).cloned()
    }

    pub fn add_warning(&self, warning: String) {
        self.warnings.write().push(warning);
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.read().clone()
    }

    pub fn set_observer(&self, observer: RequestObserver) {
        *self.observer.write() = Some(observer);
    }

    pub fn observer(&self) -> Option<RequestObserver> {
        self.observer.read().clone()
    }

    /// Notify the observer of a completed exchange.
    ///
    /// A panicking observer is logged with its message and the server keeps
    /// serving.
    pub fn notify(&self, request: &MockRequest, response: &MockResponse) {
        let Some(observer) = self.observer() else {
            return;
        };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| observer(request, response))) {
            tracing::error!(
                method = %request.method(),
                path = request.path_and_query(),
                panic = panic_message(&*payload),
                "request observer panicked"
            );
        }
    }
}

impl std::fmt::Debug for MockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockState")
            .field("base_path", &self.base_path)
            .field("warning_header", &self.warning_header)
            .field("get", &*self.get.read())
            .field("put", &*self.put.read())
            .field("delete", &*self.delete.read())
            .field("warnings", &*self.warnings.read())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;
    use axum::http::HeaderMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state() -> MockState {
        MockState::new("/base".to_string(), HeaderName::from_static("x-nuget-warning"))
    }

    fn request(method: Method, uri: &str) -> MockRequest {
        MockRequest::new(method, uri.parse().unwrap(), HeaderMap::new(), Bytes::new())
    }

    #[test]
    fn test_tables_are_per_verb() {
        let state = state();
        assert!(state.add_route(&Method::GET, "/a", |_| "get"));
        assert!(state.add_route(&Method::DELETE, "/a", |_| "delete"));

        assert!(state.find_handler(&request(Method::GET, "/base/a")).is_some());
        assert!(state.find_handler(&request(Method::DELETE, "/base/a")).is_some());
        assert!(state.find_handler(&request(Method::PUT, "/base/a")).is_none());
    }

    #[test]
    fn test_unrouted_verb_has_no_table() {
        let state = state();

        assert!(!state.add_route(&Method::POST, "/a", |_| "post"));
        assert!(state.table(&Method::POST).is_none());
        assert!(state.find_handler(&request(Method::POST, "/base/a")).is_none());
    }

    #[test]
    fn test_warnings_keep_order() {
        let state = state();
        state.add_warning("first".to_string());
        state.add_warning("second".to_string());

        assert_eq!(state.warnings(), ["first", "second"]);
    }

    #[test]
    fn test_observer_notified() {
        let state = state();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        state.set_observer(Arc::new(move |_: &MockRequest, _: &MockResponse| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        state.notify(&request(Method::GET, "/"), &MockResponse::new());

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_observer_is_contained() {
        let state = state();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        state.set_observer(Arc::new(move |_: &MockRequest, _: &MockResponse| {
            let call = seen.fetch_add(1, Ordering::SeqCst);
            assert!(call > 0, "first exchange rejected");
        }));

        state.notify(&request(Method::GET, "/"), &MockResponse::new());
        state.notify(&request(Method::GET, "/"), &MockResponse::new());

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
