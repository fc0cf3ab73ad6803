//! Mock package registry server for integration tests.
//!
//! This module provides an in-process HTTP server that stands in for a
//! package feed. Tests register handlers per verb under path prefixes, point
//! the client under test at [`MockServer::url`], and assert on what the
//! client sent and how it reacted to the responses.
//!
//! # Example
//!
//! ```ignore
//! use mockfeed::mock_server::{HandlerResult, MockServer};
//!
//! #[tokio::test]
//! async fn test_push() {
//!     let server = MockServer::new().unwrap();
//!     server.put("/api/v2/package", |request| {
//!         assert!(!request.pushed_package().is_empty());
//!         HandlerResult::status(axum::http::StatusCode::CREATED)
//!     });
//!     server.start().await.unwrap();
//!
//!     // ... push to format!("{}/api/v2/package", server.url()) ...
//!
//!     server.dispose().await;
//! }
//! ```

mod abort;
mod dispatch;
mod fixtures;
mod handler;
mod response;
mod routes;
mod server;
mod state;

pub use abort::{is_intentional_abort, Platform};
pub use fixtures::{Fixtures, ServiceIndex, ServiceResource};
pub use handler::{
    AuthScheme, Handler, HandlerResult, MockRequest, Principal, RequestObserver, API_KEY_HEADER,
};
pub use response::{MockResponse, NOT_FOUND_BODY};
pub use routes::RouteTable;
pub use server::{Lifecycle, MockServer};
pub use state::MockState;
