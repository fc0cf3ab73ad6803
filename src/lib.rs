//! Mock package registry for client integration tests.
//!
//! A small in-process HTTP server that stands in for a package feed. Tests
//! register handlers for GET, PUT and DELETE under path prefixes, run the
//! client under test against the server, and inspect the traffic.
//!
//! # Quick Start
//!
//! ```no_run
//! use mockfeed::mock_server::{HandlerResult, MockServer};
//!
//! #[tokio::main]
//! async fn main() -> mockfeed::Result<()> {
//!     let server = MockServer::new()?;
//!
//!     // More specific prefixes first: the first match wins.
//!     server.get("/packages/foo/1.0.0", |_| "foo 1.0.0");
//!     server.get("/packages/foo", |_| "foo");
//!     server.put("/api/v2/package", |request| {
//!         println!("pushed {} bytes", request.pushed_package().len());
//!         HandlerResult::status(axum::http::StatusCode::CREATED)
//!     });
//!     server.add_warning("This feed is deprecated");
//!
//!     server.start().await?;
//!     println!("feed at {}", server.url());
//!
//!     server.dispose().await;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`mock_server`] - the server, its route tables and response helpers
//! - [`multipart`] - package payload extraction from push uploads
//! - [`port`] - exclusive local port reservation
//! - [`process`] - external command runner for fixtures that drive a real client
//!
//! # Configuration
//!
//! [`MockServerConfig::from_env`] reads `MOCKFEED_HOST`,
//! `MOCKFEED_WARNING_HEADER` and `MOCKFEED_BASE_PATH`.

pub mod cli;
mod config;
mod error;
pub mod logging;
pub mod mock_server;
pub mod multipart;
pub mod port;
pub mod process;

// Re-export core types
pub use config::{MockServerConfig, DEFAULT_WARNING_HEADER};
pub use error::{MockServerError, Result};
pub use mock_server::{HandlerResult, MockRequest, MockResponse, MockServer};
pub use port::PortReservation;
pub use process::{run_command, CommandOutput, CommandSpec};
