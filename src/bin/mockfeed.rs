//! Mock feed CLI binary.
//!
//! Serves a minimal push-capable feed so a client can be exercised by hand.

use std::process::ExitCode;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::StatusCode;
use clap::Parser;
use mockfeed::cli::{Cli, Command};
use mockfeed::mock_server::{Fixtures, HandlerResult, MockServer};
use parking_lot::Mutex;

const PUSH_PATH: &str = "/api/v2/package";

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    mockfeed::logging::init(cli.json_logs);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "mockfeed failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> mockfeed::Result<()> {
    let config = cli.command.config();
    match cli.command {
        Command::Serve { warnings, .. } => serve(MockServer::with_config(config)?, warnings).await,
    }
}

async fn serve(server: MockServer, warnings: Vec<String>) -> mockfeed::Result<()> {
    let pushed: Arc<Mutex<Vec<Bytes>>> = Arc::default();

    Fixtures::register_service_index(&server);
    register_feed_routes(&server, &pushed);
    for warning in warnings {
        server.add_warning(warning);
    }
    server.set_request_observer(|request, response| {
        tracing::info!(
            method = %request.method(),
            path = request.path_and_query(),
            status = response.status().as_u16(),
            "handled request"
        );
    });

    server.start().await?;
    tracing::info!(
        feed = %format!("{}/index.json", server.url()),
        "mock feed ready, press Ctrl-C to stop"
    );

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl-C, stopping");
    }

    let stopped = server.stop().await;
    server.dispose().await;
    stopped
}

fn register_feed_routes(server: &MockServer, pushed: &Arc<Mutex<Vec<Bytes>>>) {
    let store = Arc::clone(pushed);
    server.get(&format!("{PUSH_PATH}/"), move |request| {
        let index = request
            .path()
            .rsplit('/')
            .next()
            .and_then(|segment| segment.parse::<usize>().ok());
        match index.and_then(|i| store.lock().get(i).cloned()) {
            Some(package) => HandlerResult::respond(move |response| {
                response.set_response_content(package);
            }),
            None => HandlerResult::status(StatusCode::NOT_FOUND),
        }
    });

    let store = Arc::clone(pushed);
    server.put(PUSH_PATH, move |request| {
        let package = request.pushed_package();
        if package.is_empty() {
            return HandlerResult::status(StatusCode::BAD_REQUEST);
        }

        let bytes = package.len();
        let mut store = store.lock();
        store.push(package);
        tracing::info!(index = store.len() - 1, bytes, "package pushed");
        HandlerResult::status(StatusCode::CREATED)
    });

    server.delete(&format!("{PUSH_PATH}/"), |_| StatusCode::NO_CONTENT);
}
