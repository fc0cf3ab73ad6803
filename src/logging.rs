//! Tracing subscriber setup.
//!
//! Log levels come from `RUST_LOG`, falling back to `mockfeed=info`.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "mockfeed=info";

/// Install a global fmt subscriber writing to stderr.
///
/// Does nothing if a subscriber is already installed, so tests can call it freely.
pub fn init(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable() {
        init(false);
        init(true);
    }
}
