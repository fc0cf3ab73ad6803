//! Tests for the external command runner.

#![cfg(unix)]

use std::time::Duration;

use mockfeed::{run_command, CommandSpec, MockServerError};

#[tokio::test]
async fn test_captures_exit_code_and_streams() {
    let spec = CommandSpec::new("sh").args(["-c", "echo out; echo err >&2; exit 3"]);

    let output = run_command(&spec).await.unwrap();

    assert_eq!(output.exit_code, 3);
    assert!(!output.success());
    assert_eq!(output.stdout, "out\n");
    assert_eq!(output.stderr, "err\n");
}

#[tokio::test]
async fn test_applies_environment_and_working_dir() {
    let dir = std::env::temp_dir();
    let spec = CommandSpec::new("sh")
        .args(["-c", "printf '%s' \"$FEED_URL\"; pwd"])
        .env("FEED_URL", "http://127.0.0.1:1/feed")
        .working_dir(&dir);

    let output = run_command(&spec).await.unwrap();

    assert!(output.success());
    assert!(output.stdout.starts_with("http://127.0.0.1:1/feed"));
    let reported = std::path::PathBuf::from(output.stdout["http://127.0.0.1:1/feed".len()..].trim());
    assert_eq!(
        reported.canonicalize().unwrap(),
        dir.canonicalize().unwrap()
    );
}

#[tokio::test]
async fn test_timeout_kills_command() {
    let spec = CommandSpec::new("sleep")
        .args(["30"])
        .timeout(Duration::from_millis(100));

    let err = run_command(&spec).await.unwrap_err();

    assert!(matches!(err, MockServerError::CommandTimedOut { .. }));
}
