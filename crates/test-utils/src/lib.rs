//! Helpers shared by the `assetdag` integration tests.

pub mod builders;
pub mod fake_executor;
pub mod project;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING: Once = Once::new();

/// Install a test subscriber once per test binary.
///
/// Output goes through the test writer, so it only shows for failing tests.
/// `ASSETDAG_LOG=debug` raises the level, same as the binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = std::env::var(assetdag::logging::LOG_ENV_VAR)
            .ok()
            .and_then(|directive| EnvFilter::try_new(directive).ok())
            .unwrap_or_else(|| EnvFilter::new("info"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `fut`, failing the test after five seconds.
pub async fn with_timeout<F: Future>(fut: F) -> F::Output {
    with_timeout_secs(5, fut).await
}

pub async fn with_timeout_secs<F: Future>(secs: u64, fut: F) -> F::Output {
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(out) => out,
        Err(_) => panic!("test did not finish within {secs}s"),
    }
}
