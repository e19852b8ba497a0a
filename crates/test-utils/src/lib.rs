pub mod builders;
pub mod clock;
pub mod fake_execer;
pub mod fake_prober;
pub mod harness;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

pub use builders::{CmdBuilder, bool_input, button, choice_input, hidden_input, text_input};
pub use clock::FakeClock;
pub use fake_execer::{FakeExecer, FakeProcess};
pub use fake_prober::FakeProbeRunner;
pub use harness::Harness;

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness capture.
///
/// Reads the same `CMDCTL_LOG` directives as the binary and defaults to
/// `warn` so passing tests stay quiet under `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(cmdctl::logging::LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn with_timeout<T>(f: impl Future<Output = T>) -> T {
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("test timed out")
}

/// Poll `cond` every 10ms until it holds or `TEST_TIMEOUT` passes.
pub async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + TEST_TIMEOUT;
    while !cond() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
