pub mod builders;
pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::Once;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sequencer::WatchQueue;
use tracing_subscriber::{fmt, EnvFilter};

pub use builders::ScriptBuilder;
pub use fixtures::SequenceDir;

static INIT: Once = Once::new();

/// Default upper bound for the polling helpers below.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Poll `cond` every 10ms until it holds or `timeout` elapses.
///
/// Returns whether the condition was met.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(10));
    }
}

/// Wait until `queue` holds at least `size` paths.
pub fn await_queue_size(queue: &WatchQueue, size: usize, timeout: Duration) -> bool {
    wait_until(timeout, || queue.len() >= size)
}

/// Append `content` to `path` from another thread after `delay`.
pub fn touch_later(path: impl AsRef<Path>, content: &str, delay: Duration) -> JoinHandle<()> {
    let path: PathBuf = path.as_ref().to_path_buf();
    let content = content.to_string();
    thread::spawn(move || {
        thread::sleep(delay);
        append(&path, &content);
    })
}

/// Append `content` to an existing file.
pub fn append(path: &Path, content: &str) {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .open(path)
        .expect("failed to open file for appending");
    file.write_all(content.as_bytes())
        .expect("failed to append to file");
    file.sync_all().expect("failed to sync file");
}
