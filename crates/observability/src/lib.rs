//! Process-wide structured logging.

pub mod logging;

pub use logging::{LOG_FORMAT_KEY, LogFormat};

/// Install the global subscriber using `RUST_LOG` and `AUTH_SERVICE_LOG_FORMAT`.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    logging::init(LogFormat::from_env());
}
