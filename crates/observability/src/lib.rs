//! Tracing/logging setup shared by the binary and tests.

pub mod tracing;

pub use tracing::{LogFormat, UnknownLogFormat};

/// Initialize process-wide logging.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}
