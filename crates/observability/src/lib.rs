//! Tracing/logging setup shared by binaries and tests.

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize process-wide logging in the given format.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}
