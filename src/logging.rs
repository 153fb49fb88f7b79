use crate::util::hex::pretty_hex;
use log::{debug, log_enabled, Level, LevelFilter};

/// Initializes the logger with the `env_logger` crate.
///
/// The level comes from `RUST_LOG`; calling this twice is harmless.
pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env().try_init();
}

/// Initializes the logger with a fixed level, ignoring `RUST_LOG`.
///
/// Used by the CLI's `--verbose` flag.
pub fn init_logger_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init();
}

/// Dumps a raw frame at debug level. The hex rendering is skipped entirely
/// when debug output is off.
pub fn log_frame(direction: &str, bytes: &[u8]) {
    if log_enabled!(Level::Debug) {
        debug!("{} {} bytes\n{}", direction, bytes.len(), pretty_hex(bytes, 16));
    }
}
