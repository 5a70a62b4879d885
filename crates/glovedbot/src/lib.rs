//! GlovedBot: a chat bot with embedding-backed long-term memory.
//!
//! This crate re-exports the building blocks and provides the console reply
//! surface and logging setup used by the `glovedbot` binary.

pub mod console;

/// Re-export for convenience.
pub use glovedbot_config as config;
pub use glovedbot_core as core;
/// Re-export for convenience.
pub use glovedbot_memory as memory;

pub use console::ConsoleSink;

/// Initialize `env_logger` with millisecond timestamps and `RUST_LOG` filters.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::builder()
        .format_timestamp_millis()
        .parse_default_env()
        .try_init();
}
