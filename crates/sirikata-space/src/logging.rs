//! Logging bootstrap, trimmed from `sn_node.rs`'s: an `EnvFilter`
//! sourced from `RUST_LOG`, a JSON or plain `tracing_subscriber`
//! formatter, and an optional `tracing-appender` rolling file sink.
//! The teacher's `FileRotateAppender`/`file_rotate` crate and
//! self-update machinery are not carried — out of scope for this
//! binary's CLI surface (§6).

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::EnvFilter;

/// Must be kept alive for the lifetime of the process when logging to
/// a file — dropping it flushes and stops the background writer
/// thread, exactly as `sn_node.rs`'s `_optional_guard` does.
pub fn init(log_dir: Option<&Path>, json_logs: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            println!("Starting logging to directory: {dir:?}");
            let file_appender = tracing_appender::rolling::daily(dir, "sirikata-space.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let builder = tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true).with_ansi(false).with_writer(non_blocking);
            if json_logs {
                builder.json().init();
            } else {
                builder.init();
            }
            Some(guard)
        }
        None => {
            let builder = tracing_subscriber::fmt().with_env_filter(filter).with_thread_names(true);
            if json_logs {
                builder.json().init();
            } else {
                builder.init();
            }
            None
        }
    }
}
