use env_logger::{Builder, Env};

/// Initialise the process logger.
///
/// `RUST_LOG` wins when set; otherwise `default_level` ("info", "debug", ...) applies.
/// Calling this more than once is harmless.
pub fn init(default_level: &str) {
    let _ = Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .try_init();
}
