/// Install the process-wide `tracing` subscriber.
///
/// `level` is the configured log level string (`trace`/`debug`/`info`/`warn`/
/// `error`); invalid values fall back to `info`. Respects `RUST_LOG` if set,
/// so a developer can override the configured level without touching config.
pub fn init(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
