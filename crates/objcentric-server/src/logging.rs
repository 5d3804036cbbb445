use objcentric_core::LogLevel;

/// Install `env_logger` at `level`. `RUST_LOG`, when set, refines the filter.
pub fn init(level: LogLevel) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level.as_filter());
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp_millis();
    // A logger may already be installed, e.g. by a test harness.
    let _ = builder.try_init();
}
