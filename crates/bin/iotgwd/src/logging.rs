//! Installs the `tracing_subscriber` the rest of the daemon logs through.

/// Parses `gateway.loglevel` (`trace`/`debug`/`info`/`warn`/`error`) into a
/// [`tracing::Level`], falling back to `info` for anything else so a typo in
/// the config document degrades gracefully rather than failing startup.
fn level_from_str(level: &str) -> tracing::Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

/// Installs the global subscriber at the level named by `loglevel`.
///
/// `RUST_LOG`, if set, takes priority over the config document — useful for
/// turning up a single module's logging without editing the gateway config.
pub fn init(loglevel: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level_from_str(loglevel).to_string()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_loglevel_falls_back_to_info() {
        assert_eq!(level_from_str("gibberish"), tracing::Level::INFO);
    }

    #[test]
    fn known_loglevels_map_directly() {
        assert_eq!(level_from_str("trace"), tracing::Level::TRACE);
        assert_eq!(level_from_str("ERROR"), tracing::Level::ERROR);
    }
}
