//! Shared `tracing` bootstrap for all four binaries, so `-v`/`-vv` means
//! the same thing in `yak-broker`, `yak-producer`, `yak-consumer`, and
//! `yak-coordd`.

/// Initializes the global subscriber. `RUST_LOG` always wins if set;
/// otherwise verbosity maps `0 -> info`, `1 -> debug`, `2+ -> trace`.
pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
