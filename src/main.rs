//! punchsync main entrypoint.

use punchsync::{load_config, parse_args, run};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = parse_args();

    // RUST_LOG wins; otherwise the configured level
    let level = load_config(&cli)
        .map(|cfg| cfg.log_level)
        .unwrap_or_else(|_| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("punchsync={}", level))),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
