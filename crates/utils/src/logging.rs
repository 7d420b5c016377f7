use tracing_subscriber::{EnvFilter, prelude::*};

const WORKSPACE_TARGETS: [&str; 6] = ["utils", "cinematics", "editron", "voice", "pipeline", "dramareel"];

/// Filter directive: `warn` globally, `level` for workspace crates.
pub fn filter_directive(level: &str) -> String {
    let mut directive = String::from("warn");
    for target in WORKSPACE_TARGETS {
        directive.push_str(&format!(",{target}={level}"));
    }
    directive
}

/// Install the global fmt subscriber. `RUST_LOG` overrides the default level.
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    let env_filter = EnvFilter::try_new(filter_directive(&log_level))
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(default_level)));

    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true).with_filter(env_filter))
        .try_init();
}
