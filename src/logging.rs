use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes console logging for a batch run.
///
/// Defaults the crate to `info` so stage banners and progress counts are
/// visible; `RUST_LOG` overrides as usual.
pub fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("druglink=info".parse().unwrap()))
        .with(fmt::layer().with_writer(std::io::stdout))
        .init();
}
