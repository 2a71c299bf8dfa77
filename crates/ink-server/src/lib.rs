pub mod config;

pub use config::Config;

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inkconnect=debug,ink_server=debug,ink_api=debug,ink_db=info,tower_http=debug"
                    .into()
            }),
        )
        .init();
}
