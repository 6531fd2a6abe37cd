pub mod app;
pub mod cli;
pub mod config;
pub mod errors;
pub mod gmail;
pub mod oauth;
pub mod onboarding;
pub mod reply;
pub mod storage;
pub mod types;
pub mod workflow;

use tracing_subscriber::EnvFilter;

/// `RUST_LOG` filter, `info` when unset.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(filter)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
