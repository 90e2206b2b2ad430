/// Setting this environment variable to `1` raises the default log filter
/// to `debug` so discovery and grouping decisions become visible.
pub const DEBUG_ENV_VAR: &str = "CTF_FS_DEBUG";

pub fn try_init_tracing_subscriber() -> Result<(), Box<dyn std::error::Error>> {
    let builder = tracing_subscriber::fmt::Subscriber::builder();
    let env_filter = std::env::var(tracing_subscriber::EnvFilter::DEFAULT_ENV)
        .map(tracing_subscriber::EnvFilter::new)
        .unwrap_or_else(|_| {
            let level = if verbose_debug_enabled() {
                tracing::Level::DEBUG
            } else {
                tracing::Level::WARN
            };
            tracing_subscriber::EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                level,
            ))
        });
    let builder = builder.with_env_filter(env_filter);
    let subscriber = builder.finish();
    use tracing_subscriber::util::SubscriberInitExt;
    subscriber.try_init()?;
    Ok(())
}

pub fn verbose_debug_enabled() -> bool {
    std::env::var(DEBUG_ENV_VAR).map(|v| v == "1").unwrap_or(false)
}
