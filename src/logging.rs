use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber. Call once per process;
/// embedding applications that install their own subscriber should skip this.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}
