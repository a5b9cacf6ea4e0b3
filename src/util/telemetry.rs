use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Call once from `main`.
///
/// `LOG_FORMAT=json` switches to newline-delimited JSON output for log
/// shippers; anything else keeps the human-readable formatter.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("triage_server=info,tower_http=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if dotenvy::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}
