//! CLI subcommand implementations for the Vitrin binary.

pub mod crawl_cmd;
pub mod serve;

/// Initialize tracing from the global flags and `RUST_LOG`.
///
/// Logs go to stderr; stdout stays reserved for command output such as
/// the crawl command's JSON.
pub(crate) fn init_tracing() {
    let directive = if std::env::var("VITRIN_VERBOSE").is_ok() {
        "vitrin=debug"
    } else {
        "vitrin=info"
    };
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse().unwrap());

    if std::env::var("VITRIN_JSON").is_ok() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
