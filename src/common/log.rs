use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_tree::HierarchicalLayer;

const LOG_ENV: &str = "TESSERA_LOG";

/// Install the global subscriber. `TESSERA_LOG` takes precedence over
/// `RUST_LOG`; without either only `info` and above is shown.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let tree = HierarchicalLayer::default()
        .with_writer(std::io::stderr)
        .with_indent_lines(true)
        .with_indent_amount(2)
        .with_targets(true)
        .with_bracketed_fields(true);
    if let Err(e) = tracing_subscriber::registry().with(filter).with(tree).try_init() {
        eprintln!("tessera: logging already initialised: {e}");
    }
}
