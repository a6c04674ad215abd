mod args;
mod cmd;

use args::{CommandLineArgs, Parser};
use tracing_subscriber::{filter::LevelFilter, fmt::time::ChronoLocal, EnvFilter};

const LOG_LEVEL_ENV: &str = "ESLOG_LOG_LEVEL";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing_subscriber();

    let args = CommandLineArgs::parse();
    tracing::debug!("profile '{}' from '{}'", args.profile(), args.config());

    cmd::run(&args).await
}

// Logs go to stderr so stdout only carries results.
fn init_tracing_subscriber() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .with_env_var(LOG_LEVEL_ENV)
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(ChronoLocal::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
