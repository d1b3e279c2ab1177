//! Switchyard CLI binary entry point.

use clap::Parser;
use switchyard::cli::{self, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    cli::init_tracing(cli.log_json);

    if let Err(e) = cli::execute(cli).await {
        tracing::debug!(kind = %e.kind(), "command failed");
        eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        std::process::exit(1);
    }
}
