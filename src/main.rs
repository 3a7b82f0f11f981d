use std::process::ExitCode;

use rest_mcp_demo::{cli, infra};

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = infra::config::load_dotenv();
    infra::logging::init();
    if let Err(e) = dotenv {
        tracing::warn!(error = %e, "failed to load .env");
    }
    cli::run().await
}
