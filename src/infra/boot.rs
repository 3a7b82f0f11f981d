use crate::infra::config::ServerConfig;
use crate::infra::http_app::build_app;
use crate::infra::mcp::{serve_stdio, BridgeSvc};

pub async fn run_server(cfg: ServerConfig) -> anyhow::Result<()> {
    cfg.validate().map_err(|e| anyhow::anyhow!(e))?;
    tracing::info!(
        mode = %cfg.mode,
        host = %cfg.host,
        port = cfg.port,
        require_auth = cfg.require_auth,
        "BOOT rest-mcp-demo"
    );
    let policy = cfg.auth_policy();

    // Stdio mode: run MCP over stdio ONLY (no HTTP).
    if cfg.mode == "stdio" {
        serve_stdio(BridgeSvc::for_policy(&policy))
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        return Ok(());
    }

    let app = build_app(&policy);
    let listener = tokio::net::TcpListener::bind((cfg.host.as_str(), cfg.port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening; MCP mounted at /mcp");
    axum::serve(listener, app).await?;
    Ok(())
}
