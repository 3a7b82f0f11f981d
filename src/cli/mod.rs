use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;

use crate::agent::error::is_missing_api_key;
use crate::agent::{EventPrinter, ReactAgent, ToolSource};
use crate::clients::mcp::McpToolbox;
use crate::clients::openai::OpenAiChat;
use crate::infra::config::{AgentConfig, ServerConfig};

pub const DEFAULT_QUERY: &str = "What is the welcome message from the FastAPI server?";

#[derive(Parser)]
#[command(name = "rest-mcp-demo")]
#[command(about = "REST endpoints exported as MCP tools, plus an agent that uses them")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the REST + MCP server (MODE, HOST, PORT, REQUIRE_AUTH, AUTH_TOKEN)
    Serve {
        /// Override PORT
        #[arg(short, long)]
        port: Option<u16>,
        /// Guard /greet/{name} with the bearer token
        #[arg(long)]
        require_auth: bool,
    },
    /// Connect an LLM agent to the MCP server(s) and run queries
    Agent {
        /// Query to run; repeat for several
        #[arg(short, long = "query")]
        queries: Vec<String>,
        /// TOML file declaring MCP servers and model
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Health check a running server
    Health {
        /// Service URL to check
        #[arg(short, long, default_value = "http://127.0.0.1:8000")]
        url: String,
    },
    /// Validate configuration
    Config {
        /// Validate config without starting service
        #[arg(long)]
        validate: bool,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();

    run_commands(cli.command).await
}

pub async fn run_commands(command: Commands) -> ExitCode {
    match command {
        Commands::Serve { port, require_auth } => {
            let mut cfg = ServerConfig::from_env();
            if let Some(port) = port {
                cfg.port = port;
            }
            cfg.require_auth |= require_auth;
            match crate::infra::boot::run_server(cfg).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("❌ Server failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Agent { queries, config } => match run_agent(config, queries).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                println!("An error occurred during agent execution: {e}");
                if is_missing_api_key(&e) {
                    println!("Hint: Make sure OPENAI_API_KEY is defined correctly in your .env file.");
                }
                ExitCode::FAILURE
            }
        },
        Commands::Health { url } => match health_check(&url).await {
            Ok(_) => {
                println!("✅ Service is healthy");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Health check failed: {}", e);
                ExitCode::FAILURE
            }
        },
        Commands::Config { validate: _ } => match validate_config() {
            Ok(_) => {
                println!("✅ Configuration is valid");
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("❌ Configuration validation failed: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run_agent(config: Option<PathBuf>, queries: Vec<String>) -> anyhow::Result<()> {
    let cfg = AgentConfig::load(config.as_deref())?;
    let model = Arc::new(OpenAiChat::from_config(&cfg)?);

    println!("Connecting to MCP server(s)...");
    let toolbox = Arc::new(McpToolbox::connect(&cfg.servers).await?);
    let queries = queries_or_default(queries);
    let result = run_queries(toolbox.clone(), model, &cfg, &queries).await;
    toolbox.close().await;
    result
}

fn queries_or_default(queries: Vec<String>) -> Vec<String> {
    if queries.is_empty() {
        vec![DEFAULT_QUERY.to_string()]
    } else {
        queries
    }
}

async fn run_queries(
    toolbox: Arc<McpToolbox>,
    model: Arc<OpenAiChat>,
    cfg: &AgentConfig,
    queries: &[String],
) -> anyhow::Result<()> {
    println!("Discovering tools...");
    let specs = toolbox.list_tools().await?;
    if specs.is_empty() {
        println!("Error: No tools discovered from the MCP server.");
        println!("Ensure the server is running and the MCP bridge is mounted.");
        return Ok(());
    }
    println!("Discovered tools: {:?}", toolbox.tool_names());

    tracing::debug!(model = model.model(), "creating agent");
    let agent = ReactAgent::new(model, toolbox, specs).with_max_iterations(cfg.max_iterations);
    println!("Agent created. Ready for query.");

    let mut stdout = std::io::stdout();
    for query in queries {
        println!("\nInvoking agent with query: '{query}'");
        drive(&agent, query, &mut stdout).await?;
    }
    Ok(())
}

/// Run one query and write the rendered events to `out`.
pub async fn drive(
    agent: &ReactAgent,
    query: &str,
    out: &mut dyn Write,
) -> anyhow::Result<String> {
    let mut printer = EventPrinter::new();
    let events = agent.stream_events(query);
    futures::pin_mut!(events);
    while let Some(event) = events.next().await {
        let event = event?;
        if let Some(text) = printer.render(&event) {
            out.write_all(text.as_bytes())?;
            out.flush()?;
        }
    }
    Ok(printer.final_answer().to_string())
}

async fn health_check(url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/healthz", url.trim_end_matches('/')))
        .timeout(std::time::Duration::from_millis(500))
        .send()
        .await?;

    if response.status().is_success() {
        Ok(())
    } else {
        Err(format!("HTTP {}", response.status()).into())
    }
}

fn validate_config() -> Result<(), Box<dyn std::error::Error>> {
    let server = ServerConfig::from_env();
    server.validate()?;

    let agent = AgentConfig::load(None)?;
    println!("📋 Configuration:");
    println!("  Mode: {}", server.mode);
    println!("  Listen: {}:{}", server.host, server.port);
    println!("  Greeting auth: {}", if server.require_auth { "bearer" } else { "open" });
    println!("  Model: {}", agent.model);
    println!(
        "  OPENAI_API_KEY: {}",
        if agent.openai_api_key.is_some() { "set" } else { "not set" }
    );
    for (name, s) in &agent.servers {
        println!("  MCP server {name}: {} ({:?})", s.url, s.transport);
    }
    Ok(())
}
