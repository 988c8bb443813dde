// SPDX-License-Identifier: MIT OR Apache-2.0

//! CLI entry point: parses arguments, loads configuration, opens the
//! meta-session (fatal if it fails) and the data-session (non-fatal),
//! auto-seeds the registry on first boot, then runs the transport loop.
//!
//! Wire framing here is intentionally thin (`spec.md §6`): a line-delimited
//! stdio JSON-RPC loop for `--transport stdio`, modeled on the upstream
//! `server_lifecycle::run_stdio_transport` shape. SSE is out of scope for
//! this build and reports a configuration error rather than pretending to
//! serve one.

use clap::Parser;
use registry_mcp_server::artifact::ArtifactKind;
use registry_mcp_server::config::{ServerConfig, Transport};
use registry_mcp_server::constants::DEFAULT_PERSONA;
use registry_mcp_server::database::{Database, DataSession, DatabaseProvider};
use registry_mcp_server::dispatcher::Dispatcher;
use registry_mcp_server::errors::ErrorCode;
use registry_mcp_server::jsonrpc::JsonRpcRequest;
use registry_mcp_server::mcp;
use registry_mcp_server::registry::models::{ToolRecord, ToolState};
use registry_mcp_server::{AppError, AppResult};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info, warn};

/// A registry-backed MCP server: tools, resources, and prompts are rows in
/// a database rather than compiled-in source files.
#[derive(Debug, Parser)]
#[command(name = "registry-mcp-server", version)]
struct Args {
    /// Transport to serve the MCP protocol over.
    #[arg(long, value_parser = ["stdio", "sse"])]
    transport: Option<String>,

    /// Bind host, only meaningful for `--transport sse`.
    #[arg(long)]
    host: Option<String>,

    /// Bind port, only meaningful for `--transport sse`.
    #[arg(long)]
    port: Option<u16>,

    /// `tracing-subscriber` env-filter directive, e.g. `info` or `debug`.
    #[arg(long)]
    log_level: Option<String>,

    /// Directory for log output (reserved; stdout is always written to).
    #[arg(long)]
    logs_dir: Option<std::path::PathBuf>,

    /// Metadata (registry/audit) store connection URL.
    #[arg(long)]
    metadata_url: Option<String>,

    /// Data-session connection URL for dispatched SQL tools.
    #[arg(long)]
    data_url: Option<String>,

    /// Unused by this build; accepted for forward compatibility with
    /// file-based configuration layers.
    #[allow(dead_code)]
    #[arg(long)]
    config: Option<std::path::PathBuf>,
}

fn apply_overrides(mut config: ServerConfig, args: &Args) -> AppResult<ServerConfig> {
    if let Some(transport) = &args.transport {
        config.transport = match transport.as_str() {
            "stdio" => Transport::Stdio,
            "sse" => Transport::Sse,
            other => return Err(AppError::new(ErrorCode::ConfigError, format!("unrecognized transport '{other}'"))),
        };
    }
    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }
    if args.logs_dir.is_some() {
        config.logs_dir = args.logs_dir.clone();
    }
    if let Some(metadata_url) = &args.metadata_url {
        config.metadata_url = metadata_url.clone();
    }
    if let Some(data_url) = &args.data_url {
        config.data_url = Some(data_url.clone());
    }
    Ok(config)
}

/// Seeds a minimal `utility_greet` tool when the registry is empty, so a
/// freshly-provisioned metadata store has at least one callable tool
/// (`spec.md §8` scenario 1).
async fn seed_registry_if_empty(meta: &Database) -> AppResult<()> {
    if !meta.list_tools(DEFAULT_PERSONA).await?.is_empty() {
        return Ok(());
    }

    info!("registry is empty, seeding the well-known tool set");
    let body = "class GreetTool(Tool):\n    def run(self, arguments):\n        return \"Hello, \" + arguments[\"name\"]\n";
    let digest = meta.put_artifact(body, ArtifactKind::Script).await?;

    let record = ToolRecord {
        name: "utility_greet".to_owned(),
        persona: DEFAULT_PERSONA.to_owned(),
        description: "Greets the caller by name.".to_owned(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": { "name": { "type": "string", "description": "name to greet" } },
            "required": ["name"],
        }),
        artifact_digest: digest,
        is_auto_created: false,
        group: "utility".to_owned(),
        manual: None,
        state: ToolState::Created,
    };
    meta.upsert_tool(&record).await
}

async fn run_stdio_transport(dispatcher: Arc<Dispatcher>) -> AppResult<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| AppError::new(ErrorCode::InternalError, format!("stdin read failed: {e}")))?;
        let Some(line) = line else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let request = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(req) => req,
            Err(e) => {
                warn!("failed to parse incoming request: {e}");
                continue;
            }
        };

        let response = mcp::dispatch(&dispatcher, request).await;
        let mut payload = serde_json::to_vec(&response)
            .map_err(|e| AppError::new(ErrorCode::InternalError, format!("failed to serialize response: {e}")))?;
        payload.push(b'\n');
        stdout
            .write_all(&payload)
            .await
            .map_err(|e| AppError::new(ErrorCode::InternalError, format!("stdout write failed: {e}")))?;
        stdout
            .flush()
            .await
            .map_err(|e| AppError::new(ErrorCode::InternalError, format!("stdout flush failed: {e}")))?;
    }

    Ok(())
}

async fn run(args: Args) -> AppResult<()> {
    let config = apply_overrides(ServerConfig::from_env()?, &args)?;
    registry_mcp_server::logging::init_from_env(&config)?;
    info!("starting registry-mcp-server ({})", config.summary());

    let meta = Database::new(&config.metadata_url).await?;
    meta.migrate().await?;

    let data_session = match &config.data_url {
        Some(url) => match DataSession::connect(url).await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!("data-session connect failed, starting in offline mode: {}", e.internal_details());
                None
            }
        },
        None => None,
    };

    seed_registry_if_empty(&meta).await?;

    let dispatcher = Dispatcher::new(meta, data_session);

    match config.transport {
        Transport::Stdio => run_stdio_transport(dispatcher).await,
        Transport::Sse => Err(AppError::new(
            ErrorCode::ConfigError,
            "sse transport is not implemented by this build; use --transport stdio",
        )),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {}", e.internal_details());
            ExitCode::FAILURE
        }
    }
}
