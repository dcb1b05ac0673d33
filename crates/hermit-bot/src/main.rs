//! Hermit entry point
//!
//! Wires the core together: background execution loop, MCP connector,
//! agent runtime, then the two serving surfaces (Telegram long polling and
//! the web UI). Both surfaces are synchronous threads that submit work to
//! the background loop and block with a timeout.

mod telegram;
mod web;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hermit_core::agent::{initialize_blocking, AgentRuntime, RuntimePaths};
use hermit_core::ai::LlmRunner;
use hermit_core::config::{Settings, Timeouts};
use hermit_core::exec::BackgroundLoop;
use hermit_core::mcp::RmcpConnector;

#[derive(Parser)]
#[command(name = "hermit", about = "MCP-backed chat agent for Telegram and the web")]
struct Args {
    /// MCP server-list document
    #[arg(long, default_value = "mcp_config.json")]
    config: PathBuf,

    /// Agent instructions file
    #[arg(long, default_value = "prompts/agent.txt")]
    prompt: PathBuf,

    /// Port for the web UI
    #[arg(long, default_value_t = 5001)]
    web_port: u16,

    /// Disable the web UI
    #[arg(long)]
    no_web: bool,

    /// Also write logs to logs/hermit.log
    #[arg(long)]
    log_file: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_file)?;

    let settings = Settings::from_env().context("invalid environment configuration")?;
    let timeouts = Timeouts::from_env();

    let background = Arc::new(BackgroundLoop::start()?);
    let project_root = std::env::current_dir().context("cannot resolve working directory")?;
    let runtime = Arc::new(AgentRuntime::new(
        Arc::new(RmcpConnector::new(project_root)),
        Arc::new(LlmRunner::new()),
        settings.clone(),
        timeouts,
        RuntimePaths {
            servers: args.config.clone(),
            prompt: args.prompt.clone(),
        },
    ));

    // A failed first initialization is not fatal: the process keeps serving
    // so /status shows what went wrong and a config edit can fix it.
    match initialize_blocking(&background, &runtime) {
        Ok(()) => log_tool_summary(&background, &runtime),
        Err(e) => error!("Initial setup failed: {:#}", e),
    }

    let web_thread = if args.no_web {
        None
    } else {
        let background = background.clone();
        let runtime = runtime.clone();
        let config_path = args.config.clone();
        let port = args.web_port;
        Some(std::thread::spawn(move || {
            if let Err(e) = web::serve(port, config_path, background, runtime) {
                error!("Web server stopped: {:#}", e);
            }
        }))
    };

    match settings.telegram_token.as_deref() {
        Some(token) => telegram::run(token, background, runtime),
        None => {
            info!("TELEGRAM_BOT_TOKEN not set, serving the web UI only");
            match web_thread {
                Some(thread) => {
                    let _ = thread.join();
                    Ok(())
                }
                None => anyhow::bail!("nothing to serve: no Telegram token and --no-web given"),
            }
        }
    }
}

/// Stdout subscriber, plus a plain-text file writer when asked for.
fn init_logging(log_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(fmt::layer());

    if log_file {
        std::fs::create_dir_all("logs").context("cannot create logs directory")?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("logs/hermit.log")
            .context("cannot open logs/hermit.log")?;
        registry
            .with(fmt::layer().with_ansi(false).with_writer(file))
            .init();
    } else {
        registry.init();
    }
    Ok(())
}

/// Startup printout of what each connected server advertises.
fn log_tool_summary(background: &BackgroundLoop, runtime: &Arc<AgentRuntime>) {
    let rt = runtime.clone();
    let reports = match background.submit(
        async move { rt.server_reports().await },
        std::time::Duration::from_secs(5),
    ) {
        Ok(reports) => reports,
        Err(_) => return,
    };

    for report in reports {
        info!(
            "🔧 {} [{}] {:?}: {} tool(s)",
            report.name,
            report.transport,
            report.status,
            report.tools.len()
        );
        for tool in &report.tools {
            info!(" - {}", tool.name);
        }
    }
}
