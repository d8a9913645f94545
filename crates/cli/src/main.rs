//! AgentMesh CLI, the main entry point.
//!
//! Commands:
//! - `init`      Write a default config
//! - `serve`     Start the HTTP gateway
//! - `discover`  Probe endpoints and list agents
//! - `route`     Show which agent a task would go to
//! - `delegate`  Route and delegate a task
//! - `call`      Call a named agent and skill
//! - `context`   Inspect and prune archived context
//! - `doctor`    Diagnose configuration and reachability

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "agentmesh",
    about = "AgentMesh: discover, route, and delegate tasks across A2A agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Config file (defaults to ~/.agentmesh/config.toml)
    #[arg(short, long, global = true, env = "AGENTMESH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Probe candidate endpoints and list discovered agents
    Discover,

    /// Show which agent and skill a task would be routed to
    Route {
        task: String,
    },

    /// Route a task to the best agent and delegate it
    Delegate {
        task: String,

        #[arg(short, long, default_value = "cli")]
        user: String,

        #[arg(short, long)]
        server: Option<String>,

        /// Extra context sent ahead of the task
        #[arg(long)]
        context: Option<String>,
    },

    /// Call a specific agent and skill directly
    Call {
        agent: String,
        skill: String,
        task: String,

        #[arg(short, long, default_value = "cli")]
        user: String,

        #[arg(short, long)]
        server: Option<String>,
    },

    /// Inspect and prune archived conversation context
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Diagnose configuration and agent reachability
    Doctor,
}

#[derive(Subcommand)]
enum ContextAction {
    /// Show a user's archive statistics and persona
    Stats {
        #[arg(short, long)]
        user: String,
    },

    /// Retrieve context for a query as it would be sent to an agent
    Search {
        #[arg(short, long)]
        user: String,

        query: String,

        #[arg(long)]
        max_chunks: Option<usize>,

        #[arg(long)]
        max_tokens: Option<usize>,
    },

    /// Delete chunks older than the retention window
    Cleanup {
        /// Age in days; defaults to context.retention_days
        #[arg(short, long)]
        days: Option<u32>,
    },
}

fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_format);

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => commands::init::run(config_path, force)?,
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Discover => commands::agents::discover(config_path).await?,
        Commands::Route { task } => commands::agents::route(config_path, &task).await?,
        Commands::Delegate {
            task,
            user,
            server,
            context,
        } => {
            commands::agents::delegate(config_path, &task, &user, server.as_deref(), context.as_deref())
                .await?
        }
        Commands::Call {
            agent,
            skill,
            task,
            user,
            server,
        } => commands::agents::call(config_path, &agent, &skill, &task, &user, server.as_deref()).await?,
        Commands::Context { action } => match action {
            ContextAction::Stats { user } => commands::context::stats(config_path, &user).await?,
            ContextAction::Search {
                user,
                query,
                max_chunks,
                max_tokens,
            } => commands::context::search(config_path, &user, &query, max_chunks, max_tokens).await?,
            ContextAction::Cleanup { days } => commands::context::cleanup(config_path, days).await?,
        },
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
