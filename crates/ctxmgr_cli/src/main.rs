//! ctxmgr CLI - stands in for a harness when driving a session by hand.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "ctxmgr")]
#[command(about = "Manual session driver for ctxmgr_core", long_about = None)]
#[command(version)]
struct Cli {
    /// Store base URL, overriding CTXMGR_STORE_URL / the built-in default.
    #[arg(long, global = true)]
    store_url: Option<String>,

    /// Session ID to operate on.
    #[arg(long, short = 's', global = true)]
    session: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a file's content into the session (spec.md §4.2 `read`)
    Read {
        /// Agent-visible path
        path: String,
        /// File content
        content: String,
    },
    /// Move a metadata-pool object into the active set
    Activate {
        /// Object ID
        id: String,
    },
    /// Move an active object back out of the active set
    Deactivate {
        /// Object ID
        id: String,
    },
    /// Pin an object, exempting it from auto-collapse
    Pin {
        /// Object ID
        id: String,
    },
    /// Unpin a previously pinned object
    Unpin {
        /// Object ID
        id: String,
    },
    /// Feed a synthetic tool result through `transform_context`
    ToolResult {
        /// Tool name
        tool: String,
        /// Tool output text
        output: String,
        /// Whether the tool call succeeded
        #[arg(long)]
        failed: bool,
        /// Stream epoch to report (defaults to 1)
        #[arg(long, default_value_t = 1)]
        stream_epoch: u64,
        /// Message timestamp (unix seconds, defaults to 0)
        #[arg(long, default_value_t = 0)]
        timestamp: i64,
    },
    /// Render the full assembled context and print it
    Render {
        /// System prompt content to seed a fresh session with
        #[arg(long)]
        system_prompt: Option<String>,
    },
    /// Print the three forward-set contents for inspection
    Sets,
    /// Print every committed version of one object
    History {
        /// Object ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store_url = cli
        .store_url
        .unwrap_or_else(|| std::env::var("CTXMGR_STORE_URL").unwrap_or_else(|_| "http://127.0.0.1:3000".to_string()));
    let session = cli.session.as_str();

    match cli.command {
        Commands::Read { path, content } => {
            commands::content::read(&store_url, session, &path, &content).await
        }
        Commands::Activate { id } => commands::content::activate(&store_url, session, &id).await,
        Commands::Deactivate { id } => {
            commands::content::deactivate(&store_url, session, &id).await
        }
        Commands::Pin { id } => commands::content::pin(&store_url, session, &id).await,
        Commands::Unpin { id } => commands::content::unpin(&store_url, session, &id).await,
        Commands::ToolResult {
            tool,
            output,
            failed,
            stream_epoch,
            timestamp,
        } => {
            commands::content::tool_result(
                &store_url,
                session,
                &tool,
                !failed,
                &output,
                stream_epoch,
                timestamp,
            )
            .await
        }
        Commands::Render { system_prompt } => {
            commands::render::show(&store_url, session, system_prompt).await
        }
        Commands::Sets => commands::render::sets(&store_url, session).await,
        Commands::History { id } => commands::render::history(&store_url, session, &id).await,
    }
}
