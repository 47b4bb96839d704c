use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fitnesse_client::{ClientConfig, CoachSession};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod util;

use commands::chat::ChatCommands;
use commands::log::LogCommands;
use commands::plan::PlanCommands;
use util::{EXIT_USAGE, exit_error};

const LOG_FORMAT_ENV: &str = "FITNESSE_LOG_FORMAT";
const DEFAULT_LOG_FILTER: &str = "fitnesse_client=info,fitnesse_cli=info";

#[derive(Parser)]
#[command(
    name = "fitnesse",
    version,
    about = "Fitnesse CLI: chat with your coaching agents, log meals and workouts, view plans"
)]
struct Cli {
    /// API base URL
    #[arg(long, env = "FITNESSE_API_URL")]
    api_url: Option<String>,

    /// File holding per-agent conversation ids
    #[arg(long, env = "FITNESSE_SESSION_FILE")]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show onboarding status and which plans exist
    State,
    /// Talk to the coaching agents
    Chat {
        #[command(subcommand)]
        command: ChatCommands,
    },
    /// Log meals, workouts and goal check-ins
    Log {
        #[command(subcommand)]
        command: LogCommands,
    },
    /// Generate and view meal and workout plans
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = std::env::var(LOG_FORMAT_ENV).is_ok_and(|format| format.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();
    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(api_url) = cli.api_url.as_deref() {
        config = config.with_api_url(api_url);
    }
    if let Some(path) = cli.session_file {
        config.session_file = Some(path);
    }

    let session = match CoachSession::connect(&config) {
        Ok(session) => session,
        Err(err) => exit_error(
            &err.to_string(),
            Some("Check FITNESSE_API_URL or --api-url"),
            EXIT_USAGE,
        ),
    };
    if !session.sessions().is_durable() {
        tracing::warn!("conversation ids will not survive this process");
    }

    let code = match cli.command {
        Commands::State => commands::state::run(&session).await,
        Commands::Chat { command } => commands::chat::run(&session, command).await,
        Commands::Log { command } => commands::log::run(&session, command).await,
        Commands::Plan { command } => commands::plan::run(&session, command).await,
    };

    session.sessions().flush().await;
    std::process::exit(code);
}
