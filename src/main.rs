use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod client;
mod commands;
mod config;
mod console;
mod session;

use client::Client;
use commands::{
    AuthCommand, CommandError, ConfigCommand, CourseCommand, NoteCommand, ProfileCommand,
    TopicCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "notes")]
#[command(version)]
#[command(about = "Keep course notes in sync with your notes server", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log requests and sync steps to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in, log out, or show the saved session
    Auth(AuthCommand),

    /// Manage courses
    Course(CourseCommand),

    /// Manage topics inside a course
    Topic(TopicCommand),

    /// Manage notes inside a topic
    Note(NoteCommand),

    /// Show or change your profile
    Profile(ProfileCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        if !e.is_reported() {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose {
        "notes=debug,coursenotes_core=debug"
    } else {
        "notes=warn,coursenotes_core=warn"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), CommandError> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Save config path for init command
    let cli_config_path = cli.config.clone();

    let config = Config::load(cli.config)?;

    match &cli.command {
        Some(Commands::Config(cmd)) => cmd.run(&config, cli_config_path)?,
        Some(Commands::Auth(cmd)) => {
            let client = Client::connect(&config)?;
            cmd.run(&client, &config).await?;
        }
        Some(Commands::Course(cmd)) => cmd.run(&Client::connect(&config)?).await?,
        Some(Commands::Topic(cmd)) => cmd.run(&Client::connect(&config)?).await?,
        Some(Commands::Note(cmd)) => cmd.run(&Client::connect(&config)?).await?,
        Some(Commands::Profile(cmd)) => cmd.run(&Client::connect(&config)?).await?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}
