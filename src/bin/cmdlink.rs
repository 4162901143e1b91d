//! cmdlink - send commands to a UDP-controlled device and print the replies.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use cmdlink_core::{Command, Endpoint, LinkConfig, Reply, Session};
use eyre::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Command/response client for single-peer UDP devices
#[derive(Parser, Debug)]
#[command(name = "cmdlink")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Local endpoint to bind (ip:port)
    #[arg(long, global = true)]
    local: Option<Endpoint>,

    /// Remote device endpoint (ip:port)
    #[arg(long, global = true)]
    remote: Option<Endpoint>,

    /// Number of poll intervals to wait for each reply
    #[arg(long, global = true)]
    timeout_attempts: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send commands in order and print each reply
    Send {
        /// Commands to send verbatim
        #[arg(required = true)]
        commands: Vec<String>,
    },

    /// Take off, hover, then land
    Flight {
        /// Seconds to hover between takeoff and land
        #[arg(long, default_value_t = 10)]
        hover_secs: u64,
    },
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> Result<LinkConfig> {
    let mut config = match &cli.config {
        Some(path) => LinkConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => LinkConfig::default(),
    };
    if let Some(local) = cli.local {
        config = config.with_local(local);
    }
    if let Some(remote) = cli.remote {
        config = config.with_remote(remote);
    }
    if let Some(attempts) = cli.timeout_attempts {
        config.wait.max_attempts = attempts;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn print_reply(command: &str, reply: Option<&Reply>) {
    match reply {
        Some(reply) => println!("{} -> {}", command, reply.to_text_lossy()),
        None => println!("{} -> <no response>", command),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let mut session = Session::open(config)
        .await
        .context("failed to open session")?;
    info!(local = %session.local_endpoint(), remote = %session.remote_endpoint(), "session ready");

    let result = match &cli.command {
        Commands::Send { commands } => send_all(&session, commands).await,
        Commands::Flight { hover_secs } => flight(&session, *hover_secs).await,
    };

    session.close().await;
    result
}

async fn send_all(session: &Session, commands: &[String]) -> Result<()> {
    for text in commands {
        let reply = session
            .send_command(&Command::new(text.as_str()))
            .await
            .with_context(|| format!("failed to send {:?}", text))?;
        print_reply(text, reply.as_ref());
    }
    Ok(())
}

async fn flight(session: &Session, hover_secs: u64) -> Result<()> {
    let reply = session.takeoff().await.context("takeoff failed")?;
    print_reply("takeoff", reply.as_ref());

    tokio::time::sleep(Duration::from_secs(hover_secs)).await;

    let reply = session.land().await.context("land failed")?;
    print_reply("land", reply.as_ref());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run(cli).await
}
