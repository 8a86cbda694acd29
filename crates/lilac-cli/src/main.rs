mod chat;
mod client;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lilac_contracts::events::SessionLog;
use lilac_contracts::{ChatSession, ProviderSelector, Quality, SessionPhase};
use lilac_relay::config::DEFAULT_REQUEST_TIMEOUT_SECS;
use lilac_relay::{Relay, RelayConfig};
use tracing_subscriber::EnvFilter;

use crate::chat::{read_image_file, run_repl, ChatDriver};
use crate::client::{RelayClient, DEFAULT_RELAY_URL};

#[derive(Debug, Parser)]
#[command(name = "lilac", version, about = "Lilac image chat: relay server and terminal client")]
struct Cli {
    /// Log at debug level (RUST_LOG still wins when set).
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the provider relay.
    Serve(ServeArgs),
    /// Interactive chat against a running relay.
    Chat(ChatArgs),
    /// Send one prompt, save the image, exit.
    Generate(GenerateArgs),
}

#[derive(Debug, Parser)]
struct ServeArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Serve both routes from the credential-free renderer.
    #[arg(long)]
    offline: bool,
}

#[derive(Debug, Parser)]
struct ChatArgs {
    #[arg(long, default_value = DEFAULT_RELAY_URL)]
    relay: String,
    #[arg(long, default_value = "lilac-output")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = "openai")]
    provider: ProviderSelector,
    #[arg(long, default_value = "auto")]
    quality: Quality,
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[derive(Debug, Parser)]
struct GenerateArgs {
    #[arg(long)]
    prompt: String,
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    #[arg(long, default_value = DEFAULT_RELAY_URL)]
    relay: String,
    #[arg(long, default_value = "lilac-output")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long, default_value = "openai")]
    provider: ProviderSelector,
    #[arg(long, default_value = "auto")]
    quality: Quality,
    #[arg(long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("lilac error: {err:#}");
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<i32> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Serve(args) => run_serve(args).await,
        Command::Chat(args) => {
            run_chat(args).await?;
            Ok(0)
        }
        Command::Generate(args) => run_generate(args).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "lilac=debug" } else { "lilac=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_serve(args: ServeArgs) -> Result<i32> {
    let mut config = RelayConfig::from_env()?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let relay = if args.offline {
        tracing::info!("starting relay with offline providers");
        Relay::offline()
    } else {
        Relay::from_config(&config)?
    };
    lilac_relay::serve(&config, relay).await?;
    Ok(0)
}

async fn run_chat(args: ChatArgs) -> Result<()> {
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let client = RelayClient::new(&args.relay, Duration::from_secs(args.timeout_secs))?;
    let log = SessionLog::with_random_id(events_path);
    tracing::info!(
        relay = client.base_url(),
        session_id = log.session_id(),
        events = %log.path().display(),
        "chat session starting"
    );
    println!("Session log: {}", log.path().display());
    let driver = ChatDriver::new(
        ChatSession::new(args.provider, args.quality),
        client,
        log,
        args.out,
    );
    run_repl(driver).await
}

async fn run_generate(args: GenerateArgs) -> Result<i32> {
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let mut session = ChatSession::new(args.provider, args.quality);
    for path in &args.images {
        session.attach_upload(read_image_file(path).await?);
    }
    let client = RelayClient::new(&args.relay, Duration::from_secs(args.timeout_secs))?;
    let mut driver = ChatDriver::new(
        session,
        client,
        SessionLog::with_random_id(events_path),
        args.out,
    );

    for line in driver.send(&args.prompt).await? {
        println!("{line}");
    }
    Ok(match driver.session().phase() {
        SessionPhase::Rendered => 0,
        _ => 1,
    })
}
