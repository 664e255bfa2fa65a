//! Minechat CLI - chat client for the minechat dual-socket server.
//!
//! This is the main binary entry point. See the `minechat` library
//! for the connection core.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use minechat::outbound::Delivery;
use minechat::{console, credentials, inbound, oneshot, registration, transcript};
use minechat::{channels, Config, SessionError, Supervisor};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Exit status for a rejected or missing token.
const EXIT_INVALID_TOKEN: u8 = 2;

/// How long runtime shutdown waits for blocking tasks (the stdin reader).
const SHUTDOWN_GRACE: Duration = Duration::from_millis(200);

// CLI
#[derive(Parser)]
#[command(name = "minechat")]
#[command(version)]
#[command(about = "Resilient client for the minechat line-oriented chat")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Chat server host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port of the broadcast (read) socket
    #[arg(long, global = true)]
    read_port: Option<u16>,

    /// Port of the authenticated (write) socket
    #[arg(long, global = true)]
    write_port: Option<u16>,

    /// Credentials file holding the account token
    #[arg(long, global = true)]
    credentials: Option<PathBuf>,

    /// Transcript file for received messages
    #[arg(long, global = true)]
    transcript: Option<PathBuf>,

    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr (or set MINECHAT_LOG_FILE)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full chat client (default)
    Run,
    /// Only stream broadcast messages
    Listen,
    /// Send a single message and exit
    Send {
        /// Message text
        #[arg(required = true)]
        message: Vec<String>,
        /// Nickname to register with when no usable token exists (asked for otherwise)
        #[arg(long)]
        register_as: Option<String>,
    },
    /// Register a new account and save its credentials
    Register {
        /// Preferred nickname
        #[arg(required = true)]
        name: Vec<String>,
    },
}

fn init_logging(log_file: Option<PathBuf>) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();

    // Keep log lines out of the chat output when a file is given
    let log_file = log_file.or_else(|| std::env::var_os("MINECHAT_LOG_FILE").map(PathBuf::from));
    if let Some(path) = log_file {
        let file = std::fs::File::options()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(host) = &cli.host {
        config.host.clone_from(host);
    }
    if let Some(port) = cli.read_port {
        config.read_port = port;
    }
    if let Some(port) = cli.write_port {
        config.write_port = port;
    }
    if let Some(path) = &cli.credentials {
        config.credentials_path.clone_from(path);
    }
    if let Some(path) = &cli.transcript {
        config.transcript_path.clone_from(path);
    }
    Ok(config)
}

/// Cancel `cancel` on Ctrl-C.
fn shutdown_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Could not listen for Ctrl-C: {e}");
            return;
        }
        log::info!("Shutdown requested");
        cancel.cancel();
    });
}

/// Load the token; any failure is an invalid-token condition.
fn require_token(config: &Config) -> Result<String> {
    credentials::load_token(&config.credentials_path).map_err(|e| {
        log::error!("No usable token: {e:#}");
        SessionError::InvalidToken.into()
    })
}

async fn run_client(config: Config) -> Result<()> {
    let token = require_token(&config)?;
    let (mut session, presenter) = channels();

    if let Err(e) = transcript::restore(&config.transcript_path, &session.publisher).await {
        log::warn!("Could not restore history: {e}");
    }

    let cancel = CancellationToken::new();
    shutdown_on_ctrl_c(cancel.clone());

    let console = tokio::spawn(console::run(
        presenter,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        cancel.clone(),
    ));

    let supervisor = Supervisor::new(config, token);
    let result = supervisor.run(&mut session, &cancel).await;

    cancel.cancel();
    if let Err(e) = console.await {
        log::warn!("Console task failed: {e}");
    }
    result.map_err(Into::into)
}

async fn listen(config: Config) -> Result<()> {
    let (session, mut presenter) = channels();
    let cancel = CancellationToken::new();
    shutdown_on_ctrl_c(cancel.clone());

    let printer = async {
        loop {
            tokio::select! {
                Some(line) = presenter.receive_rx.recv() => println!("{line}"),
                Some(update) = presenter.status_rx.recv() => log::info!("{update}"),
                else => break,
            }
        }
    };

    tokio::select! {
        result = inbound::run(&config, session.publisher.clone(), cancel.clone()) => result?,
        () = printer => {}
    }
    Ok(())
}

async fn send(config: Config, message: &str, register_as: Option<String>) -> Result<()> {
    let token = match credentials::load_token(&config.credentials_path) {
        Ok(token) => token,
        Err(e) => {
            log::info!("No usable token ({e:#}), registering a new account");
            let name = match register_as {
                Some(name) => name,
                None => {
                    let input = BufReader::new(tokio::io::stdin());
                    registration::prompt_nickname(input, tokio::io::stdout()).await?
                }
            };
            registration::register(&config, &name).await?.account_hash
        }
    };

    match oneshot::send_message(&config, &token, message).await? {
        Delivery::Accepted => Ok(()),
        Delivery::Rejected(ack) => anyhow::bail!("Server did not accept the message: {ack}"),
        Delivery::Unacknowledged => anyhow::bail!("Server did not confirm the message"),
    }
}

async fn register(config: Config, name: &str) -> Result<()> {
    let creds = registration::register(&config, name).await?;
    println!(
        "Registered as {}. Credentials saved to {}",
        creds.nickname.as_deref().unwrap_or(name),
        config.credentials_path.display()
    );
    Ok(())
}

async fn dispatch(cli: Cli, config: Config) -> Result<()> {
    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_client(config).await,
        Commands::Listen => listen(config).await,
        Commands::Send { message, register_as } => send(config, &message.join(" "), register_as).await,
        Commands::Register { name } => register(config, &name.join(" ")).await,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.log_file.clone()) {
        eprintln!("Error: {e:#}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    let credentials_path = config.credentials_path.clone();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(dispatch(cli, config));
    // Stdin reads run on a blocking thread that never finishes on its own
    runtime.shutdown_timeout(SHUTDOWN_GRACE);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.downcast_ref::<SessionError>().is_some_and(SessionError::is_fatal) => {
            eprintln!(
                "Authorization failed: the token in {} is missing or was rejected by the server.",
                credentials_path.display()
            );
            eprintln!("Register a new account with `minechat register <name>`.");
            ExitCode::from(EXIT_INVALID_TOKEN)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
