/*
[INPUT]:  CLI arguments, TOML/env configuration, OS shutdown signals
[OUTPUT]: Session commands against the backend with persisted credentials
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Password;
use dialoguer::theme::ColorfulTheme;
use marquee_session::{ApiClient, FileStore, LoginRequest, SignUpRequest};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use marquee_cli::logging::init_tracing;
use marquee_cli::{Settings, TerminalNavigator, commands};

#[derive(Parser, Debug)]
#[command(name = "marquee", version, about = "Session-aware client for the marquee API")]
struct Cli {
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info", global = true)]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with email and password
    Login {
        #[arg(long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and sign in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and clear stored credentials
    Logout,
    /// Show the current session and credential expiry
    Status,
    /// Refresh credentials now
    Refresh,
    /// Authenticated GET of an API endpoint, e.g. `users/me`
    Get { endpoint: String },
    /// Keep the session fresh and print auth state changes until interrupted
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = Settings::load(args.config_path.as_deref()).context("load settings")?;
    let _log_guard = init_tracing(&args.log_level, settings.log.directory.as_deref())?;

    let store_path = settings.store_path()?;
    info!(
        base_url = %settings.api.base_url,
        store = %store_path.display(),
        "starting marquee"
    );

    let navigator = Arc::new(TerminalNavigator::new());
    let client = ApiClient::connect(
        settings.client_config(),
        settings.session_config(),
        Arc::new(FileStore::new(&store_path)),
        navigator.clone(),
    )
    .context("build api client")?;

    let outcome = match args.command {
        Command::Login { email, password } => {
            let password = resolve_password(password)?;
            commands::login(&client, &navigator, LoginRequest { email, password }).await
        }
        Command::Signup {
            name,
            email,
            phone,
            password,
        } => {
            let password = resolve_password(password)?;
            let request = SignUpRequest {
                name,
                email,
                password,
                phone,
            };
            commands::signup(&client, &navigator, request).await
        }
        Command::Logout => commands::logout(&client).await,
        Command::Status => commands::status(&client),
        Command::Refresh => commands::refresh(&client).await,
        Command::Get { endpoint } => commands::get(&client, &navigator, &endpoint).await,
        Command::Watch => {
            let shutdown = CancellationToken::new();
            setup_signal_handlers(shutdown.clone());
            commands::watch(&client, shutdown).await
        }
    };

    commands::finish(&client).await;
    outcome
}

fn resolve_password(password: Option<String>) -> Result<String> {
    match password {
        Some(password) => Ok(password),
        None => Password::with_theme(&ColorfulTheme::default())
            .with_prompt("Password")
            .interact()
            .context("read password"),
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
