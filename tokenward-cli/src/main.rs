//! Tokenward CLI
//!
//! Command-line client for an authenticated GraphQL endpoint.
//!
//! # Usage
//!
//! ```bash
//! # Log in and store both credentials
//! TOKENWARD_PASSWORD=hunter2 tokenward login ada@example.com
//!
//! # Run a query, refreshing the access token if it expired
//! echo '{ me { email } }' | tokenward query -
//!
//! # Forget the stored credentials
//! tokenward logout
//! ```

mod config;

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokenward_core::{
    CredentialStore, GraphQLRequest, RefreshError, ReqwestTransport, Secret, Session, create_store,
};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::ClientConfig;

type CliSession = Session<ReqwestTransport, Box<dyn CredentialStore>>;

#[derive(Parser)]
#[command(name = "tokenward")]
#[command(about = "Authenticated GraphQL client with automatic token refresh")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the access and refresh tokens
    Login {
        /// Account email
        email: String,

        /// Account password
        #[arg(long, env = "TOKENWARD_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Show whether credentials are stored
    Status,

    /// Send an authenticated query and print its data
    Query {
        /// File holding the query document, or `-` for stdin
        file: String,

        /// Query variables as a JSON object
        #[arg(long)]
        variables: Option<String>,
    },

    /// Exchange the refresh token for a new access token
    Refresh,

    /// Clear stored credentials
    Logout,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(cli.config)?;

    init_logging(&config.log_level, cli.verbose);
    debug!("Loaded configuration from {:?}", config.config_path);

    let session = build_session(&config)?;

    match cli.command {
        Commands::Login { email, password } => login(&session, &email, password).await,
        Commands::Status => status(&session).await,
        Commands::Query { file, variables } => query(&session, &file, variables.as_deref()).await,
        Commands::Refresh => refresh(&session).await,
        Commands::Logout => logout(&session).await,
    }
}

fn init_logging(level: &str, verbose: bool) {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_session(config: &ClientConfig) -> Result<CliSession> {
    let transport = ReqwestTransport::new(Duration::from_secs(config.request_timeout_secs))
        .context("Failed to build HTTP client")?;
    let store = create_store(config.prefer_keyring, Some(config.jar_path.clone()))
        .with_context(|| format!("Failed to open credential store at {:?}", config.jar_path))?;

    let session = Session::with_options(transport, config.endpoint_url()?, store, config.session_options()?)
        .on_redirect(|| eprintln!("Signed out. Run `tokenward login <email>` to sign in again."));

    Ok(session)
}

async fn login(session: &CliSession, email: &str, password: Option<String>) -> Result<()> {
    let Some(password) = password else {
        bail!("No password given; pass --password or set TOKENWARD_PASSWORD");
    };

    session
        .login(email, &Secret::new(password))
        .await
        .with_context(|| format!("Login as {} failed", email))?;

    println!("Logged in as {}", email);
    Ok(())
}

async fn status(session: &CliSession) -> Result<()> {
    let authenticated = session
        .is_authenticated()
        .await
        .context("Failed to read credential store")?;

    if authenticated {
        println!("Authenticated against {}", session.destination());
    } else {
        println!("Not authenticated");
    }
    Ok(())
}

async fn query(session: &CliSession, file: &str, variables: Option<&str>) -> Result<()> {
    let document = if file == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read query from stdin")?;
        buf
    } else {
        std::fs::read_to_string(file).with_context(|| format!("Failed to read query from {}", file))?
    };

    let mut request = GraphQLRequest::new(document);
    if let Some(variables) = variables {
        let value: Value = serde_json::from_str(variables).context("Variables are not valid JSON")?;
        request = request.with_variables_value(value);
    }

    let data = session.request(&request).await.context("Query failed")?;

    println!("{}", serde_json::to_string_pretty(&data.unwrap_or(Value::Null))?);
    Ok(())
}

async fn refresh(session: &CliSession) -> Result<()> {
    match session.refresh().await {
        Ok(_) => {
            println!("Access token refreshed");
            Ok(())
        }
        Err(RefreshError::MissingRefreshToken) => bail!("Not logged in; run `tokenward login <email>`"),
        Err(e) => Err(anyhow::Error::new(e).context("Refresh failed")),
    }
}

async fn logout(session: &CliSession) -> Result<()> {
    session.logout().await.context("Failed to clear credentials")
}
