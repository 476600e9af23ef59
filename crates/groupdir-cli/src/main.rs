//! groupdir - command line client for a hosted group directory.
//!
//! Lists groups, looks up memberships and adds or removes members. The
//! account password lives in the OS keychain; run `groupdir login` once to
//! store it.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::future::join_all;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use groupdir_core::{
    ApiError, Config, CredentialStore, DirectoryClient, Group, HttpTransport, SessionError,
    SessionManager, StoredCredentials,
};

#[derive(Parser)]
#[command(name = "groupdir")]
#[command(about = "Manage groups in a hosted directory", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List every group in the domain
    Groups {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List the groups one or more addresses belong to
    MemberOf {
        #[arg(required = true)]
        addresses: Vec<String>,
        #[arg(long)]
        json: bool,
    },

    /// Add an address to a group
    Add { address: String, group: String },

    /// Remove an address from a group
    Remove { address: String, group: String },

    /// Connect and show the session state
    Status,

    /// Store the account password in the keychain and connect
    Login {
        #[arg(short, long)]
        username: Option<String>,
        /// Directory domain (defaults to the username's domain)
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Delete the stored password
    Logout,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=groupdir_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {:#}", e);
        if session_error(&e).is_some_and(SessionError::is_retriable) {
            eprintln!("The directory session could not be established; try again shortly.");
        }
        std::process::exit(1);
    }
}

/// The session failure behind a command error, if there is one.
fn session_error(err: &anyhow::Error) -> Option<&SessionError> {
    err.chain().find_map(|cause| {
        cause.downcast_ref::<SessionError>().or(match cause.downcast_ref::<ApiError>() {
            Some(ApiError::Session(session)) => Some(session),
            _ => None,
        })
    })
}

async fn run(command: Command) -> Result<()> {
    let config = Config::load()?;
    debug!(?command, "Running command");

    match command {
        Command::Groups { json } => {
            let groups = connect(&config)?.list_groups().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                print_groups(&groups);
            }
        }
        Command::MemberOf { addresses, json } => {
            let client = connect(&config)?;
            let results = join_all(addresses.iter().map(|address| client.groups_for_member(address))).await;

            let mut found = Vec::with_capacity(addresses.len());
            for (address, groups) in addresses.iter().zip(results) {
                let groups = groups.with_context(|| format!("Failed to look up {}", address))?;
                found.push((address, groups));
            }

            if json {
                let mut map = serde_json::Map::new();
                for (address, groups) in found {
                    map.insert(address.clone(), serde_json::to_value(groups)?);
                }
                println!("{}", serde_json::to_string_pretty(&map)?);
            } else {
                for (address, groups) in found {
                    println!("{}:", address);
                    if groups.is_empty() {
                        println!("  (no groups)");
                    }
                    for group in groups {
                        println!("  {}", group.address);
                    }
                }
            }
        }
        Command::Add { address, group } => {
            let member = connect(&config)?.add_member(&address, &group).await?;
            println!("Added {} to {}", member.member_id, group);
        }
        Command::Remove { address, group } => {
            connect(&config)?.remove_member(&address, &group).await?;
            println!("Removed {} from {}", address, group);
        }
        Command::Status => status(&config).await?,
        Command::Login { username, domain } => login(config, username, domain).await?,
        Command::Logout => logout(&config)?,
    }
    Ok(())
}

fn session(config: &Config) -> Result<(SessionManager, Arc<HttpTransport>)> {
    let transport = Arc::new(HttpTransport::new(config.request_timeout())?);
    let session = SessionManager::new(
        transport.clone(),
        Arc::new(StoredCredentials::from_config(config)),
        config.session_settings(),
    );
    Ok((session, transport))
}

fn connect(config: &Config) -> Result<DirectoryClient> {
    let (session, transport) = session(config)?;
    Ok(DirectoryClient::new(session, transport, &config.api_base_url)?)
}

fn print_groups(groups: &[Group]) {
    if groups.is_empty() {
        println!("No groups");
        return;
    }
    let width = groups.iter().map(|g| g.address.len()).max().unwrap_or(0);
    for group in groups {
        println!("{:<width$}  {}", group.address, group.display_name(), width = width);
    }
}

async fn status(config: &Config) -> Result<()> {
    let (session, _) = session(config)?;
    let result = session.connect().await;

    println!("State:    {}", session.state());
    if let Some(active) = session.active_session() {
        let renewal = chrono::Duration::from_std(session.settings().renewal_interval)
            .unwrap_or_else(|_| chrono::Duration::zero());
        println!("Domain:   {}", active.domain());
        println!("Issued:   {}", active.issued_at().format("%Y-%m-%d %H:%M:%S UTC"));
        println!(
            "Renewal:  {}",
            (active.issued_at() + renewal).format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    result.context("Could not connect to the directory")?;
    Ok(())
}

async fn login(mut config: Config, username: Option<String>, domain: Option<String>) -> Result<()> {
    let username = match username.or_else(|| config.username.clone()) {
        Some(username) => username,
        None => prompt_username()?,
    };
    if username.is_empty() {
        anyhow::bail!("Username required");
    }
    let domain = domain
        .or_else(|| config.domain.clone())
        .or_else(|| username.split_once('@').map(|(_, domain)| domain.to_string()))
        .filter(|d| !d.is_empty())
        .context("Domain required; pass --domain")?;

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("Password required");
    }

    CredentialStore::store(&username, &password)?;
    config.username = Some(username.clone());
    config.domain = Some(domain.clone());
    config.save().context("Failed to save config")?;
    info!(%username, %domain, "Saved directory account");

    let (session, _) = session(&config)?;
    session.connect().await.context("Login failed")?;
    println!("Login successful for {} ({})", username, domain);
    Ok(())
}

fn logout(config: &Config) -> Result<()> {
    let Some(username) = config.username.as_deref() else {
        println!("No account configured");
        return Ok(());
    };
    if CredentialStore::has_credentials(username) {
        CredentialStore::delete(username)?;
        println!("Removed stored password for {}", username);
    } else {
        println!("No stored password for {}", username);
    }
    Ok(())
}

fn prompt_username() -> Result<String> {
    print!("Username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    Ok(username.trim().to_string())
}
