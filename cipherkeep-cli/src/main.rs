mod commands;
mod state;

use anyhow::{Context, Result};
use cipherkeep_core::{ItemKind, SecretPayload};
use clap::{Args, Parser, Subcommand};
use commands::Session;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// CipherKeep CLI - end-to-end encrypted secrets, synced across devices
#[derive(Parser)]
#[command(name = "cipherkeep")]
#[command(about = "End-to-end encrypted secrets client", long_about = None)]
struct Cli {
    /// Server URL
    #[arg(
        short,
        long,
        global = true,
        env = "CIPHERKEEP_SERVER",
        default_value = "http://127.0.0.1:8750"
    )]
    server: String,

    /// Session and cache file (defaults to the platform config dir)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version information
    Version,

    /// Register a new account
    Register {
        #[arg(short, long)]
        username: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Log in to the server
    Login {
        #[arg(short, long)]
        username: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Add a new item
    #[command(subcommand)]
    Add(ItemInput),

    /// Replace the content of an existing item
    #[command(subcommand)]
    Update(ItemInput),

    /// Show and decrypt an item
    Get {
        #[arg(short, long)]
        name: String,

        /// Write binary content to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List items
    List {
        /// Only items of this kind (credential, text, binary, card)
        #[arg(short, long, value_parser = parse_kind)]
        kind: Option<ItemKind>,
    },

    /// Delete an item
    Delete {
        #[arg(short, long)]
        name: String,
    },

    /// Pull changes from the server into the local cache
    Sync,
}

#[derive(Subcommand)]
enum ItemInput {
    /// Login and password
    Credential {
        #[command(flatten)]
        common: CommonItemArgs,

        #[arg(short, long)]
        login: String,

        #[arg(short, long)]
        password: String,
    },

    /// Free-form text
    Text {
        #[command(flatten)]
        common: CommonItemArgs,

        #[arg(short, long)]
        data: String,
    },

    /// Contents of a file
    Binary {
        #[command(flatten)]
        common: CommonItemArgs,

        #[arg(short, long)]
        file: PathBuf,
    },

    /// Payment card
    Card {
        #[command(flatten)]
        common: CommonItemArgs,

        #[arg(long)]
        number: String,

        #[arg(long)]
        holder: String,

        #[arg(long)]
        cvv: String,

        /// Expiry month (MM)
        #[arg(long)]
        expiry_month: String,

        /// Expiry year (YY)
        #[arg(long)]
        expiry_year: String,
    },
}

#[derive(Args)]
struct CommonItemArgs {
    /// Item name
    #[arg(short, long)]
    name: String,

    /// Metadata (key=value,key2=value2)
    #[arg(short, long)]
    metadata: Option<String>,
}

impl ItemInput {
    /// Build the payload, reading files where needed.
    fn into_parts(self) -> Result<(CommonItemArgs, SecretPayload)> {
        Ok(match self {
            Self::Credential {
                common,
                login,
                password,
            } => (common, SecretPayload::Credential { login, password }),
            Self::Text { common, data } => (common, SecretPayload::Text { content: data }),
            Self::Binary { common, file } => {
                let data = std::fs::read(&file)
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let filename = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (common, SecretPayload::Binary { filename, data })
            }
            Self::Card {
                common,
                number,
                holder,
                cvv,
                expiry_month,
                expiry_year,
            } => (
                common,
                SecretPayload::Card {
                    number,
                    holder,
                    cvv,
                    expiry_month,
                    expiry_year,
                },
            ),
        })
    }
}

fn parse_kind(raw: &str) -> std::result::Result<ItemKind, String> {
    ItemKind::parse(raw).ok_or_else(|| format!("unknown item kind '{}'", raw))
}

fn read_secret(provided: Option<String>, prompt: &str) -> Result<String> {
    match provided {
        Some(secret) => Ok(secret),
        None => rpassword::prompt_password(prompt).context("Failed to read password"),
    }
}

fn prompt_master() -> Result<Vec<u8>> {
    Ok(read_secret(None, "Master password: ")?.into_bytes())
}

fn parse_tags(raw: Option<&str>) -> Result<HashMap<String, String>> {
    commands::parse_metadata(raw.unwrap_or_default())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli.verbose { Level::INFO } else { Level::WARN })
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Version = cli.command {
        println!("CipherKeep CLI");
        println!("Version:  {}", env!("CARGO_PKG_VERSION"));
        println!("Platform: {}", cipherkeep_core::platform::get_platform());
        return Ok(());
    }

    let state_path = match cli.state {
        Some(path) => path,
        None => {
            cipherkeep_core::platform::ensure_config_dir()?;
            cipherkeep_core::platform::get_client_state_path()
        }
    };
    let mut session = Session::open(cli.server.trim_end_matches('/').to_string(), state_path)?;

    match cli.command {
        Commands::Version => {}
        Commands::Register { username, password } => {
            let password = read_secret(password, "Password: ")?;
            commands::register(&mut session, &username, &password).await?;
        }
        Commands::Login { username, password } => {
            let password = read_secret(password, "Password: ")?;
            commands::login(&mut session, &username, &password).await?;
        }
        Commands::Add(input) => {
            let (common, payload) = input.into_parts()?;
            let tags = parse_tags(common.metadata.as_deref())?;
            let master = prompt_master()?;
            commands::add(&session, &common.name, &payload, tags, &master).await?;
        }
        Commands::Update(input) => {
            let (common, payload) = input.into_parts()?;
            let tags = common
                .metadata
                .as_deref()
                .map(commands::parse_metadata)
                .transpose()?;
            let master = prompt_master()?;
            commands::update(&session, &common.name, &payload, tags, &master).await?;
        }
        Commands::Get { name, output } => {
            let master = prompt_master()?;
            commands::get(&session, &name, &master, output.as_deref()).await?;
        }
        Commands::List { kind } => commands::list(&session, kind).await?,
        Commands::Delete { name } => commands::delete(&session, &name).await?,
        Commands::Sync => commands::sync(&mut session).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_add_card() {
        let cli = Cli::try_parse_from([
            "cipherkeep",
            "add",
            "card",
            "--name",
            "Visa",
            "--number",
            "4111111111111111",
            "--holder",
            "A. Holder",
            "--cvv",
            "123",
            "--expiry-month",
            "09",
            "--expiry-year",
            "29",
            "-m",
            "bank=acme",
        ])
        .unwrap();

        let Commands::Add(input) = cli.command else {
            panic!("expected add");
        };
        let (common, payload) = input.into_parts().unwrap();
        assert_eq!(common.name, "Visa");
        assert_eq!(common.metadata.as_deref(), Some("bank=acme"));
        assert_eq!(payload.kind(), ItemKind::Card);
    }

    #[test]
    fn list_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["cipherkeep", "list", "--kind", "ssh_key"]).is_err());
        assert!(Cli::try_parse_from(["cipherkeep", "list", "--kind", "text"]).is_ok());
    }
}
