//! Subcommand implementations.

use crate::state::ClientState;
use anyhow::{bail, Context, Result};
use cipherkeep_core::client::{ClientError, KeeperClient};
use cipherkeep_core::sync::models::ItemRecord;
use cipherkeep_core::{ItemKind, SecretPayload};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Session context shared by every command.
pub struct Session {
    pub server_url: String,
    pub state_path: PathBuf,
    pub state: ClientState,
}

impl Session {
    pub fn open(server_url: String, state_path: PathBuf) -> Result<Self> {
        let state = ClientState::load(&state_path)
            .with_context(|| format!("Failed to read {}", state_path.display()))?;
        Ok(Self {
            server_url,
            state_path,
            state,
        })
    }

    pub fn save(&self) -> Result<()> {
        self.state
            .save(&self.state_path)
            .with_context(|| format!("Failed to write {}", self.state_path.display()))
    }

    fn client(&self) -> Result<KeeperClient> {
        let token = match (&self.state.token, &self.state.server_url) {
            (Some(token), Some(url)) if *url == self.server_url => token.clone(),
            (Some(_), Some(url)) => bail!(
                "Logged in to {}, not {}. Run `cipherkeep login` first",
                url,
                self.server_url
            ),
            _ => bail!("Not logged in. Run `cipherkeep login` first"),
        };
        Ok(KeeperClient::new(&self.server_url)?.with_token(token))
    }
}

pub async fn register(session: &mut Session, username: &str, password: &str) -> Result<()> {
    let mut client = KeeperClient::new(&session.server_url)?;
    let auth = client.register(username, password).await.map_err(|e| match e {
        ClientError::Conflict(_) => anyhow::anyhow!("User '{}' already exists", username),
        other => other.into(),
    })?;

    session
        .state
        .start_session(&session.server_url, username, auth.token);
    session.save()?;
    println!("Registration successful!");
    Ok(())
}

pub async fn login(session: &mut Session, username: &str, password: &str) -> Result<()> {
    let mut client = KeeperClient::new(&session.server_url)?;
    let auth = client
        .login(username, password)
        .await
        .context("Login failed")?;

    session
        .state
        .start_session(&session.server_url, username, auth.token);
    session.save()?;
    println!("Login successful!");
    Ok(())
}

pub async fn add(
    session: &Session,
    name: &str,
    payload: &SecretPayload,
    tags: HashMap<String, String>,
    master: &[u8],
) -> Result<()> {
    let client = session.client()?;
    let ciphertext = payload.seal(master)?;

    let item = client
        .create_item(payload.kind(), name, ciphertext, tags)
        .await
        .map_err(|e| match e {
            ClientError::Conflict(_) => anyhow::anyhow!("An item named '{}' already exists", name),
            other => other.into(),
        })?;

    tracing::info!("Created item {}", item.id);
    println!("{} '{}' added", capitalize(item.kind.as_str()), item.name);
    Ok(())
}

pub async fn get(
    session: &Session,
    name: &str,
    master: &[u8],
    output: Option<&Path>,
) -> Result<()> {
    let client = session.client()?;
    let item = match client.get_item_by_name(name).await {
        Ok(item) => item,
        Err(e) if e.is_unreachable() => {
            tracing::warn!("Server unreachable: {}", e);
            let cached = session.state.find_by_name(name).with_context(|| {
                format!("Server unreachable and '{}' is not in the local cache", name)
            })?;
            eprintln!("Server unreachable, showing the copy from the last sync");
            cached.clone()
        }
        Err(ClientError::NotFound) => bail!("No item named '{}'", name),
        Err(other) => return Err(other.into()),
    };
    let payload = SecretPayload::open(item.kind, &item.ciphertext, master)
        .context("Could not decrypt item (wrong master password?)")?;

    println!("Name:    {}", item.name);
    println!("Kind:    {}", item.kind);
    println!("Version: {}", item.version);
    for (key, value) in describe(&payload) {
        println!("{:<8} {}", format!("{}:", key), value);
    }
    print_tags(&item.tags);

    if let (Some(path), SecretPayload::Binary { data, .. }) = (output, &payload) {
        std::fs::write(path, data)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Data written to {}", path.display());
    }
    Ok(())
}

pub async fn list(session: &Session, kind: Option<ItemKind>) -> Result<()> {
    let client = session.client()?;
    let items = match client.list_items(kind).await {
        Ok(items) => items,
        Err(e) if e.is_unreachable() => {
            tracing::warn!("Server unreachable: {}", e);
            eprintln!("Server unreachable, listing items from the last sync");
            session.state.cached_items(kind).into_iter().cloned().collect()
        }
        Err(other) => return Err(other.into()),
    };

    if items.is_empty() {
        println!("No items");
        return Ok(());
    }
    for item in items {
        println!(
            "{}  {:<10} v{:<3} {}  {}",
            item.id,
            item.kind.as_str(),
            item.version,
            item.updated_at.format("%Y-%m-%d %H:%M"),
            item.name
        );
    }
    Ok(())
}

pub async fn update(
    session: &Session,
    name: &str,
    payload: &SecretPayload,
    tags: Option<HashMap<String, String>>,
    master: &[u8],
) -> Result<()> {
    let client = session.client()?;
    let current = fetch_by_name(&client, name).await?;
    if current.kind != payload.kind() {
        bail!(
            "'{}' is a {} item, not {}",
            name,
            current.kind,
            payload.kind()
        );
    }

    let ciphertext = payload.seal(master)?;
    let tags = tags.unwrap_or(current.tags);
    let version = client
        .update_item(current.id, current.version, ciphertext, tags)
        .await
        .map_err(|e| match e {
            ClientError::Conflict(_) => anyhow::anyhow!(
                "'{}' was changed by another device. Run `cipherkeep sync` and try again",
                name
            ),
            other => other.into(),
        })?;

    println!("'{}' updated to version {}", name, version);
    Ok(())
}

pub async fn delete(session: &Session, name: &str) -> Result<()> {
    let client = session.client()?;
    let item = fetch_by_name(&client, name).await?;
    client.delete_item(item.id).await?;
    println!("'{}' deleted", name);
    Ok(())
}

/// Pull every pending batch into the local cache. The watermark is only
/// persisted together with the batch it covers.
pub async fn sync(session: &mut Session) -> Result<()> {
    let client = session.client()?;
    let mut rounds = 0;
    let mut total = 0;

    loop {
        let batch = client.sync(session.state.watermark).await?;
        total += batch.items.len();
        let summary = session.state.apply_batch(batch.items);
        session.state.watermark = batch.watermark;
        session.save()?;
        rounds += 1;

        tracing::info!(
            "Applied batch {}: {} upserted, {} removed, {} skipped",
            rounds,
            summary.upserted,
            summary.removed,
            summary.skipped
        );
        if !batch.has_more {
            break;
        }
    }

    println!(
        "Synced {} change(s); {} item(s) cached locally",
        total,
        session.state.items.len()
    );
    Ok(())
}

async fn fetch_by_name(client: &KeeperClient, name: &str) -> Result<ItemRecord> {
    client.get_item_by_name(name).await.map_err(|e| match e {
        ClientError::NotFound => anyhow::anyhow!("No item named '{}'", name),
        other => other.into(),
    })
}

/// Parse `key=value,key2=value2` into tags. Blank input yields no tags.
pub fn parse_metadata(raw: &str) -> Result<HashMap<String, String>> {
    let mut tags = HashMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Invalid metadata '{}', expected key=value", pair))?;
        let key = key.trim();
        if key.is_empty() {
            bail!("Invalid metadata '{}', empty key", pair);
        }
        tags.insert(key.to_string(), value.trim().to_string());
    }
    Ok(tags)
}

/// Human-readable fields of a decrypted payload.
pub fn describe(payload: &SecretPayload) -> Vec<(&'static str, String)> {
    match payload {
        SecretPayload::Credential { login, password } => {
            vec![("Login", login.clone()), ("Password", password.clone())]
        }
        SecretPayload::Text { content } => vec![("Text", content.clone())],
        SecretPayload::Binary { filename, data } => vec![
            ("File", filename.clone()),
            ("Size", format!("{} bytes", data.len())),
        ],
        SecretPayload::Card {
            number,
            holder,
            cvv,
            expiry_month,
            expiry_year,
        } => vec![
            ("Number", mask_card(number)),
            ("Holder", holder.clone()),
            ("CVV", cvv.clone()),
            ("Expires", format!("{}/{}", expiry_month, expiry_year)),
        ],
    }
}

/// Show only the last four digits.
fn mask_card(number: &str) -> String {
    let digits: Vec<char> = number.chars().collect();
    if digits.len() <= 4 {
        return number.to_string();
    }
    let last4: String = digits[digits.len() - 4..].iter().collect();
    format!("****{}", last4)
}

fn print_tags(tags: &HashMap<String, String>) {
    if tags.is_empty() {
        return;
    }
    let mut keys: Vec<&String> = tags.keys().collect();
    keys.sort();
    println!("Metadata:");
    for key in keys {
        println!("  {} = {}", key, tags[key]);
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
