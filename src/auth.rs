use crate::errors::*;
use data_encoding::BASE64;
use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use tokio::fs;

pub const DOCKER_HUB: &str = "docker.io";
const DOCKER_HUB_ALIASES: &[&str] = &["index.docker.io", "registry-1.docker.io"];

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read `REGISTRY_USERNAME` and `REGISTRY_PASSWORD`, both must be set
    pub fn from_env() -> Option<Self> {
        let username = env::var("REGISTRY_USERNAME").ok()?;
        let password = env::var("REGISTRY_PASSWORD").ok()?;
        Some(Credentials { username, password })
    }

    fn decode(auth: &str) -> Result<Self> {
        let buf = BASE64
            .decode(auth.trim().as_bytes())
            .context("Failed to decode auth as base64")?;
        let buf = String::from_utf8(buf).context("Decoded auth is not utf-8")?;
        let (username, password) = buf
            .split_once(':')
            .context("Decoded auth is missing a `:` delimiter")?;
        Ok(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Layout shared by `~/.docker/config.json` and podman's `auth.json`
#[derive(Debug, Default, Deserialize)]
pub struct AuthFile {
    #[serde(default)]
    auths: HashMap<String, AuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    auth: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl AuthFile {
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let file = serde_json::from_slice(buf).context("Failed to parse auth file as json")?;
        Ok(file)
    }

    pub fn credentials(&self, registry: &str) -> Result<Option<Credentials>> {
        let registry = normalize_registry(registry);
        let Some((key, entry)) = self
            .auths
            .iter()
            .find(|(key, _)| normalize_registry(key) == registry)
        else {
            return Ok(None);
        };

        if let Some(auth) = &entry.auth {
            let credentials = Credentials::decode(auth)
                .with_context(|| anyhow!("Invalid credentials for registry {key:?}"))?;
            return Ok(Some(credentials));
        }
        match (&entry.username, &entry.password) {
            (Some(username), Some(password)) => Ok(Some(Credentials {
                username: username.clone(),
                password: password.clone(),
            })),
            _ => Ok(None),
        }
    }
}

/// Reduce an auth file key like `https://index.docker.io/v1/` to its host
fn normalize_registry(key: &str) -> &str {
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    let host = key.split('/').next().unwrap_or(key);
    if DOCKER_HUB_ALIASES.contains(&host) {
        DOCKER_HUB
    } else {
        host
    }
}

/// Auth files in the order they are consulted
pub fn auth_file_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(path) = env::var_os("REGISTRY_AUTH_FILE") {
        paths.push(PathBuf::from(path));
    }
    if let Some(dir) = env::var_os("XDG_RUNTIME_DIR") {
        paths.push(PathBuf::from(dir).join("containers/auth.json"));
    }
    if let Some(dir) = env::var_os("DOCKER_CONFIG") {
        paths.push(PathBuf::from(dir).join("config.json"));
    } else if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".docker/config.json"));
    }
    paths
}

/// Find credentials for a registry, falling back to the environment
pub async fn lookup(registry: &str) -> Result<Option<Credentials>> {
    for path in auth_file_paths() {
        let buf = match fs::read(&path).await {
            Ok(buf) => buf,
            Err(err) => {
                trace!("Skipping auth file {path:?}: {err:#}");
                continue;
            }
        };

        let file =
            AuthFile::parse(&buf).with_context(|| anyhow!("Failed to load auth file: {path:?}"))?;
        if let Some(credentials) = file.credentials(registry)? {
            debug!("Using credentials for {registry:?} from {path:?}");
            return Ok(Some(credentials));
        }
    }

    let credentials = Credentials::from_env();
    if credentials.is_some() {
        debug!("Using credentials for {registry:?} from environment");
    }
    Ok(credentials)
}
