//! Stored registry logins, read from the engine client's `config.json`

use crate::errors::ConfigError;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE},
    Engine as _,
};
use std::{
    collections::HashMap,
    fs, io,
    path::{Path, PathBuf},
};

/// Credentials for one registry index
///
/// This is the payload the engine expects, JSON encoded and then base64
/// encoded, in the `X-Registry-Auth` header of a pull. An empty value is a
/// valid, anonymous login.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub auth: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub serveraddress: String,
    #[serde(default)]
    pub identitytoken: String,
    #[serde(default)]
    pub registrytoken: String,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("username", &self.username)
            .field("serveraddress", &self.serveraddress)
            .finish()
    }
}

impl AuthConfig {
    /// Value for the `X-Registry-Auth` header: URL-safe base64 of the JSON
    pub fn to_header_value(&self) -> Result<String, serde_json::Error> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE.encode(&json))
    }
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    auths: HashMap<String, AuthConfig>,
}

/// Logins for registry indexes, keyed by server address
#[derive(Clone, Debug, Default)]
pub struct CredentialStore {
    auths: HashMap<String, AuthConfig>,
}

impl CredentialStore {
    /// An empty store; every lookup yields an anonymous login
    pub fn new() -> Self {
        CredentialStore::default()
    }

    /// Determine the default directory holding `config.json`
    ///
    /// This is `$DOCKER_CONFIG` if set, otherwise `$HOME/.docker`.
    pub fn default_dir() -> Option<PathBuf> {
        match std::env::var_os("DOCKER_CONFIG") {
            Some(dir) => Some(PathBuf::from(dir)),
            None => std::env::var_os("HOME").map(|home| Path::new(&home).join(".docker")),
        }
    }

    /// Load `config.json` from a directory
    ///
    /// A missing file is not an error, it just means nobody has logged in.
    /// Each stored `auth` field is decoded into a username and password.
    pub fn load(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join("config.json");
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("no credential store at {:?}", path);
                return Ok(CredentialStore::new());
            }
            Err(source) => return Err(ConfigError::CredentialStore { path, source }),
        };
        let file: ConfigFile = serde_json::from_slice(&bytes)?;
        let mut store = CredentialStore::new();
        for (server, mut auth) in file.auths {
            if !auth.auth.is_empty() {
                let (username, password) = decode_auth(&auth.auth)
                    .ok_or_else(|| ConfigError::InvalidCredential(server.clone()))?;
                auth.username = username;
                auth.password = password;
                auth.auth.clear();
            }
            auth.serveraddress = server.clone();
            store.auths.insert(server, auth);
        }
        log::debug!("loaded {} stored logins from {:?}", store.auths.len(), path);
        Ok(store)
    }

    pub fn insert(&mut self, server: &str, auth: AuthConfig) {
        self.auths.insert(server.to_owned(), auth);
    }

    /// Find the login for a registry index
    ///
    /// An exact key match wins. Failing that, keys are compared by hostname
    /// alone, so `https://quay.io/v1/` matches a lookup for `quay.io`.
    pub fn resolve(&self, index: &str) -> AuthConfig {
        if let Some(auth) = self.auths.get(index) {
            return auth.clone();
        }
        let wanted = hostname(index);
        self.auths
            .iter()
            .find(|(server, _)| hostname(server) == wanted)
            .map(|(_, auth)| auth.clone())
            .unwrap_or_default()
    }
}

fn hostname(server: &str) -> &str {
    let stripped = server
        .strip_prefix("https://")
        .or_else(|| server.strip_prefix("http://"))
        .unwrap_or(server);
    stripped.split('/').next().unwrap_or(stripped)
}

fn decode_auth(encoded: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(encoded).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let mut parts = decoded.splitn(2, ':');
    let username = parts.next()?.to_owned();
    let password = parts.next()?.trim_matches('\0').to_owned();
    Some((username, password))
}
