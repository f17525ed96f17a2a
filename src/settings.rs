//! Settings shared by every step of a container creation

use crate::{
    errors::ConfigError,
    registry::{CredentialStore, DefaultRegistry},
};
use reqwest::header::HeaderValue;
use std::{env, fmt, str::FromStr, time::Duration};
use url::Url;

/// When to pull the image before or during a create
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PullPolicy {
    /// Never pull; a missing image is an error
    Never,
    /// Pull before every create
    Always,
    /// Pull only when the engine reports the image missing
    Missing,
}

impl Default for PullPolicy {
    fn default() -> Self {
        PullPolicy::Missing
    }
}

impl FromStr for PullPolicy {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "never" => Ok(PullPolicy::Never),
            "always" => Ok(PullPolicy::Always),
            "missing" | "" => Ok(PullPolicy::Missing),
            other => Err(ConfigError::InvalidPullPolicy(other.to_owned())),
        }
    }
}

impl fmt::Display for PullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PullPolicy::Never => "never",
            PullPolicy::Always => "always",
            PullPolicy::Missing => "missing",
        })
    }
}

/// Engine address used when nothing else is configured
pub const DEFAULT_ENGINE_URL: &str = "http://localhost:2375/";

/// Everything a creation needs to know that isn't about the container itself
///
/// This is passed explicitly to each component rather than read from the
/// environment along the way. Use [Settings::builder()] to customize, or
/// [SettingsBuilder::from_env()] for the usual environment variables.
#[derive(Clone, Debug)]
pub struct Settings {
    pub(crate) engine_url: Url,
    pub(crate) content_trust: bool,
    pub(crate) credentials: CredentialStore,
    pub(crate) default_registry: DefaultRegistry,
    pub(crate) network: reqwest::Client,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::new()
    }

    /// Base URL of the engine API, always ending in a slash
    pub fn engine_url(&self) -> &Url {
        &self.engine_url
    }

    /// Is trust mode on?
    pub fn content_trust(&self) -> bool {
        self.content_trust
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn default_registry(&self) -> &DefaultRegistry {
        &self.default_registry
    }

    /// Return the default `User-Agent` that we use if no other is set
    pub fn default_user_agent() -> HeaderValue {
        static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
        HeaderValue::from_static(USER_AGENT)
    }
}

/// Builder for [Settings]
#[derive(Debug)]
pub struct SettingsBuilder {
    req: reqwest::ClientBuilder,
    engine_url: Option<String>,
    content_trust: bool,
    credentials: CredentialStore,
    default_registry: Option<DefaultRegistry>,
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        SettingsBuilder::new()
    }
}

impl SettingsBuilder {
    /// Start with built-in defaults, ignoring the environment
    pub fn new() -> Self {
        SettingsBuilder {
            req: reqwest::Client::builder().user_agent(Settings::default_user_agent()),
            engine_url: None,
            content_trust: false,
            credentials: CredentialStore::new(),
            default_registry: None,
        }
    }

    /// Start from the environment
    ///
    /// `DOCKER_HOST` picks the engine, `DOCKER_CONTENT_TRUST` turns on trust
    /// mode, and stored logins are loaded from `$DOCKER_CONFIG/config.json`
    /// or `$HOME/.docker/config.json`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = SettingsBuilder::new();
        if let Ok(host) = env::var("DOCKER_HOST") {
            if !host.is_empty() {
                builder = builder.engine(&host);
            }
        }
        if let Ok(value) = env::var("DOCKER_CONTENT_TRUST") {
            builder = builder.content_trust(parse_bool_env(&value));
        }
        if let Some(dir) = CredentialStore::default_dir() {
            builder = builder.credentials(CredentialStore::load(&dir)?);
        }
        Ok(builder)
    }

    /// Engine address: `tcp://host:port`, `http://...`, or `https://...`
    pub fn engine(mut self, address: &str) -> Self {
        self.engine_url = Some(address.to_owned());
        self
    }

    /// Require verified digests for tags
    pub fn content_trust(mut self, enabled: bool) -> Self {
        self.content_trust = enabled;
        self
    }

    /// Use these stored logins for pulls and trust lookups
    pub fn credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    /// Change the registry used for names that don't include one
    pub fn registry(mut self, default_registry: &DefaultRegistry) -> Self {
        self.default_registry = Some(default_registry.clone());
        self
    }

    /// Set a timeout for each network request
    ///
    /// Pulls can legitimately take a long time; by default there is no
    /// timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.req = self.req.timeout(timeout);
        self
    }

    /// Set a timeout for only the initial connect phase of each request
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.req = self.req.connect_timeout(timeout);
        self
    }

    /// Sets the `User-Agent` header, replacing [Settings::default_user_agent()]
    pub fn user_agent(mut self, value: HeaderValue) -> Self {
        self.req = self.req.user_agent(value);
        self
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        let address = self.engine_url.as_deref().unwrap_or(DEFAULT_ENGINE_URL);
        let engine_url = parse_engine_address(address)?;
        log::debug!("using engine at {}", engine_url);
        Ok(Settings {
            engine_url,
            content_trust: self.content_trust,
            credentials: self.credentials,
            default_registry: self.default_registry.unwrap_or_default(),
            network: self.req.build()?,
        })
    }
}

fn parse_bool_env(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Turn an engine address into an HTTP base URL ending in a slash
pub(crate) fn parse_engine_address(address: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidEngineAddress(address.to_owned());
    let rewritten = match address.strip_prefix("tcp://") {
        Some(rest) => format!("http://{}", rest),
        None => address.to_owned(),
    };
    let mut url = Url::parse(&rewritten).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
