use crate::{errors::TrustError, registry::AuthConfig};
use regex::Regex;
use reqwest::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BearerChallenge {
    pub realm: Url,
    pub service: String,
    pub scope: Option<String>,
}

#[derive(Clone, Deserialize)]
struct Token {
    #[serde(alias = "access_token")]
    token: String,
}

impl BearerChallenge {
    /// Parse a `WWW-Authenticate` header from a registry
    ///
    /// Reference: <https://docs.docker.com/registry/spec/auth/token/>
    pub fn parse(auth_header: &str) -> Result<Self, TrustError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(concat!(
                "^\\s*",
                "(?i:bearer)",
                "(?:",           // multiple unordered parameters
                /* */ "\\s*",
                /* */ "(?:",
                /* -- */ "(?:service=\"(?P<service>", r"[\x20-\x21\x23-\x5B\x5D-\x7E]*", ")\")|",
                /* -- */ "(?:scope=\"(?P<scope>", r"[\x20-\x21\x23-\x5B\x5D-\x7E]*", ")\")|",
                /* -- */ "(?:realm=\"(?P<realm>", "https?://[-_.+a-zA-Z:0-9/]+", ")\")",
                /* */ ")",
                /* */ ",?",      // commas are all optional, which keeps the parser regular
                ")*$",
            )).unwrap();
        }
        let unsupported = || TrustError::UnsupportedAuthentication(auth_header.to_string());
        let captures = RE.captures(auth_header).ok_or_else(unsupported)?;
        let realm = captures
            .name("realm")
            .and_then(|m| m.as_str().parse::<Url>().ok())
            .ok_or_else(unsupported)?;
        let service = captures
            .name("service")
            .map(|m| m.as_str().to_owned())
            .ok_or_else(unsupported)?;
        Ok(BearerChallenge {
            realm,
            service,
            scope: captures.name("scope").map(|m| m.as_str().to_owned()),
        })
    }

    /// Ask the challenge's realm for a token, logging in if we have a
    /// username for this registry
    pub async fn fetch_token(
        &self,
        req: &reqwest::Client,
        default_scope: &str,
        login: &AuthConfig,
    ) -> Result<String, TrustError> {
        let scope = self.scope.as_deref().unwrap_or(default_scope);
        let request = req
            .get(self.realm.clone())
            .query(&[("service", self.service.as_str()), ("scope", scope)]);
        let request = if login.username.is_empty() {
            request
        } else {
            log::debug!("logging in to {} as {}", self.realm, login.username);
            request.basic_auth(&login.username, Some(&login.password))
        };
        let response: Token = request.send().await?.error_for_status()?.json().await?;
        log::debug!("received token from {}", self.realm);
        Ok(response.token)
    }
}
