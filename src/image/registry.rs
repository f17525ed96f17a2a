use crate::errors::ImageError;
use regex::Regex;
use std::{net::Ipv4Addr, ops::Range};

/// Name of a Docker-style image registry server
///
/// This is a domain name, with an optional port. Registries are contacted
/// over https unless the domain has no dots in it (`localhost:5000`,
/// `devbox:5000`), the same heuristic Docker uses for development setups.
#[derive(Clone)]
pub struct Registry {
    serialized: String,
    domain_pos: Range<usize>,
    port: Option<u16>,
}

serialized_name_impls!(Registry);

impl Registry {
    /// Returns a reference to the existing string representation of a
    /// [Registry]
    pub fn as_str(&self) -> &str {
        &self.serialized
    }

    /// Parse a [prim@str] as a [Registry]
    pub fn parse(s: &str) -> Result<Self, ImageError> {
        lazy_static! {
            static ref RE: Regex = Regex::new(&format!("^{}$", Registry::regex_str())).unwrap();
        }
        let captures = RE
            .captures(s)
            .ok_or_else(|| ImageError::InvalidReferenceFormat(s.to_owned()))?;
        let port = match captures.name("reg_p") {
            None => None,
            Some(m) => Some(
                m.as_str()
                    .parse()
                    .map_err(|_| ImageError::InvalidReferenceFormat(s.to_owned()))?,
            ),
        };
        Ok(Registry {
            serialized: s.to_owned(),
            domain_pos: captures.name("reg_d").unwrap().range(),
            port,
        })
    }

    /// Returns a reference to the domain portion of the string
    pub fn domain_str(&self) -> &str {
        &self.serialized[self.domain_pos.clone()]
    }

    /// Returns the port, if present
    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Are we using https to connect to the registry?
    ///
    /// Loopback addresses are plain http, like dotless names.
    pub fn is_https(&self) -> bool {
        let domain = self.domain_str();
        let loopback = domain
            .parse::<Ipv4Addr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false);
        domain.contains('.') && !loopback
    }

    /// The protocol to use, either "http" or "https"
    pub fn protocol_str(&self) -> &'static str {
        if self.is_https() {
            "https"
        } else {
            "http"
        }
    }

    pub(crate) fn regex_str() -> &'static str {
        concat!(
            "(?P<reg>",
            /*  */ "(?P<reg_d>",
            /* -- */ "(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])",
            /* -- */ "(?:\\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*",
            /*  */ ")",
            /*  */ "(?::(?P<reg_p>[0-9]+))?",
            ")",
        )
    }
}
