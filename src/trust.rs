//! Resolving tags to verified content digests

use crate::{
    errors::{ImageError, TrustError},
    image::{ContentDigest, ImageName, Tag},
    registry::{auth::BearerChallenge, CredentialStore, DefaultRegistry},
    Settings,
};
use async_trait::async_trait;
use reqwest::{header, RequestBuilder, Response, StatusCode};

/// A tag resolved to the digest it currently names, after verification
///
/// Lives for one creation attempt and is never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrustedReference {
    name: ImageName,
    digest: ContentDigest,
}

impl TrustedReference {
    /// `name` is reduced to its registry and repository
    pub fn new(name: &ImageName, digest: ContentDigest) -> Self {
        TrustedReference {
            name: name.without_version(),
            digest,
        }
    }

    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// The pinned name to use in place of the tag: `name@digest`
    pub fn image_name(&self) -> ImageName {
        self.name.with_digest(&self.digest)
    }
}

/// Source of verified tag-to-digest mappings
///
/// Only consulted in trust mode, and never for references that already
/// carry a digest. Any error is final: the caller does not fall back to the
/// unverified tag.
#[async_trait]
pub trait TrustResolver: Send + Sync {
    async fn resolve(&self, name: &ImageName, tag: &Tag) -> Result<TrustedReference, TrustError>;
}

/// Manifest types we ask the registry for, newest first
const MANIFEST_ACCEPT: &str = concat!(
    "application/vnd.docker.distribution.manifest.v2+json, ",
    "application/vnd.docker.distribution.manifest.list.v2+json, ",
    "application/vnd.oci.image.manifest.v1+json, ",
    "application/vnd.oci.image.index.v1+json"
);

/// Registry response header with the registry's own idea of the digest
const CONTENT_DIGEST_HEADER: &str = "Docker-Content-Digest";

/// A [TrustResolver] that asks the image's registry directly
///
/// The manifest for the tag is downloaded and hashed. The result must agree
/// with the digest the registry reports, and it becomes the trusted
/// reference. This proves the pinned digest matches what the registry
/// served for the tag at that moment; it does not check publisher
/// signatures.
#[derive(Clone, Debug)]
pub struct RegistryTrustResolver {
    req: reqwest::Client,
    default_registry: DefaultRegistry,
    credentials: CredentialStore,
}

impl RegistryTrustResolver {
    pub fn new(
        req: reqwest::Client,
        default_registry: DefaultRegistry,
        credentials: CredentialStore,
    ) -> Self {
        RegistryTrustResolver {
            req,
            default_registry,
            credentials,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        RegistryTrustResolver::new(
            settings.network.clone(),
            settings.default_registry.clone(),
            settings.credentials.clone(),
        )
    }

    fn manifest_request(&self, url: &str) -> RequestBuilder {
        self.req.get(url).header(header::ACCEPT, MANIFEST_ACCEPT)
    }

    async fn fetch_manifest(&self, name: &ImageName, tag: &Tag) -> Result<Response, TrustError> {
        let (registry, repository) = self.default_registry.resolve_image_name(name);
        let url = format!(
            "{}://{}/v2/{}/manifests/{}",
            registry.protocol_str(),
            registry,
            repository,
            tag
        );
        log::info!("{}:{} <{}> fetching manifest for trust", name, tag, url);

        let response = self.manifest_request(&url).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let challenge = response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| TrustError::UnsupportedAuthentication(String::new()))?;
        let challenge = BearerChallenge::parse(challenge)?;
        log::debug!("login challenge for {}, {:?}", registry, challenge);

        let login = self.credentials.resolve(&self.default_registry.index_for(name));
        let default_scope = format!("repository:{}:pull", repository);
        let token = challenge.fetch_token(&self.req, &default_scope, &login).await?;
        Ok(self.manifest_request(&url).bearer_auth(token).send().await?)
    }
}

#[async_trait]
impl TrustResolver for RegistryTrustResolver {
    async fn resolve(&self, name: &ImageName, tag: &Tag) -> Result<TrustedReference, TrustError> {
        let response = self.fetch_manifest(name, tag).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrustError::NoTrustData {
                image: name.with_tag(tag).to_string(),
                status: status.as_u16(),
            });
        }

        let claimed = match response.headers().get(CONTENT_DIGEST_HEADER) {
            None => None,
            Some(value) => {
                let value = value
                    .to_str()
                    .map_err(|_| ImageError::InvalidReferenceFormat(format!("{:?}", value)))?;
                Some(ContentDigest::parse(value)?)
            }
        };
        let body = response.bytes().await?;
        let found = ContentDigest::from_content(&body);

        if let Some(expected) = claimed {
            if expected != found {
                log::warn!("{}:{} digest mismatch, {} != {}", name, tag, expected, found);
                return Err(TrustError::ContentDigestMismatch { expected, found });
            }
        }
        log::info!("{}:{} trusted as {}", name, tag, found);
        Ok(TrustedReference::new(name, found))
    }
}
