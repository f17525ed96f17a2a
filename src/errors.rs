//! Error types you might see while creating a container

use crate::image::ContentDigest;
use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors in image identity and related user-supplied settings
#[derive(Error, Debug)]
pub enum ImageError {
    /// invalid image reference format
    #[error("invalid image reference format: {0:?}")]
    InvalidReferenceFormat(String),
}

/// Errors while assembling [crate::Settings]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// invalid pull policy
    #[error("invalid pull behavior {0:?}, expected one of never, always, missing")]
    InvalidPullPolicy(String),

    /// invalid engine address
    #[error("invalid engine address {0:?}")]
    InvalidEngineAddress(String),

    /// can't read the credential store
    #[error("can't read credential store {path:?}: {source}")]
    CredentialStore {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// credential store is not valid json
    #[error("credential store is not valid json: {0}")]
    JSON(#[from] serde_json::Error),

    /// a stored credential could not be decoded
    #[error("invalid stored credential for {0:?}")]
    InvalidCredential(String),

    /// network client could not be constructed
    #[error("network client setup failed: {0}")]
    NetworkClient(#[from] reqwest::Error),
}

/// Errors while resolving a tag to a verified content digest
#[derive(Error, Debug)]
pub enum TrustError {
    /// network request error
    #[error("network request error: {0}")]
    NetworkRequest(#[from] reqwest::Error),

    /// registry server requested an unsupported type of authentication
    #[error("registry server requested an unsupported type of authentication: {0:?}")]
    UnsupportedAuthentication(String),

    /// no trust data is available for the requested tag
    #[error("no trust data for {image}: registry returned status {status}")]
    NoTrustData { image: String, status: u16 },

    /// calculated digest of the manifest is not what the registry claimed
    #[error("calculated digest of manifest is not what the registry claimed, expected {expected}, found {found}")]
    ContentDigestMismatch {
        expected: ContentDigest,
        found: ContentDigest,
    },

    /// digest reported by the registry could not be parsed
    #[error("registry reported an unusable digest: {0}")]
    InvalidDigest(#[from] ImageError),
}

/// Errors reported by, or while talking to, a container engine
#[derive(Error, Debug)]
pub enum EngineError {
    /// the engine answered with an error status
    #[error("error response from engine ({status}): {message}")]
    Status { status: u16, message: String },

    /// the engine reported that an image is not available locally
    #[error("No such image: {0}")]
    ImageNotFound(String),

    /// an error record arrived in the middle of a progress stream
    #[error("{0}")]
    Stream(String),

    /// a request path did not join onto the engine base url
    #[error("can't form engine url: {0}")]
    Url(#[from] url::ParseError),

    /// network request error
    #[error("network request error: {0}")]
    NetworkRequest(#[from] reqwest::Error),

    /// json error
    #[error("json error: {0}")]
    JSON(#[from] serde_json::Error),

    /// io error while forwarding engine output
    #[error("io error: {0}")]
    IOError(#[from] io::Error),
}

impl EngineError {
    /// Does this error mean that `image` is missing from the engine's local
    /// image store?
    ///
    /// A 404 from the HTTP API that starts with "No such image:" arrives as
    /// [EngineError::ImageNotFound]. Other 404s still count when their message
    /// mentions the image we asked for. A 404 about anything else (a missing
    /// network, say) does not count.
    pub fn is_image_missing(&self, image: &str) -> bool {
        match self {
            EngineError::ImageNotFound(name) => name.contains(image),
            EngineError::Status { status, message } => *status == 404 && message.contains(image),
            _ => false,
        }
    }
}

/// Errors from the container creation workflow
///
/// Nothing here is retried. The only retry in the workflow is the single
/// create that follows an on-demand pull, and its error is the one returned.
#[derive(Error, Debug)]
pub enum CreateError {
    /// the image reference could not be parsed
    #[error("{0}")]
    InvalidReference(#[from] ImageError),

    /// trust resolution failed, there is no fallback to an unverified image
    #[error("trust resolution failed: {0}")]
    Trust(#[from] TrustError),

    /// image pull failed
    #[error("image pull failed: {0}")]
    Pull(#[source] EngineError),

    /// container creation failed
    #[error("{0}")]
    Create(#[source] EngineError),

    /// tagging a trusted image locally failed
    #[error("failed to tag trusted image: {0}")]
    Tag(#[source] EngineError),

    /// container and host configuration could not be combined
    #[error("can't encode container configuration: {0}")]
    Encode(#[source] serde_json::Error),

    /// a container ID file already exists at the requested path
    #[error("container ID file found, make sure the other container isn't running or delete {0:?}")]
    CidFileExists(PathBuf),

    /// the container ID file could not be created
    #[error("failed to create the container ID file {path:?}: {source}")]
    CidFileCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// the container ID could not be written
    #[error("failed to write the container ID file: {0}")]
    CidFileWrite(#[source] io::Error),

    /// writing diagnostics or output failed
    #[error("output error: {0}")]
    Output(#[from] io::Error),
}
