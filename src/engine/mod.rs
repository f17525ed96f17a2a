//! The remote container engine, as seen by the creation workflow
//!
//! [Engine] is the seam between the workflow and the engine API. The
//! [HttpEngine] implementation speaks the engine's HTTP API with `reqwest`;
//! tests substitute their own scripted engines.

mod http;
mod progress;

pub use http::HttpEngine;
pub use progress::{ProgressDetail, ProgressMessage};

use crate::{errors::EngineError, image::ImageName, registry::AuthConfig};
use async_trait::async_trait;
use std::io::Write;

/// Request body and parameters for one container create
///
/// Built once per invocation. A retried create sends this same value again.
#[derive(Clone, Debug, PartialEq)]
pub struct CreateRequest {
    /// Image name as the engine will see it in the configuration
    pub image: String,
    /// Merged container and host configuration
    pub body: serde_json::Value,
    /// Optional container name
    pub name: Option<String>,
}

/// Decoded body of a successful create
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CreateResponse {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Warnings", default, deserialize_with = "null_as_empty")]
    pub warnings: Vec<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<Vec<String>> = serde::Deserialize::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// Operations the creation workflow needs from a container engine
///
/// Every call is a single attempt; nothing here retries.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Pull `image` into the engine's local store
    ///
    /// The engine's raw progress output is copied to `progress` as it
    /// arrives.
    async fn pull(
        &self,
        image: &ImageName,
        auth: &AuthConfig,
        progress: &mut (dyn Write + Send),
    ) -> Result<(), EngineError>;

    /// Create a container
    async fn create(&self, request: &CreateRequest) -> Result<CreateResponse, EngineError>;

    /// Give the local image `source` the additional name `target`
    async fn tag(&self, source: &ImageName, target: &ImageName) -> Result<(), EngineError>;
}
