use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Container settings in the engine's JSON model
///
/// Only the fields this crate sets are typed. The host configuration rides
/// along separately and is merged in by [merge_configs].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerConfig {
    pub image: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmd: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub tty: bool,
    #[serde(default)]
    pub open_stdin: bool,
}

impl ContainerConfig {
    pub fn new(image: &str) -> Self {
        ContainerConfig {
            image: image.to_owned(),
            ..Default::default()
        }
    }
}

/// Host-side settings for a container
///
/// Anything not modeled here can be passed through `extra`, which is
/// flattened into the same JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,
    #[serde(default)]
    pub auto_remove: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Combine container and host settings into one create body
///
/// The host settings go under `HostConfig`, next to the container fields.
pub fn merge_configs(
    config: &ContainerConfig,
    host_config: &HostConfig,
) -> Result<Value, serde_json::Error> {
    let mut merged = match serde_json::to_value(config)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    merged.insert("HostConfig".to_owned(), serde_json::to_value(host_config)?);
    Ok(Value::Object(merged))
}
