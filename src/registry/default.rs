use crate::image::{ImageName, Registry, Repository};

/// Settings for the registry used when an image name doesn't specify one
///
/// If you don't need the additional options, you can convert a plain [Registry]
/// [Into] a [DefaultRegistry]
#[derive(Clone, Debug)]
pub struct DefaultRegistry {
    /// Connect to the registry under this name
    pub network_name: Registry,
    /// This registry is also known under additional names
    pub also_known_as: Vec<Registry>,
    /// Use this prefix when accessing an image repository with only a single
    /// path component
    pub library_prefix: Option<Repository>,
    /// Key under which credentials for this registry are stored
    pub index_server: String,
}

/// Credential key for the public Docker Hub index
pub const DEFAULT_INDEX_SERVER: &str = "https://index.docker.io/v1/";

impl From<Registry> for DefaultRegistry {
    fn from(network_name: Registry) -> Self {
        DefaultRegistry {
            index_server: network_name.to_string(),
            network_name,
            also_known_as: vec![],
            library_prefix: None,
        }
    }
}

impl Default for DefaultRegistry {
    fn default() -> Self {
        DefaultRegistry::new()
    }
}

impl DefaultRegistry {
    /// Return the built-in defaults
    pub fn new() -> Self {
        DefaultRegistry {
            network_name: "registry-1.docker.io".parse().unwrap(),
            also_known_as: vec!["docker.io".parse().unwrap(), "index.docker.io".parse().unwrap()],
            library_prefix: Some("library".parse().unwrap()),
            index_server: DEFAULT_INDEX_SERVER.to_owned(),
        }
    }

    /// Is the given registry (or lack of one) this default registry?
    pub fn is_default(&self, registry: Option<&Registry>) -> bool {
        match registry {
            None => true,
            Some(registry) => {
                registry == &self.network_name || self.also_known_as.contains(registry)
            }
        }
    }

    /// Determine the actual network server and repository path for an image
    pub fn resolve_image_name(&self, image: &ImageName) -> (Registry, Repository) {
        let registry = image.registry();
        let settings = match registry {
            Some(registry) if !self.is_default(Some(&registry)) => DefaultRegistry::from(registry),
            _ => self.clone(),
        };

        let image_repo = image.repository();
        let complete_repo = match &settings.library_prefix {
            Some(prefix) if image_repo.is_single_component() => prefix.join(&image_repo),
            _ => image_repo,
        };

        (settings.network_name, complete_repo)
    }

    /// Which credential store entry authenticates pulls of this image
    pub fn index_for(&self, image: &ImageName) -> String {
        match image.registry() {
            Some(registry) if !self.is_default(Some(&registry)) => registry.to_string(),
            _ => self.index_server.clone(),
        }
    }
}
