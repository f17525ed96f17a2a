#[macro_use] extern crate lazy_static;
#[macro_use] extern crate serde;

pub mod container;
pub mod engine;
pub mod errors;
pub mod image;
pub mod registry;
pub mod trust;

mod settings;

pub use crate::{
    container::{ContainerCreator, CreateOptions, CreateOutcome},
    engine::{Engine, HttpEngine},
    image::{ImageName, Reference},
    settings::{PullPolicy, Settings, SettingsBuilder, DEFAULT_ENGINE_URL},
    trust::{RegistryTrustResolver, TrustResolver},
};
