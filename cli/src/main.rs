#[macro_use] extern crate clap;

use berth::{
    ContainerCreator, CreateOptions, HttpEngine, PullPolicy, RegistryTrustResolver, SettingsBuilder,
};
use clap::{App, ArgMatches};
use env_logger::{Builder, Env};
use std::{error::Error, io};

#[tokio::main]
async fn main() {
    let yaml = load_yaml!("cli.yml");
    let matches = App::from_yaml(yaml).get_matches();

    let log_level = matches.value_of("log_level").unwrap_or("warn");
    Builder::from_env(Env::default().default_filter_or(log_level)).init();

    if let Err(err) = run(&matches).await {
        log::error!("{}", err);
        eprintln!("berth: {}", err);
        std::process::exit(125);
    }
}

async fn run(matches: &ArgMatches<'_>) -> Result<(), Box<dyn Error>> {
    let mut settings = SettingsBuilder::from_env()?;
    if let Some(host) = matches.value_of("host") {
        settings = settings.engine(host);
    }
    if matches.is_present("content_trust") {
        settings = settings.content_trust(true);
    }
    if matches.is_present("disable_content_trust") {
        settings = settings.content_trust(false);
    }
    let settings = settings.build()?;

    let pull: PullPolicy = matches.value_of("pull").unwrap_or("").parse()?;
    let image = matches.value_of("image_reference").unwrap_or("");
    let mut options = CreateOptions::new(image)
        .args(string_values(matches, "run_args"))
        .pull(pull);
    for (key, value) in env_values(matches, "run_env") {
        options = options.env(key, value);
    }
    if let Some(name) = matches.value_of("name") {
        options = options.name(name);
    }
    if let Some(path) = matches.value_of("cidfile") {
        options = options.cidfile(path);
    }

    let engine = HttpEngine::from_settings(&settings);
    let trust = RegistryTrustResolver::from_settings(&settings);
    let creator = ContainerCreator::new(&engine, &trust, &settings);
    creator
        .run(options, &mut io::stdout(), &mut io::stderr())
        .await?;
    Ok(())
}

fn string_values<S: AsRef<str>>(matches: &ArgMatches, name: S) -> Vec<String> {
    matches
        .values_of(name)
        .into_iter()
        .flatten()
        .map(|value| value.to_string())
        .collect()
}

fn env_values<S: AsRef<str>>(matches: &ArgMatches, name: S) -> Vec<(String, String)> {
    string_values(matches, name)
        .iter()
        .filter_map(|env_str| env_pair(env_str))
        .collect()
}

/// `KEY=VALUE` as given, or a bare `KEY` taking its value from our own
/// environment. A bare key that isn't set here is left out.
fn env_pair(env_str: &str) -> Option<(String, String)> {
    match env_str.split_once('=') {
        Some((key, value)) => Some((key.to_string(), value.to_string())),
        None => match std::env::var(env_str) {
            Ok(value) => Some((env_str.to_string(), value)),
            Err(_) => {
                log::debug!("{} is not set, not passing it on", env_str);
                None
            }
        },
    }
}
