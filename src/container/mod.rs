//! Creating containers, pulling their images on demand
//!
//! [ContainerCreator] drives one creation through an explicit sequence of
//! [CreateState]s. At most one pull happens in response to a missing image,
//! and at most one create is retried after it.

mod cidfile;
mod config;

pub use cidfile::CidFile;
pub use config::{merge_configs, ContainerConfig, HostConfig};

use crate::{
    engine::{CreateRequest, CreateResponse, Engine},
    errors::{CreateError, EngineError},
    image::{ImageName, Reference},
    settings::{PullPolicy, Settings},
    trust::{TrustResolver, TrustedReference},
};
use std::{io::Write, path::PathBuf};

/// Everything needed to create one container
#[derive(Clone, Debug, Default)]
pub struct CreateOptions {
    /// Image reference as the user spelled it
    pub image: String,
    /// Container settings; the image field is filled in from `image`
    pub config: ContainerConfig,
    pub host_config: HostConfig,
    /// Optional name for the new container
    pub name: Option<String>,
    /// Where to record the new container's ID
    pub cidfile: Option<PathBuf>,
    pub pull: PullPolicy,
}

impl CreateOptions {
    pub fn new(image: &str) -> Self {
        CreateOptions {
            image: image.to_owned(),
            ..Default::default()
        }
    }

    /// Append one argument to the command
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.cmd.push(arg.into());
        self
    }

    /// Append several arguments to the command
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.cmd.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set an environment variable for the container
    pub fn env<K: AsRef<str>, V: AsRef<str>>(mut self, key: K, value: V) -> Self {
        self.config
            .env
            .push(format!("{}={}", key.as_ref(), value.as_ref()));
        self
    }

    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn cidfile<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.cidfile = Some(path.into());
        self
    }

    pub fn pull(mut self, policy: PullPolicy) -> Self {
        self.pull = policy;
        self
    }
}

/// A created container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateOutcome {
    pub id: String,
    pub warnings: Vec<String>,
}

impl From<CreateResponse> for CreateOutcome {
    fn from(response: CreateResponse) -> Self {
        CreateOutcome {
            id: response.id,
            warnings: response.warnings,
        }
    }
}

/// Position in the creation workflow
///
/// `RetryCreate` only ever leads to `Success` or an error, which is what
/// bounds the workflow to a single retry.
#[derive(Debug)]
pub enum CreateState {
    MaybeEagerPull,
    Create,
    NotFoundRecovery,
    RetryCreate,
    Success(CreateResponse),
}

/// Per-invocation state carried between transitions
struct Attempt {
    reference: Reference,
    trusted: Option<TrustedReference>,
    request: CreateRequest,
    pull: PullPolicy,
}

impl Attempt {
    /// The image to pull: the trusted pin if there is one
    fn pull_target(&self) -> ImageName {
        match &self.trusted {
            Some(trusted) => trusted.image_name(),
            None => self.reference.image_name(),
        }
    }
}

/// Creates containers on an [Engine], with trust lookups through a
/// [TrustResolver] and configuration from [Settings]
pub struct ContainerCreator<'a> {
    engine: &'a dyn Engine,
    trust: &'a dyn TrustResolver,
    settings: &'a Settings,
}

impl<'a> ContainerCreator<'a> {
    pub fn new(
        engine: &'a dyn Engine,
        trust: &'a dyn TrustResolver,
        settings: &'a Settings,
    ) -> Self {
        ContainerCreator {
            engine,
            trust,
            settings,
        }
    }

    /// Create a container, printing the new ID as one line on `out`
    ///
    /// Progress, notices and engine warnings go to `diag`.
    pub async fn run(
        &self,
        options: CreateOptions,
        out: &mut (dyn Write + Send),
        diag: &mut (dyn Write + Send),
    ) -> Result<CreateOutcome, CreateError> {
        let outcome = self.create(options, diag).await?;
        writeln!(out, "{}", outcome.id)?;
        out.flush()?;
        Ok(outcome)
    }

    /// Create a container, returning its ID and any warnings
    ///
    /// Warnings are also printed on `diag`, along with pull progress.
    pub async fn create(
        &self,
        options: CreateOptions,
        diag: &mut (dyn Write + Send),
    ) -> Result<CreateOutcome, CreateError> {
        // The ID file is claimed before anything touches the network
        let mut cidfile = match &options.cidfile {
            Some(path) => Some(CidFile::create(path)?),
            None => None,
        };

        let mut attempt = self.init(options).await?;
        let mut state = CreateState::MaybeEagerPull;
        let response = loop {
            log::debug!("{} state {:?}", attempt.reference, state);
            state = match state {
                CreateState::Success(response) => break response,
                CreateState::MaybeEagerPull => self.maybe_eager_pull(&attempt, diag).await?,
                CreateState::Create => self.first_create(&attempt).await?,
                CreateState::NotFoundRecovery => self.recover(&mut attempt, diag).await?,
                CreateState::RetryCreate => self.retry_create(&attempt).await?,
            };
        };

        for warning in &response.warnings {
            writeln!(diag, "WARNING: {}", warning)?;
        }
        if let Some(cidfile) = &mut cidfile {
            cidfile.write(&response.id)?;
        }
        log::info!("created container {} from {}", response.id, attempt.request.image);
        Ok(response.into())
    }

    async fn init(&self, options: CreateOptions) -> Result<Attempt, CreateError> {
        let reference = Reference::parse(&options.image)?;
        let trusted = if self.settings.content_trust()
            && options.pull == PullPolicy::Always
            && !reference.has_digest()
        {
            Some(self.resolve_trust(&reference).await?)
        } else {
            None
        };

        let image = match &trusted {
            Some(trusted) => trusted.image_name().to_string(),
            None => options.image.clone(),
        };
        let mut config = options.config;
        config.image = image.clone();
        let body = merge_configs(&config, &options.host_config).map_err(CreateError::Encode)?;

        Ok(Attempt {
            reference,
            trusted,
            request: CreateRequest {
                image,
                body,
                name: options.name,
            },
            pull: options.pull,
        })
    }

    async fn maybe_eager_pull(
        &self,
        attempt: &Attempt,
        diag: &mut (dyn Write + Send),
    ) -> Result<CreateState, CreateError> {
        if attempt.pull == PullPolicy::Always && !self.settings.content_trust() {
            writeln!(diag, "Pulling image '{}'", attempt.reference)?;
            self.pull_image(&attempt.pull_target(), diag).await?;
        }
        Ok(CreateState::Create)
    }

    async fn first_create(&self, attempt: &Attempt) -> Result<CreateState, CreateError> {
        match self.engine.create(&attempt.request).await {
            Ok(response) => Ok(CreateState::Success(response)),
            Err(err)
                if attempt.pull != PullPolicy::Never
                    && err.is_image_missing(&attempt.request.image) =>
            {
                log::info!("{} not found locally, {}", attempt.request.image, err);
                Ok(CreateState::NotFoundRecovery)
            }
            Err(err) => Err(CreateError::Create(err)),
        }
    }

    async fn recover(
        &self,
        attempt: &mut Attempt,
        diag: &mut (dyn Write + Send),
    ) -> Result<CreateState, CreateError> {
        writeln!(diag, "Unable to find image '{}' locally", attempt.reference)?;

        if self.settings.content_trust()
            && !attempt.reference.has_digest()
            && attempt.trusted.is_none()
        {
            attempt.trusted = Some(self.resolve_trust(&attempt.reference).await?);
        }

        self.pull_image(&attempt.pull_target(), diag).await?;

        if let Some(trusted) = &attempt.trusted {
            if !attempt.reference.has_digest() {
                let local = attempt.reference.image_name();
                self.engine
                    .tag(&trusted.image_name(), &local)
                    .await
                    .map_err(CreateError::Tag)?;
            }
        }
        Ok(CreateState::RetryCreate)
    }

    async fn retry_create(&self, attempt: &Attempt) -> Result<CreateState, CreateError> {
        let response = self
            .engine
            .create(&attempt.request)
            .await
            .map_err(CreateError::Create)?;
        Ok(CreateState::Success(response))
    }

    async fn resolve_trust(&self, reference: &Reference) -> Result<TrustedReference, CreateError> {
        log::debug!("resolving trust for {}", reference);
        Ok(self.trust.resolve(reference.name(), reference.tag()).await?)
    }

    /// One pull, credentials resolved for the index serving `image`
    async fn pull_image(
        &self,
        image: &ImageName,
        diag: &mut (dyn Write + Send),
    ) -> Result<(), CreateError> {
        let index = self.settings.default_registry().index_for(image);
        let auth = self.settings.credentials().resolve(&index);
        log::debug!("pulling {} with credentials for {}", image, index);
        self.engine
            .pull(image, &auth, diag)
            .await
            .map_err(pull_error)?;
        diag.flush()?;
        Ok(())
    }
}

fn pull_error(err: EngineError) -> CreateError {
    log::warn!("pull failed, {}", err);
    CreateError::Pull(err)
}
