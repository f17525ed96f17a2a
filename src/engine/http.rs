use crate::{
    engine::{progress::ProgressCopier, CreateRequest, CreateResponse, Engine},
    errors::{ConfigError, EngineError},
    image::ImageName,
    registry::AuthConfig,
    Settings,
};
use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use std::io::Write;

/// Header carrying registry credentials on a pull
pub const REGISTRY_AUTH_HEADER: &str = "X-Registry-Auth";

/// How the engine starts a 404 message about a missing image
const NO_SUCH_IMAGE: &str = "No such image:";

/// An [Engine] reached over its HTTP API
#[derive(Clone, Debug)]
pub struct HttpEngine {
    base: Url,
    req: reqwest::Client,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl HttpEngine {
    /// Talk to the engine at `base`, which must end with a slash
    pub fn new(base: Url, req: reqwest::Client) -> Self {
        HttpEngine { base, req }
    }

    /// Talk to the engine configured in [Settings]
    pub fn from_settings(settings: &Settings) -> Self {
        HttpEngine::new(settings.engine_url.clone(), settings.network.clone())
    }

    /// Talk to the engine at an address like `tcp://host:2375`
    pub fn connect(address: &str) -> Result<Self, ConfigError> {
        Ok(HttpEngine::new(
            crate::settings::parse_engine_address(address)?,
            reqwest::Client::builder()
                .user_agent(Settings::default_user_agent())
                .build()?,
        ))
    }

    fn url(&self, path: &str) -> Result<Url, EngineError> {
        Ok(self.base.join(path)?)
    }

    /// Turn an unsuccessful response into an error, keeping the engine's
    /// message intact since callers look inside it
    async fn check(response: Response) -> Result<Response, EngineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await?;
        let message = match serde_json::from_slice::<ErrorBody>(&body) {
            Ok(parsed) => parsed.message,
            Err(_) => String::from_utf8_lossy(&body).trim().to_owned(),
        };
        log::debug!("engine error {}: {}", status, message);
        if status == StatusCode::NOT_FOUND {
            if let Some(image) = message.strip_prefix(NO_SUCH_IMAGE) {
                return Err(EngineError::ImageNotFound(image.trim().to_owned()));
            }
        }
        Err(EngineError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Engine for HttpEngine {
    async fn pull(
        &self,
        image: &ImageName,
        auth: &AuthConfig,
        progress: &mut (dyn Write + Send),
    ) -> Result<(), EngineError> {
        let from_image = image.without_version();
        let version = image.version();
        log::info!("pulling {} version {}", from_image, version);

        let request = self
            .req
            .post(self.url("images/create")?)
            .query(&[("fromImage", from_image.as_str()), ("tag", version.as_str())])
            .header(REGISTRY_AUTH_HEADER, auth.to_header_value()?);
        let mut response = HttpEngine::check(request.send().await?).await?;

        let mut copier = ProgressCopier::new(progress);
        while let Some(chunk) = response.chunk().await? {
            copier.feed(&chunk)?;
        }
        copier.finish()?;
        log::debug!("pull of {} complete", image);
        Ok(())
    }

    async fn create(&self, request: &CreateRequest) -> Result<CreateResponse, EngineError> {
        let mut builder = self.req.post(self.url("containers/create")?);
        if let Some(name) = &request.name {
            builder = builder.query(&[("name", name.as_str())]);
        }
        log::info!("creating container from {}", request.image);
        let response = HttpEngine::check(builder.json(&request.body).send().await?).await?;
        let body = response.bytes().await?;
        log::trace!("create response {}", String::from_utf8_lossy(&body));
        Ok(serde_json::from_slice(&body)?)
    }

    async fn tag(&self, source: &ImageName, target: &ImageName) -> Result<(), EngineError> {
        let repo = target.without_version();
        let tag = target.version();
        log::info!("tagging {} as {}", source, target);
        let request = self
            .req
            .post(self.url(&format!("images/{}/tag", source))?)
            .query(&[("repo", repo.as_str()), ("tag", tag.as_str())]);
        HttpEngine::check(request.send().await?).await?;
        Ok(())
    }
}
