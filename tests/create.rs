use async_trait::async_trait;
use berth::{
    engine::{CreateRequest, CreateResponse, Engine},
    errors::{CreateError, EngineError, TrustError},
    image::{ContentDigest, ImageName, Tag},
    registry::AuthConfig,
    trust::{TrustResolver, TrustedReference},
    ContainerCreator, CreateOptions, PullPolicy, Settings,
};
use std::{collections::VecDeque, io::Write, sync::Mutex};
use tokio::runtime::Runtime;

const ID: &str = "9b1d3c4ef5a6";

#[derive(Clone, Debug, PartialEq)]
enum Call {
    Pull(String),
    Create(String),
    Tag(String, String),
}

/// Engine that answers from a script and records every call
#[derive(Default)]
struct ScriptedEngine {
    calls: Mutex<Vec<Call>>,
    requests: Mutex<Vec<CreateRequest>>,
    creates: Mutex<VecDeque<Result<CreateResponse, EngineError>>>,
    pulls: Mutex<VecDeque<Result<(), EngineError>>>,
}

impl ScriptedEngine {
    fn new() -> Self {
        Default::default()
    }

    fn create_returns(self, result: Result<CreateResponse, EngineError>) -> Self {
        self.creates.lock().unwrap().push_back(result);
        self
    }

    fn pull_returns(self, result: Result<(), EngineError>) -> Self {
        self.pulls.lock().unwrap().push_back(result);
        self
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, which: fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| which(call)).count()
    }

    fn pull_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Pull(_)))
    }

    fn create_count(&self) -> usize {
        self.count(|call| matches!(call, Call::Create(_)))
    }
}

#[async_trait]
impl Engine for ScriptedEngine {
    async fn pull(
        &self,
        image: &ImageName,
        _auth: &AuthConfig,
        progress: &mut (dyn Write + Send),
    ) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(Call::Pull(image.to_string()));
        writeln!(progress, "{{\"status\":\"Pulling from {}\"}}", image)?;
        self.pulls.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn create(&self, request: &CreateRequest) -> Result<CreateResponse, EngineError> {
        self.calls.lock().unwrap().push(Call::Create(request.image.clone()));
        self.requests.lock().unwrap().push(request.clone());
        self.creates
            .lock()
            .unwrap()
            .pop_front()
            .expect("unscripted create")
    }

    async fn tag(&self, source: &ImageName, target: &ImageName) -> Result<(), EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Tag(source.to_string(), target.to_string()));
        Ok(())
    }
}

/// Trust resolver that pins every tag to one digest, or always fails
struct FixedTrust {
    digest: Option<ContentDigest>,
    calls: Mutex<usize>,
}

impl FixedTrust {
    fn pinned() -> Self {
        FixedTrust {
            digest: Some(trusted_digest()),
            calls: Mutex::new(0),
        }
    }

    fn failing() -> Self {
        FixedTrust {
            digest: None,
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl TrustResolver for FixedTrust {
    async fn resolve(&self, name: &ImageName, tag: &Tag) -> Result<TrustedReference, TrustError> {
        *self.calls.lock().unwrap() += 1;
        match &self.digest {
            Some(digest) => Ok(TrustedReference::new(name, digest.clone())),
            None => Err(TrustError::NoTrustData {
                image: name.with_tag(tag).to_string(),
                status: 404,
            }),
        }
    }
}

fn trusted_digest() -> ContentDigest {
    ContentDigest::from_content(b"{\"schemaVersion\":2}")
}

fn created(warnings: &[&str]) -> Result<CreateResponse, EngineError> {
    Ok(CreateResponse {
        id: ID.to_owned(),
        warnings: warnings.iter().map(|w| w.to_string()).collect(),
    })
}

fn no_such_image(image: &str) -> Result<CreateResponse, EngineError> {
    Err(EngineError::Status {
        status: 404,
        message: format!("No such image: {}", image),
    })
}

fn settings(content_trust: bool) -> Settings {
    Settings::builder()
        .content_trust(content_trust)
        .build()
        .unwrap()
}

struct Outputs {
    out: Vec<u8>,
    diag: Vec<u8>,
}

impl Outputs {
    fn out(&self) -> String {
        String::from_utf8(self.out.clone()).unwrap()
    }

    fn diag(&self) -> String {
        String::from_utf8(self.diag.clone()).unwrap()
    }
}

async fn common(
    engine: &ScriptedEngine,
    trust: &FixedTrust,
    content_trust: bool,
    options: CreateOptions,
) -> (Result<berth::CreateOutcome, CreateError>, Outputs) {
    let _ = env_logger::builder().is_test(true).try_init();
    let settings = settings(content_trust);
    let creator = ContainerCreator::new(engine, trust, &settings);
    let mut outputs = Outputs {
        out: Vec::new(),
        diag: Vec::new(),
    };
    let result = creator
        .run(options, &mut outputs.out, &mut outputs.diag)
        .await;
    (result, outputs)
}

#[test]
fn alpine_present_locally() {
    Runtime::new().unwrap().block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let cid = dir.path().join("cid");
        let engine = ScriptedEngine::new().create_returns(created(&[]));
        let trust = FixedTrust::pinned();
        let (result, outputs) = common(
            &engine,
            &trust,
            false,
            CreateOptions::new("alpine").cidfile(&cid),
        )
        .await;

        assert_eq!(result.unwrap().id, ID);
        assert_eq!(engine.calls(), vec![Call::Create("alpine".to_owned())]);
        assert_eq!(outputs.out(), format!("{}\n", ID));
        assert_eq!(outputs.diag(), "");
        assert_eq!(std::fs::read_to_string(&cid).unwrap(), ID);
    })
}

#[test]
fn missing_image_pulled_then_retried() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new()
            .create_returns(no_such_image("alpine:latest"))
            .create_returns(created(&[]));
        let trust = FixedTrust::pinned();
        let (result, outputs) =
            common(&engine, &trust, false, CreateOptions::new("alpine:latest")).await;

        assert_eq!(result.unwrap().id, ID);
        assert_eq!(
            engine.calls(),
            vec![
                Call::Create("alpine:latest".to_owned()),
                Call::Pull("alpine:latest".to_owned()),
                Call::Create("alpine:latest".to_owned()),
            ]
        );
        assert_eq!(outputs.out(), format!("{}\n", ID));
        assert!(outputs
            .diag()
            .starts_with("Unable to find image 'alpine:latest' locally\n"));
        assert!(outputs.diag().contains("Pulling from alpine:latest"));
        assert_eq!(trust.calls(), 0);
    })
}

#[test]
fn retry_error_is_returned() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new()
            .create_returns(no_such_image("alpine:latest"))
            .create_returns(Err(EngineError::Status {
                status: 500,
                message: "retry went wrong".to_owned(),
            }));
        let trust = FixedTrust::pinned();
        let (result, outputs) =
            common(&engine, &trust, false, CreateOptions::new("alpine:latest")).await;

        match result {
            Err(CreateError::Create(EngineError::Status { status, message })) => {
                assert_eq!(status, 500);
                assert_eq!(message, "retry went wrong");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(engine.pull_count(), 1);
        assert_eq!(engine.create_count(), 2);
        assert_eq!(outputs.out(), "");
    })
}

#[test]
fn retry_is_bounded_with_always_policy() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new()
            .create_returns(no_such_image("alpine"))
            .create_returns(no_such_image("alpine"));
        let trust = FixedTrust::pinned();
        let (result, outputs) = common(
            &engine,
            &trust,
            false,
            CreateOptions::new("alpine").pull(PullPolicy::Always),
        )
        .await;

        assert!(matches!(result, Err(CreateError::Create(ref err)) if err.is_image_missing("alpine")));
        assert_eq!(engine.pull_count(), 2);
        assert_eq!(engine.create_count(), 2);
        assert!(outputs.diag().starts_with("Pulling image 'alpine:latest'\n"));
        assert!(outputs.diag().contains("Unable to find image 'alpine:latest' locally"));
    })
}

#[test]
fn retry_is_bounded_with_missing_policy() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new()
            .create_returns(no_such_image("alpine"))
            .create_returns(no_such_image("alpine"));
        let trust = FixedTrust::pinned();
        let (result, _) = common(&engine, &trust, false, CreateOptions::new("alpine")).await;

        assert!(matches!(result, Err(CreateError::Create(_))));
        assert_eq!(engine.pull_count(), 1);
        assert_eq!(engine.create_count(), 2);
    })
}

#[test]
fn never_policy_does_not_pull() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new().create_returns(no_such_image("alpine"));
        let trust = FixedTrust::pinned();
        let (result, outputs) = common(
            &engine,
            &trust,
            false,
            CreateOptions::new("alpine").pull(PullPolicy::Never),
        )
        .await;

        assert!(matches!(result, Err(CreateError::Create(_))));
        assert_eq!(engine.calls(), vec![Call::Create("alpine".to_owned())]);
        assert_eq!(outputs.diag(), "");
    })
}

#[test]
fn unrelated_not_found_is_not_recovered() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new().create_returns(Err(EngineError::Status {
            status: 404,
            message: "network backend not found".to_owned(),
        }));
        let trust = FixedTrust::pinned();
        let (result, _) = common(&engine, &trust, false, CreateOptions::new("alpine")).await;

        assert!(matches!(result, Err(CreateError::Create(_))));
        assert_eq!(engine.pull_count(), 0);
        assert_eq!(engine.create_count(), 1);
    })
}

#[test]
fn typed_not_found_is_recovered() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new()
            .create_returns(Err(EngineError::ImageNotFound("docker.io/library/alpine:3.12".to_owned())))
            .create_returns(created(&[]));
        let trust = FixedTrust::pinned();
        let (result, _) = common(&engine, &trust, false, CreateOptions::new("alpine:3.12")).await;

        assert_eq!(result.unwrap().id, ID);
        assert_eq!(engine.pull_count(), 1);
    })
}

#[test]
fn eager_pull_failure_aborts() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new()
            .pull_returns(Err(EngineError::Stream("manifest unknown".to_owned())));
        let trust = FixedTrust::pinned();
        let (result, _) = common(
            &engine,
            &trust,
            false,
            CreateOptions::new("alpine").pull(PullPolicy::Always),
        )
        .await;

        assert!(matches!(result, Err(CreateError::Pull(EngineError::Stream(_)))));
        assert_eq!(engine.calls(), vec![Call::Pull("alpine:latest".to_owned())]);
    })
}

#[test]
fn recovery_pull_failure_skips_retry() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new()
            .create_returns(no_such_image("alpine"))
            .pull_returns(Err(EngineError::Status {
                status: 500,
                message: "registry unreachable".to_owned(),
            }));
        let trust = FixedTrust::pinned();
        let (result, _) = common(&engine, &trust, false, CreateOptions::new("alpine")).await;

        assert!(matches!(result, Err(CreateError::Pull(_))));
        assert_eq!(engine.create_count(), 1);
    })
}

/// Diagnostics sink that accepts writes but can't be flushed
#[derive(Default)]
struct UnflushableSink(Vec<u8>);

impl Write for UnflushableSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "diagnostics closed"))
    }
}

#[test]
fn pull_error_outranks_flush_error() {
    Runtime::new().unwrap().block_on(async {
        let _ = env_logger::builder().is_test(true).try_init();
        let engine = ScriptedEngine::new()
            .pull_returns(Err(EngineError::Stream("manifest unknown".to_owned())));
        let trust = FixedTrust::pinned();
        let settings = settings(false);
        let creator = ContainerCreator::new(&engine, &trust, &settings);
        let mut diag = UnflushableSink::default();
        let result = creator
            .create(CreateOptions::new("alpine").pull(PullPolicy::Always), &mut diag)
            .await;

        match result {
            Err(CreateError::Pull(EngineError::Stream(message))) => {
                assert_eq!(message, "manifest unknown")
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(engine.create_count(), 0);
    })
}

#[test]
fn flush_error_after_good_pull_is_reported() {
    Runtime::new().unwrap().block_on(async {
        let _ = env_logger::builder().is_test(true).try_init();
        let engine = ScriptedEngine::new();
        let trust = FixedTrust::pinned();
        let settings = settings(false);
        let creator = ContainerCreator::new(&engine, &trust, &settings);
        let mut diag = UnflushableSink::default();
        let result = creator
            .create(CreateOptions::new("alpine").pull(PullPolicy::Always), &mut diag)
            .await;

        assert!(matches!(result, Err(CreateError::Output(_))));
        assert_eq!(engine.calls(), vec![Call::Pull("alpine:latest".to_owned())]);
    })
}

#[test]
fn warnings_only_on_diagnostics() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new().create_returns(created(&["low disk space"]));
        let trust = FixedTrust::pinned();
        let (result, outputs) = common(&engine, &trust, false, CreateOptions::new("alpine")).await;

        assert_eq!(result.unwrap().warnings, vec!["low disk space".to_owned()]);
        assert_eq!(outputs.out(), format!("{}\n", ID));
        assert_eq!(outputs.diag(), "WARNING: low disk space\n");
    })
}

#[test]
fn digest_reference_skips_trust() {
    Runtime::new().unwrap().block_on(async {
        let image = format!("alpine@{}", trusted_digest());
        let engine = ScriptedEngine::new()
            .create_returns(no_such_image(&image))
            .create_returns(created(&[]));
        let trust = FixedTrust::pinned();
        let (result, _) = common(&engine, &trust, true, CreateOptions::new(&image)).await;

        assert_eq!(result.unwrap().id, ID);
        assert_eq!(trust.calls(), 0);
        assert_eq!(
            engine.calls(),
            vec![
                Call::Create(image.clone()),
                Call::Pull(image.clone()),
                Call::Create(image.clone()),
            ]
        );
    })
}

#[test]
fn digest_reference_with_always_policy_skips_trust() {
    Runtime::new().unwrap().block_on(async {
        let image = format!("alpine@{}", trusted_digest());
        let engine = ScriptedEngine::new().create_returns(created(&[]));
        let trust = FixedTrust::pinned();
        let (result, outputs) = common(
            &engine,
            &trust,
            true,
            CreateOptions::new(&image).pull(PullPolicy::Always),
        )
        .await;

        assert_eq!(result.unwrap().id, ID);
        assert_eq!(trust.calls(), 0);
        assert_eq!(engine.pull_count(), 0);
        assert_eq!(engine.calls(), vec![Call::Create(image.clone())]);
        assert!(!outputs.diag().contains("Pulling"));
    })
}

#[test]
fn trusted_recovery_tags_the_pinned_image() {
    Runtime::new().unwrap().block_on(async {
        let pinned = format!("alpine@{}", trusted_digest());
        let engine = ScriptedEngine::new()
            .create_returns(no_such_image("alpine"))
            .create_returns(created(&[]));
        let trust = FixedTrust::pinned();
        let (result, _) = common(&engine, &trust, true, CreateOptions::new("alpine")).await;

        assert_eq!(result.unwrap().id, ID);
        assert_eq!(trust.calls(), 1);
        assert_eq!(
            engine.calls(),
            vec![
                Call::Create("alpine".to_owned()),
                Call::Pull(pinned.clone()),
                Call::Tag(pinned, "alpine:latest".to_owned()),
                Call::Create("alpine".to_owned()),
            ]
        );
    })
}

#[test]
fn trusted_always_pins_the_request() {
    Runtime::new().unwrap().block_on(async {
        let pinned = format!("alpine@{}", trusted_digest());
        let engine = ScriptedEngine::new().create_returns(created(&[]));
        let trust = FixedTrust::pinned();
        let (result, _) = common(
            &engine,
            &trust,
            true,
            CreateOptions::new("alpine").pull(PullPolicy::Always),
        )
        .await;

        assert_eq!(result.unwrap().id, ID);
        assert_eq!(trust.calls(), 1);
        assert_eq!(engine.calls(), vec![Call::Create(pinned.clone())]);
        let requests = engine.requests.lock().unwrap();
        assert_eq!(requests[0].body["Image"], pinned.as_str());
    })
}

#[test]
fn trust_failure_is_fatal() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new();
        let trust = FixedTrust::failing();
        let (result, _) = common(
            &engine,
            &trust,
            true,
            CreateOptions::new("alpine").pull(PullPolicy::Always),
        )
        .await;

        assert!(matches!(
            result,
            Err(CreateError::Trust(TrustError::NoTrustData { status: 404, .. }))
        ));
        assert!(engine.calls().is_empty());
    })
}

#[test]
fn existing_cidfile_stops_everything() {
    Runtime::new().unwrap().block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let cid = dir.path().join("cid");
        std::fs::write(&cid, "another container").unwrap();
        let engine = ScriptedEngine::new();
        let trust = FixedTrust::pinned();
        let (result, outputs) =
            common(&engine, &trust, false, CreateOptions::new("alpine").cidfile(&cid)).await;

        assert!(matches!(result, Err(CreateError::CidFileExists(ref p)) if p == &cid));
        assert!(engine.calls().is_empty());
        assert_eq!(outputs.out(), "");
        assert_eq!(std::fs::read_to_string(&cid).unwrap(), "another container");
    })
}

#[test]
fn failed_create_leaves_no_cidfile() {
    Runtime::new().unwrap().block_on(async {
        let dir = tempfile::tempdir().unwrap();
        let cid = dir.path().join("cid");
        let engine = ScriptedEngine::new().create_returns(Err(EngineError::Status {
            status: 409,
            message: "name already in use".to_owned(),
        }));
        let trust = FixedTrust::pinned();
        let (result, _) =
            common(&engine, &trust, false, CreateOptions::new("alpine").cidfile(&cid)).await;

        assert!(matches!(result, Err(CreateError::Create(_))));
        assert!(!cid.exists());
    })
}

#[test]
fn invalid_reference_makes_no_calls() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new();
        let trust = FixedTrust::pinned();
        let (result, _) = common(&engine, &trust, false, CreateOptions::new("Alpine:??")).await;

        assert!(matches!(result, Err(CreateError::InvalidReference(_))));
        assert!(engine.calls().is_empty());
    })
}

#[test]
fn request_carries_configuration() {
    Runtime::new().unwrap().block_on(async {
        let engine = ScriptedEngine::new()
            .create_returns(no_such_image("busybox"))
            .create_returns(created(&[]));
        let trust = FixedTrust::pinned();
        let mut options = CreateOptions::new("busybox")
            .name("greeter")
            .env("GREETING", "hello")
            .args(vec!["echo", "hello"]);
        options.host_config.auto_remove = true;
        let (result, _) = common(&engine, &trust, false, options).await;
        assert!(result.is_ok());

        let requests = engine.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[0].name.as_deref(), Some("greeter"));
        assert_eq!(requests[0].body["Image"], "busybox");
        assert_eq!(requests[0].body["Cmd"], serde_json::json!(["echo", "hello"]));
        assert_eq!(requests[0].body["Env"], serde_json::json!(["GREETING=hello"]));
        assert_eq!(requests[0].body["HostConfig"]["AutoRemove"], true);
    })
}
