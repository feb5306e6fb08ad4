use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sandbox::proto::{
    AppGetOrCreateRequest, AppGetOrCreateResponse, ImageFromRegistryRequest,
    ImageFromRegistryResponse, ObjectCreationType, RegistryAuthType, SandboxCreateRequest,
    SandboxCreateResponse, SecretGetOrCreateRequest, SecretGetOrCreateResponse, TunnelType,
    VolumeDeleteRequest, VolumeDeleteResponse, VolumeGetOrCreateRequest,
    VolumeGetOrCreateResponse,
};
use sandbox::{
    CLIENT_TYPE_KEY, CLIENT_VERSION_KEY, Client, ClientSettings, Code, Context, DeleteOptions,
    EphemeralOptions, Image, ImageFromRegistryOptions, LookupOptions, SandboxError,
    SandboxOptions, Secret, Status, Transport, Volume,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// In-memory control plane that records every request it receives.
#[derive(Default)]
struct FakeControlPlane {
    apps: Mutex<BTreeMap<(String, String), String>>,
    volumes: Mutex<BTreeMap<(String, String), String>>,
    app_requests: Mutex<Vec<AppGetOrCreateRequest>>,
    sandbox_requests: Mutex<Vec<SandboxCreateRequest>>,
    image_requests: Mutex<Vec<ImageFromRegistryRequest>>,
    secret_requests: Mutex<Vec<SecretGetOrCreateRequest>>,
    seen_metadata: Mutex<Vec<BTreeMap<String, String>>>,
    /// Returned from every call when set.
    failure: Mutex<Option<Status>>,
    /// Added before every response.
    latency: Option<Duration>,
}

impl FakeControlPlane {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    fn fail_with(&self, status: Status) {
        *self.failure.lock().unwrap() = Some(status);
    }

    async fn enter(&self, ctx: &Context) -> Result<(), Status> {
        self.seen_metadata.lock().unwrap().push(
            ctx.metadata()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.failure.lock().unwrap().clone() {
            Some(status) => Err(status),
            None => Ok(()),
        }
    }
}

fn get_or_create(
    objects: &Mutex<BTreeMap<(String, String), String>>,
    prefix: &str,
    name: &str,
    environment: &str,
    creation: ObjectCreationType,
) -> Result<String, Status> {
    let mut objects = objects.lock().unwrap();
    let key = (environment.to_string(), name.to_string());
    if let Some(id) = objects.get(&key) {
        return Ok(id.clone());
    }
    if creation != ObjectCreationType::CreateIfMissing {
        return Err(Status::not_found(format!("{name} does not exist")));
    }
    let id = format!("{prefix}-{}", objects.len() + 1);
    objects.insert(key, id.clone());
    Ok(id)
}

#[async_trait]
impl Transport for FakeControlPlane {
    async fn app_get_or_create(
        &self,
        ctx: &Context,
        request: AppGetOrCreateRequest,
    ) -> Result<AppGetOrCreateResponse, Status> {
        self.enter(ctx).await?;
        self.app_requests.lock().unwrap().push(request.clone());
        let app_id = get_or_create(
            &self.apps,
            "ap",
            &request.app_name,
            &request.environment_name,
            request.object_creation_type,
        )?;
        Ok(AppGetOrCreateResponse { app_id })
    }

    async fn sandbox_create(
        &self,
        ctx: &Context,
        request: SandboxCreateRequest,
    ) -> Result<SandboxCreateResponse, Status> {
        self.enter(ctx).await?;
        let mut requests = self.sandbox_requests.lock().unwrap();
        requests.push(request);
        Ok(SandboxCreateResponse {
            sandbox_id: format!("sb-{}", requests.len()),
        })
    }

    async fn image_from_registry(
        &self,
        ctx: &Context,
        request: ImageFromRegistryRequest,
    ) -> Result<ImageFromRegistryResponse, Status> {
        self.enter(ctx).await?;
        let image_id = format!("im-{}", request.tag.replace([':', '/'], "-"));
        self.image_requests.lock().unwrap().push(request);
        Ok(ImageFromRegistryResponse { image_id })
    }

    async fn secret_get_or_create(
        &self,
        ctx: &Context,
        request: SecretGetOrCreateRequest,
    ) -> Result<SecretGetOrCreateResponse, Status> {
        self.enter(ctx).await?;
        let mut requests = self.secret_requests.lock().unwrap();
        requests.push(request.clone());
        if request.object_creation_type == ObjectCreationType::Unspecified {
            return Err(Status::not_found("no such secret"));
        }
        Ok(SecretGetOrCreateResponse {
            secret_id: format!("st-{}", requests.len()),
        })
    }

    async fn volume_get_or_create(
        &self,
        ctx: &Context,
        request: VolumeGetOrCreateRequest,
    ) -> Result<VolumeGetOrCreateResponse, Status> {
        self.enter(ctx).await?;
        let volume_id = get_or_create(
            &self.volumes,
            "vo",
            &request.deployment_name,
            &request.environment_name,
            request.object_creation_type,
        )?;
        Ok(VolumeGetOrCreateResponse { volume_id })
    }

    async fn volume_delete(
        &self,
        ctx: &Context,
        request: VolumeDeleteRequest,
    ) -> Result<VolumeDeleteResponse, Status> {
        self.enter(ctx).await?;
        let key = (request.environment_name, request.deployment_name);
        match self.volumes.lock().unwrap().remove(&key) {
            Some(_) => Ok(VolumeDeleteResponse {}),
            None => Err(Status::not_found("no such volume")),
        }
    }
}

fn client_for(plane: &Arc<FakeControlPlane>) -> Client {
    let transport: Arc<dyn Transport> = plane.clone();
    Client::new(
        transport,
        ClientSettings {
            default_environment: "main".into(),
            client_version: "9.9.9".into(),
        },
    )
}

fn create_if_missing() -> LookupOptions {
    LookupOptions {
        create_if_missing: true,
        ..LookupOptions::default()
    }
}

// ---------------------------------------------------------------------------
// App resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lookup_missing_app_is_not_found() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);

    let err = client
        .app_lookup(&Context::background(), "ghost", &LookupOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::NotFound(_)), "got: {err:?}");
    assert!(err.to_string().contains("ghost"), "got: {err}");
    let requests = plane.app_requests.lock().unwrap();
    assert_eq!(requests[0].object_creation_type, ObjectCreationType::Unspecified);
}

#[tokio::test]
async fn lookup_with_create_if_missing_returns_app() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);

    let app = client
        .app_lookup(&Context::background(), "web", &create_if_missing())
        .await
        .unwrap();

    assert_eq!(app.app_id(), "ap-1");
    let requests = plane.app_requests.lock().unwrap();
    assert_eq!(requests[0].object_creation_type, ObjectCreationType::CreateIfMissing);
    assert_eq!(requests[0].environment_name, "main");
}

#[tokio::test]
async fn repeated_create_if_missing_is_idempotent() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let ctx = Context::background();

    let first = client.app_lookup(&ctx, "web", &create_if_missing()).await.unwrap();
    let second = client.app_lookup(&ctx, "web", &create_if_missing()).await.unwrap();

    assert_eq!(first.app_id(), second.app_id());
    // No client-side caching: both lookups reached the server.
    assert_eq!(plane.app_requests.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn explicit_environment_is_forwarded() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let options = LookupOptions {
        environment: "staging".into(),
        create_if_missing: true,
    };

    client
        .app_lookup(&Context::background(), "web", &options)
        .await
        .unwrap();

    assert_eq!(plane.app_requests.lock().unwrap()[0].environment_name, "staging");
}

#[tokio::test]
async fn other_transport_errors_pass_through() {
    let plane = Arc::new(FakeControlPlane::default());
    plane.fail_with(Status::new(Code::PermissionDenied, "token revoked"));
    let client = client_for(&plane);

    let err = client
        .app_lookup(&Context::background(), "web", &create_if_missing())
        .await
        .unwrap_err();

    match err {
        SandboxError::Transport(status) => {
            assert_eq!(status, Status::new(Code::PermissionDenied, "token revoked"));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
}

#[tokio::test]
async fn app_context_carries_session_metadata() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let ctx = Context::background().with_metadata("x-trace", "abc");

    let app = client.app_lookup(&ctx, "web", &create_if_missing()).await.unwrap();

    assert_eq!(app.context().metadata_value(CLIENT_TYPE_KEY), Some("rust"));
    assert_eq!(app.context().metadata_value(CLIENT_VERSION_KEY), Some("9.9.9"));
    assert_eq!(app.context().metadata_value("x-trace"), Some("abc"));
    let seen = plane.seen_metadata.lock().unwrap();
    assert_eq!(seen[0].get(CLIENT_VERSION_KEY).map(String::as_str), Some("9.9.9"));
}

// ---------------------------------------------------------------------------
// Sandbox creation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_sandbox_sends_compiled_definition() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let app = client
        .app_lookup(&Context::background(), "web", &create_if_missing())
        .await
        .unwrap();

    let options = SandboxOptions {
        cpu: 0.25,
        memory: 1024,
        timeout: Some(Duration::from_millis(90_700)),
        command: vec!["sleep".into(), "infinity".into()],
        encrypted_ports: vec![1, 2],
        h2_ports: vec![3],
        unencrypted_ports: vec![4],
        ..SandboxOptions::default()
    }
    .mount("/b", Volume::new("vo-b"))
    .mount("/a", Volume::new("vo-a"));

    let sandbox = client
        .create_sandbox(&app, &Image::new("im-1"), &options)
        .await
        .unwrap();

    assert_eq!(sandbox.sandbox_id(), "sb-1");
    let requests = plane.sandbox_requests.lock().unwrap();
    let request = &requests[0];
    assert_eq!(request.app_id, app.app_id());
    let def = &request.definition;
    assert_eq!(def.image_id, "im-1");
    assert_eq!(def.entrypoint_args, vec!["sleep", "infinity"]);
    assert_eq!(def.timeout_secs, 90);
    assert_eq!(def.resources.milli_cpu, 250);
    assert_eq!(def.resources.memory_mb, 1024);

    let mounts: Vec<_> = def
        .volume_mounts
        .iter()
        .map(|m| (m.mount_path.as_str(), m.volume_id.as_str()))
        .collect();
    assert_eq!(mounts, vec![("/a", "vo-a"), ("/b", "vo-b")]);
    assert!(def
        .volume_mounts
        .iter()
        .all(|m| m.allow_background_commits && !m.read_only));

    let ports: Vec<_> = def
        .open_ports
        .as_ref()
        .unwrap()
        .ports
        .iter()
        .map(|p| (p.port, p.unencrypted, p.tunnel_type))
        .collect();
    assert_eq!(
        ports,
        vec![
            (1, false, None),
            (2, false, None),
            (3, false, Some(TunnelType::H2)),
            (4, true, None),
        ]
    );
}

#[tokio::test]
async fn create_sandbox_without_ports_sends_no_port_config() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let app = client
        .app_lookup(&Context::background(), "web", &create_if_missing())
        .await
        .unwrap();

    client
        .create_sandbox(&app, &Image::new("im-1"), &SandboxOptions::default())
        .await
        .unwrap();

    assert!(plane.sandbox_requests.lock().unwrap()[0].definition.open_ports.is_none());
}

#[tokio::test]
async fn invalid_options_never_reach_the_server() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let app = client
        .app_lookup(&Context::background(), "web", &create_if_missing())
        .await
        .unwrap();
    let options = SandboxOptions {
        encrypted_ports: vec![8080],
        unencrypted_ports: vec![8080],
        ..SandboxOptions::default()
    };

    let err = client
        .create_sandbox(&app, &Image::new("im-1"), &options)
        .await
        .unwrap_err();

    assert!(matches!(err, SandboxError::InvalidConfig(_)), "got: {err:?}");
    assert!(plane.sandbox_requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn sandbox_not_found_is_not_translated() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let app = client
        .app_lookup(&Context::background(), "web", &create_if_missing())
        .await
        .unwrap();
    plane.fail_with(Status::not_found("image gone"));

    let err = client
        .create_sandbox(&app, &Image::new("im-1"), &SandboxOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(Code::NotFound));
}

#[tokio::test(start_paused = true)]
async fn expired_app_context_aborts_creation() {
    let plane = Arc::new(FakeControlPlane::with_latency(Duration::from_secs(5)));
    let client = client_for(&plane);
    let ctx = Context::background().with_timeout(Duration::from_secs(12));
    let app = client.app_lookup(&ctx, "web", &create_if_missing()).await.unwrap();

    // Lookup ends at 5s, first create at 10s, second create would end at 15s.
    client
        .create_sandbox(&app, &Image::new("im-1"), &SandboxOptions::default())
        .await
        .unwrap();
    let err = client
        .create_sandbox(&app, &Image::new("im-1"), &SandboxOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(Code::DeadlineExceeded));
}

#[tokio::test(start_paused = true)]
async fn already_expired_context_sends_nothing() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let ctx = Context::background().with_timeout(Duration::from_secs(2));
    let app = client.app_lookup(&ctx, "web", &create_if_missing()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    let err = client
        .create_sandbox(&app, &Image::new("im-1"), &SandboxOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Code::DeadlineExceeded));

    let err = client
        .app_lookup(&ctx, "api", &create_if_missing())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(Code::DeadlineExceeded));

    assert!(plane.sandbox_requests.lock().unwrap().is_empty());
    assert_eq!(plane.app_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn cancelled_context_aborts_lookup() {
    let plane = Arc::new(FakeControlPlane::with_latency(Duration::from_secs(60)));
    let client = client_for(&plane);
    let ctx = Context::background();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let err = client
        .app_lookup(&ctx, "web", &create_if_missing())
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(Code::Cancelled));
}

// ---------------------------------------------------------------------------
// Images
// ---------------------------------------------------------------------------

#[tokio::test]
async fn image_from_registry_without_secret_has_no_auth() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let app = client
        .app_lookup(&Context::background(), "web", &create_if_missing())
        .await
        .unwrap();

    let image = client
        .image_from_registry(&app, "python:3.12", &ImageFromRegistryOptions::default())
        .await
        .unwrap();

    assert_eq!(image.image_id(), "im-python-3.12");
    let requests = plane.image_requests.lock().unwrap();
    assert_eq!(requests[0].tag, "python:3.12");
    assert!(requests[0].image_registry_config.is_none());
}

#[tokio::test]
async fn image_factories_attach_matching_auth() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let app = client
        .app_lookup(&Context::background(), "web", &create_if_missing())
        .await
        .unwrap();
    let secret = Secret::new("st-creds");

    client
        .image_from_registry(
            &app,
            "private/app:1",
            &ImageFromRegistryOptions {
                secret: Some(secret.clone()),
            },
        )
        .await
        .unwrap();
    client
        .image_from_aws_ecr(&app, "123.dkr.ecr/app:1", &secret)
        .await
        .unwrap();
    client
        .image_from_gcp_artifact_registry(&app, "us-docker.pkg.dev/app:1", &secret)
        .await
        .unwrap();

    let requests = plane.image_requests.lock().unwrap();
    let auth: Vec<_> = requests
        .iter()
        .map(|r| {
            let config = r.image_registry_config.as_ref().unwrap();
            (config.registry_auth_type, config.secret_id.as_str())
        })
        .collect();
    assert_eq!(
        auth,
        vec![
            (RegistryAuthType::StaticCreds, "st-creds"),
            (RegistryAuthType::Aws, "st-creds"),
            (RegistryAuthType::Gcp, "st-creds"),
        ]
    );
    assert!(requests.iter().all(|r| r.app_id == app.app_id()));
}

// ---------------------------------------------------------------------------
// Secrets and volumes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn secret_lookup_translates_not_found() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);

    let err = client
        .secret_from_name(&Context::background(), "docker-hub", &LookupOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.to_string(), "secret 'docker-hub' not found");
}

#[tokio::test]
async fn secret_from_map_is_ephemeral() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let entries = BTreeMap::from([("TOKEN".to_string(), "abc".to_string())]);

    let secret = client
        .secret_from_map(&Context::background(), entries.clone(), &EphemeralOptions::default())
        .await
        .unwrap();

    assert_eq!(secret.secret_id(), "st-1");
    let requests = plane.secret_requests.lock().unwrap();
    assert_eq!(requests[0].object_creation_type, ObjectCreationType::Ephemeral);
    assert!(requests[0].deployment_name.is_empty());
    assert_eq!(requests[0].env_dict, entries);
}

#[tokio::test]
async fn volume_lookup_create_then_delete() {
    let plane = Arc::new(FakeControlPlane::default());
    let client = client_for(&plane);
    let ctx = Context::background();

    let volume = client
        .volume_from_name(&ctx, "cache", &create_if_missing())
        .await
        .unwrap();
    assert_eq!(volume.volume_id(), "vo-1");

    client
        .volume_delete(&ctx, "cache", &DeleteOptions::default())
        .await
        .unwrap();

    let err = client
        .volume_from_name(&ctx, "cache", &LookupOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "volume 'cache' not found");

    let err = client
        .volume_delete(&ctx, "cache", &DeleteOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::NotFound(_)), "got: {err:?}");
}
