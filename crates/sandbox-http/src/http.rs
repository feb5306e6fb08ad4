use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sandbox::proto::{
    AppGetOrCreateRequest, AppGetOrCreateResponse, ImageFromRegistryRequest,
    ImageFromRegistryResponse, SandboxCreateRequest, SandboxCreateResponse,
    SecretGetOrCreateRequest, SecretGetOrCreateResponse, VolumeDeleteRequest,
    VolumeDeleteResponse, VolumeGetOrCreateRequest, VolumeGetOrCreateResponse,
};
use sandbox::{Context, Status, Transport};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::error::{HttpError, HttpResult};
use crate::status;

/// Default timeout for control-plane requests without a context deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const TOKEN_ID_HEADER: &str = "x-token-id";
pub const TOKEN_SECRET_HEADER: &str = "x-token-secret";

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the control plane, e.g. `https://api.example.com`.
    pub server_url: String,
    pub token_id: String,
    pub token_secret: String,
    /// Per-request timeout. A shorter context deadline takes precedence.
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(server_url: String, token_id: String, token_secret: String) -> Self {
        Self {
            server_url,
            token_id,
            token_secret,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// [`Transport`] speaking JSON over HTTP. Each RPC is a POST to
/// `{server_url}/rpc/{Method}`. Clone is a cheap Arc refcount bump.
#[derive(Clone)]
pub struct HttpTransport {
    inner: Arc<Inner>,
}

struct Inner {
    client: Client,
    server_url: String,
    token_id: String,
    token_secret: String,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> HttpResult<Self> {
        let server_url = config.server_url.trim_end_matches('/').to_string();
        if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
            return Err(HttpError::InvalidUrl(config.server_url));
        }
        if config.token_id.is_empty() {
            return Err(HttpError::MissingCredentials("token id"));
        }
        if config.token_secret.is_empty() {
            return Err(HttpError::MissingCredentials("token secret"));
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        info!(server_url = %server_url, "http transport initialized");

        Ok(Self {
            inner: Arc::new(Inner {
                client,
                server_url,
                token_id: config.token_id,
                token_secret: config.token_secret,
            }),
        })
    }

    fn request(&self, ctx: &Context, method: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/rpc/{method}", self.inner.server_url);
        let mut req = self
            .inner
            .client
            .post(url)
            .header(TOKEN_ID_HEADER, &self.inner.token_id)
            .header(TOKEN_SECRET_HEADER, &self.inner.token_secret);

        for (key, value) in ctx.metadata() {
            req = req.header(key, value);
        }
        if let Some(deadline) = ctx.deadline() {
            req = req.timeout(deadline.saturating_duration_since(tokio::time::Instant::now()));
        }
        req
    }

    async fn call<Req, Resp>(
        &self,
        ctx: &Context,
        method: &str,
        body: &Req,
    ) -> Result<Resp, Status>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        debug!(method, "rpc request");
        let resp = self
            .request(ctx, method)
            .json(body)
            .send()
            .await
            .map_err(|e| status::from_reqwest(method, &e))?;

        let code = resp.status();
        if !code.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(method, status = %code, "rpc failed");
            return Err(status::from_response(method, code, &body));
        }

        resp.json()
            .await
            .map_err(|e| status::from_reqwest(method, &e))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn app_get_or_create(
        &self,
        ctx: &Context,
        request: AppGetOrCreateRequest,
    ) -> Result<AppGetOrCreateResponse, Status> {
        self.call(ctx, "AppGetOrCreate", &request).await
    }

    async fn sandbox_create(
        &self,
        ctx: &Context,
        request: SandboxCreateRequest,
    ) -> Result<SandboxCreateResponse, Status> {
        self.call(ctx, "SandboxCreate", &request).await
    }

    async fn image_from_registry(
        &self,
        ctx: &Context,
        request: ImageFromRegistryRequest,
    ) -> Result<ImageFromRegistryResponse, Status> {
        self.call(ctx, "ImageFromRegistry", &request).await
    }

    async fn secret_get_or_create(
        &self,
        ctx: &Context,
        request: SecretGetOrCreateRequest,
    ) -> Result<SecretGetOrCreateResponse, Status> {
        self.call(ctx, "SecretGetOrCreate", &request).await
    }

    async fn volume_get_or_create(
        &self,
        ctx: &Context,
        request: VolumeGetOrCreateRequest,
    ) -> Result<VolumeGetOrCreateResponse, Status> {
        self.call(ctx, "VolumeGetOrCreate", &request).await
    }

    async fn volume_delete(
        &self,
        ctx: &Context,
        request: VolumeDeleteRequest,
    ) -> Result<VolumeDeleteResponse, Status> {
        self.call(ctx, "VolumeDelete", &request).await
    }
}
