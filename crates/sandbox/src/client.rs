use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::compile::compile_sandbox;
use crate::config::{
    CLIENT_TYPE, CLIENT_TYPE_KEY, CLIENT_VERSION_KEY, ClientSettings, DeleteOptions,
    EphemeralOptions, ImageFromRegistryOptions, LookupOptions, SandboxOptions,
};
use crate::context::Context;
use crate::error::{Code, Result, SandboxError, Status};
use crate::proto::{
    AppGetOrCreateRequest, ImageFromRegistryRequest, ObjectCreationType, SandboxCreateRequest,
    SecretGetOrCreateRequest, VolumeDeleteRequest, VolumeGetOrCreateRequest,
};
use crate::registry::RegistryAuth;
use crate::transport::Transport;
use crate::types::{App, Image, Sandbox, Secret, Volume};

/// Entry point for resolving apps and creating remote objects.
///
/// Wraps an explicit [`Transport`] so tests and multiple configurations can
/// coexist. Clone is a cheap Arc refcount bump.
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    settings: ClientSettings,
}

impl Client {
    pub fn new(transport: Arc<dyn Transport>, settings: ClientSettings) -> Self {
        Self {
            transport,
            settings,
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Derive the caller's context with client-session metadata attached.
    pub fn session_context(&self, ctx: &Context) -> Context {
        ctx.with_metadata(CLIENT_TYPE_KEY, CLIENT_TYPE)
            .with_metadata(CLIENT_VERSION_KEY, self.settings.client_version.as_str())
    }

    /// Look up an app by name, or create an empty one when
    /// `options.create_if_missing` is set.
    ///
    /// A missing app without `create_if_missing` yields
    /// [`SandboxError::NotFound`]. Every other transport failure is returned
    /// unchanged.
    pub async fn app_lookup(
        &self,
        ctx: &Context,
        name: &str,
        options: &LookupOptions,
    ) -> Result<App> {
        let ctx = self.session_context(ctx);
        let request = AppGetOrCreateRequest {
            app_name: name.to_string(),
            environment_name: self.settings.environment_name(&options.environment),
            object_creation_type: creation_type(options),
        };
        let resp = ctx
            .run(self.transport.app_get_or_create(&ctx, request))
            .await
            .map_err(|status| translate_not_found(status, || format!("app '{name}' not found")))?;

        info!(app = name, app_id = %resp.app_id, "app resolved");
        Ok(App::new(resp.app_id, ctx))
    }

    /// Create a sandbox in `app` running `image`.
    pub async fn create_sandbox(
        &self,
        app: &App,
        image: &Image,
        options: &SandboxOptions,
    ) -> Result<Sandbox> {
        let definition = compile_sandbox(image, options)?;
        debug!(app_id = app.app_id(), definition = ?definition, "compiled sandbox definition");

        let ctx = app.context();
        let request = SandboxCreateRequest {
            app_id: app.app_id().to_string(),
            definition,
        };
        let resp = ctx.run(self.transport.sandbox_create(ctx, request)).await?;

        info!(app_id = app.app_id(), sandbox_id = %resp.sandbox_id, "sandbox created");
        Ok(Sandbox::new(resp.sandbox_id, ctx.clone()))
    }

    /// Create an image from a registry tag, using static credentials when
    /// `options.secret` is set.
    pub async fn image_from_registry(
        &self,
        app: &App,
        tag: &str,
        options: &ImageFromRegistryOptions,
    ) -> Result<Image> {
        self.image_with_auth(app, tag, RegistryAuth::from_options(options))
            .await
    }

    /// Create an image from an AWS ECR tag.
    pub async fn image_from_aws_ecr(&self, app: &App, tag: &str, secret: &Secret) -> Result<Image> {
        self.image_with_auth(app, tag, RegistryAuth::Aws(secret)).await
    }

    /// Create an image from a GCP Artifact Registry tag.
    pub async fn image_from_gcp_artifact_registry(
        &self,
        app: &App,
        tag: &str,
        secret: &Secret,
    ) -> Result<Image> {
        self.image_with_auth(app, tag, RegistryAuth::Gcp(secret)).await
    }

    async fn image_with_auth(&self, app: &App, tag: &str, auth: RegistryAuth<'_>) -> Result<Image> {
        let ctx = app.context();
        let request = ImageFromRegistryRequest {
            app_id: app.app_id().to_string(),
            tag: tag.to_string(),
            image_registry_config: auth.registry_config(),
        };
        let resp = ctx
            .run(self.transport.image_from_registry(ctx, request))
            .await?;

        info!(app_id = app.app_id(), tag, image_id = %resp.image_id, "image resolved");
        Ok(Image::new(resp.image_id))
    }

    /// Look up a named secret, or create an empty one when
    /// `options.create_if_missing` is set.
    pub async fn secret_from_name(
        &self,
        ctx: &Context,
        name: &str,
        options: &LookupOptions,
    ) -> Result<Secret> {
        let ctx = self.session_context(ctx);
        let request = SecretGetOrCreateRequest {
            deployment_name: name.to_string(),
            environment_name: self.settings.environment_name(&options.environment),
            object_creation_type: creation_type(options),
            env_dict: BTreeMap::new(),
        };
        let resp = ctx
            .run(self.transport.secret_get_or_create(&ctx, request))
            .await
            .map_err(|status| {
                translate_not_found(status, || format!("secret '{name}' not found"))
            })?;

        debug!(secret = name, secret_id = %resp.secret_id, "secret resolved");
        Ok(Secret::new(resp.secret_id))
    }

    /// Create a nameless secret holding `entries`.
    pub async fn secret_from_map(
        &self,
        ctx: &Context,
        entries: BTreeMap<String, String>,
        options: &EphemeralOptions,
    ) -> Result<Secret> {
        let ctx = self.session_context(ctx);
        let request = SecretGetOrCreateRequest {
            deployment_name: String::new(),
            environment_name: self.settings.environment_name(&options.environment),
            object_creation_type: ObjectCreationType::Ephemeral,
            env_dict: entries,
        };
        let resp = ctx
            .run(self.transport.secret_get_or_create(&ctx, request))
            .await?;

        debug!(secret_id = %resp.secret_id, "ephemeral secret created");
        Ok(Secret::new(resp.secret_id))
    }

    /// Look up a named volume, or create an empty one when
    /// `options.create_if_missing` is set.
    pub async fn volume_from_name(
        &self,
        ctx: &Context,
        name: &str,
        options: &LookupOptions,
    ) -> Result<Volume> {
        let ctx = self.session_context(ctx);
        let request = VolumeGetOrCreateRequest {
            deployment_name: name.to_string(),
            environment_name: self.settings.environment_name(&options.environment),
            object_creation_type: creation_type(options),
        };
        let resp = ctx
            .run(self.transport.volume_get_or_create(&ctx, request))
            .await
            .map_err(|status| {
                translate_not_found(status, || format!("volume '{name}' not found"))
            })?;

        debug!(volume = name, volume_id = %resp.volume_id, "volume resolved");
        Ok(Volume::new(resp.volume_id))
    }

    pub async fn volume_delete(
        &self,
        ctx: &Context,
        name: &str,
        options: &DeleteOptions,
    ) -> Result<()> {
        let ctx = self.session_context(ctx);
        let request = VolumeDeleteRequest {
            deployment_name: name.to_string(),
            environment_name: self.settings.environment_name(&options.environment),
        };
        ctx.run(self.transport.volume_delete(&ctx, request))
            .await
            .map_err(|status| {
                translate_not_found(status, || format!("volume '{name}' not found"))
            })?;

        info!(volume = name, "volume deleted");
        Ok(())
    }
}

fn creation_type(options: &LookupOptions) -> ObjectCreationType {
    if options.create_if_missing {
        ObjectCreationType::CreateIfMissing
    } else {
        ObjectCreationType::Unspecified
    }
}

/// Turn a transport `NotFound` into the domain error; leave every other
/// status untouched.
fn translate_not_found(status: Status, message: impl FnOnce() -> String) -> SandboxError {
    if status.code == Code::NotFound {
        SandboxError::NotFound(message())
    } else {
        SandboxError::Transport(status)
    }
}
