use async_trait::async_trait;

use crate::context::Context;
use crate::error::Status;
use crate::proto::{
    AppGetOrCreateRequest, AppGetOrCreateResponse, ImageFromRegistryRequest,
    ImageFromRegistryResponse, SandboxCreateRequest, SandboxCreateResponse,
    SecretGetOrCreateRequest, SecretGetOrCreateResponse, VolumeDeleteRequest,
    VolumeDeleteResponse, VolumeGetOrCreateRequest, VolumeGetOrCreateResponse,
};

/// RPC surface of the control plane.
///
/// Implementations own connection handling, authentication and any retry
/// policy. Every failure is reported as a [`Status`]; the client translates
/// `NotFound` for named lookups and passes everything else through.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Look up an app by name, creating it when the request asks for it.
    /// Fails with `NotFound` when the app is absent and creation was not
    /// requested.
    async fn app_get_or_create(
        &self,
        ctx: &Context,
        request: AppGetOrCreateRequest,
    ) -> Result<AppGetOrCreateResponse, Status>;

    async fn sandbox_create(
        &self,
        ctx: &Context,
        request: SandboxCreateRequest,
    ) -> Result<SandboxCreateResponse, Status>;

    /// Resolve a registry tag into an image, authenticating with the
    /// attached registry config when present.
    async fn image_from_registry(
        &self,
        ctx: &Context,
        request: ImageFromRegistryRequest,
    ) -> Result<ImageFromRegistryResponse, Status>;

    async fn secret_get_or_create(
        &self,
        ctx: &Context,
        request: SecretGetOrCreateRequest,
    ) -> Result<SecretGetOrCreateResponse, Status>;

    async fn volume_get_or_create(
        &self,
        ctx: &Context,
        request: VolumeGetOrCreateRequest,
    ) -> Result<VolumeGetOrCreateResponse, Status>;

    async fn volume_delete(
        &self,
        ctx: &Context,
        request: VolumeDeleteRequest,
    ) -> Result<VolumeDeleteResponse, Status>;
}
