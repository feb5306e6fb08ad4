use crate::context::Context;

/// A named remote namespace that owns sandboxes and images.
///
/// Obtained from [`Client::app_lookup`](crate::Client::app_lookup). The
/// context captured at resolution time is reused by every call made through
/// this app.
#[derive(Debug, Clone)]
pub struct App {
    app_id: String,
    ctx: Context,
}

impl App {
    pub(crate) fn new(app_id: String, ctx: Context) -> Self {
        Self { app_id, ctx }
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

/// Handle to a sandbox accepted by the control plane. Holds no sandbox state.
#[derive(Debug, Clone)]
pub struct Sandbox {
    sandbox_id: String,
    ctx: Context,
}

impl Sandbox {
    pub(crate) fn new(sandbox_id: String, ctx: Context) -> Self {
        Self { sandbox_id, ctx }
    }

    pub fn sandbox_id(&self) -> &str {
        &self.sandbox_id
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    image_id: String,
}

impl Image {
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
        }
    }

    pub fn image_id(&self) -> &str {
        &self.image_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    volume_id: String,
}

impl Volume {
    pub fn new(volume_id: impl Into<String>) -> Self {
        Self {
            volume_id: volume_id.into(),
        }
    }

    pub fn volume_id(&self) -> &str {
        &self.volume_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Secret {
    secret_id: String,
}

impl Secret {
    pub fn new(secret_id: impl Into<String>) -> Self {
        Self {
            secret_id: secret_id.into(),
        }
    }

    pub fn secret_id(&self) -> &str {
        &self.secret_id
    }
}
