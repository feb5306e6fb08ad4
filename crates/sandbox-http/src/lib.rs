//! HTTP/JSON [`Transport`](sandbox::Transport) for the sandbox provisioning
//! client.
//!
//! RPC failures are mapped onto [`sandbox::Status`] codes from the HTTP
//! status (404 becomes `NotFound`, 403 `PermissionDenied`, and so on) so the
//! client can classify them.

mod error;
mod http;
mod status;

pub use error::{HttpError, HttpResult};
pub use http::{DEFAULT_TIMEOUT, HttpConfig, HttpTransport, TOKEN_ID_HEADER, TOKEN_SECRET_HEADER};
