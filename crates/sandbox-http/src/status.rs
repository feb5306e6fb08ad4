use reqwest::StatusCode;
use sandbox::{Code, Status};
use serde::Deserialize;

/// Error payload returned by the control plane on non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

pub(crate) fn code_for(status: StatusCode) -> Code {
    match status {
        StatusCode::BAD_REQUEST => Code::InvalidArgument,
        StatusCode::UNAUTHORIZED => Code::Unauthenticated,
        StatusCode::FORBIDDEN => Code::PermissionDenied,
        StatusCode::NOT_FOUND => Code::NotFound,
        StatusCode::CONFLICT => Code::AlreadyExists,
        StatusCode::PRECONDITION_FAILED => Code::FailedPrecondition,
        StatusCode::TOO_MANY_REQUESTS => Code::ResourceExhausted,
        StatusCode::NOT_IMPLEMENTED => Code::Unimplemented,
        StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => Code::Unavailable,
        StatusCode::GATEWAY_TIMEOUT | StatusCode::REQUEST_TIMEOUT => Code::DeadlineExceeded,
        s if s.is_server_error() => Code::Internal,
        _ => Code::Unknown,
    }
}

/// Build a [`Status`] from a failed response. Uses the JSON `message` field
/// when present, otherwise the raw body.
pub(crate) fn from_response(method: &str, status: StatusCode, body: &str) -> Status {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.trim().to_string());
    let message = if message.is_empty() {
        format!("{method} {status}")
    } else {
        format!("{method}: {message}")
    };
    Status::new(code_for(status), message)
}

pub(crate) fn from_reqwest(method: &str, err: &reqwest::Error) -> Status {
    let code = if err.is_timeout() {
        Code::DeadlineExceeded
    } else if err.is_connect() {
        Code::Unavailable
    } else if err.is_decode() {
        Code::Internal
    } else {
        Code::Unknown
    };
    Status::new(code, format!("{method}: {err}"))
}
