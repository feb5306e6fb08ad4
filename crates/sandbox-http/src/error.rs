#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("invalid server url: {0}")]
    InvalidUrl(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

pub type HttpResult<T> = Result<T, HttpError>;
