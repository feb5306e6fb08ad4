#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Sandbox(#[from] sandbox::SandboxError),

    #[error("transport error: {0}")]
    Http(#[from] sandbox_http::HttpError),
}

pub type CliResult<T> = Result<T, CliError>;
