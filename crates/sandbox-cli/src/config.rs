use std::path::{Path, PathBuf};
use std::time::Duration;

use sandbox::ClientSettings;
use sandbox_http::{DEFAULT_TIMEOUT, HttpConfig};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

/// Connection profile stored as YAML.
///
/// ```yaml
/// server_url: https://api.example.com
/// token_id: ak-...
/// token_secret: as-...
/// environment: main
/// timeout_secs: 30
/// ```
#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Profile {
    pub server_url: Option<String>,
    pub token_id: Option<String>,
    pub token_secret: Option<String>,
    pub environment: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Values given on the command line or through `SANDBOX_*` variables. They
/// take precedence over the profile file.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct ConnectionArgs {
    /// Path to a YAML connection profile
    #[arg(long, global = true, env = "SANDBOX_CONFIG")]
    pub config: Option<PathBuf>,
    /// Control plane base URL
    #[arg(long, global = true, env = "SANDBOX_SERVER_URL")]
    pub server_url: Option<String>,
    #[arg(long, global = true, env = "SANDBOX_TOKEN_ID")]
    pub token_id: Option<String>,
    #[arg(long, global = true, env = "SANDBOX_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: Option<String>,
    /// Environment used for lookups
    #[arg(long, global = true, env = "SANDBOX_ENVIRONMENT")]
    pub environment: Option<String>,
}

#[derive(Debug)]
pub struct Resolved {
    pub http: HttpConfig,
    pub settings: ClientSettings,
}

pub async fn load(path: &Path) -> CliResult<Profile> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CliError::Config(format!("read {}: {e}", path.display())))?;
    serde_yaml_ng::from_str(&content)
        .map_err(|e| CliError::Config(format!("parse {}: {e}", path.display())))
}

/// Merge the profile (if any) with command-line values.
pub async fn resolve(args: &ConnectionArgs) -> CliResult<Resolved> {
    let profile = match &args.config {
        Some(path) => load(path).await?,
        None => Profile::default(),
    };
    merge(profile, args)
}

fn merge(profile: Profile, args: &ConnectionArgs) -> CliResult<Resolved> {
    let pick = |arg: &Option<String>, file: Option<String>, name: &str| {
        arg.clone()
            .or(file)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| CliError::Config(format!("{name} is not set")))
    };
    let server_url = pick(&args.server_url, profile.server_url, "server_url")?;
    let token_id = pick(&args.token_id, profile.token_id, "token_id")?;
    let token_secret = pick(&args.token_secret, profile.token_secret, "token_secret")?;

    let mut http = HttpConfig::new(server_url, token_id, token_secret);
    http.timeout = profile
        .timeout_secs
        .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

    let mut settings = ClientSettings::default();
    if let Some(env) = args.environment.clone().or(profile.environment) {
        settings.default_environment = env;
    }

    Ok(Resolved { http, settings })
}
