use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use sandbox::{
    App, Client, Context, Image, ImageFromRegistryOptions, LookupOptions, SandboxOptions, Secret,
};
use sandbox_http::HttpTransport;
use tracing::info;

use crate::config::{self, ConnectionArgs};
use crate::error::{CliError, CliResult};

#[derive(Subcommand)]
pub enum AppCommand {
    /// Resolve an app by name and print its id
    Lookup(AppLookupArgs),
}

#[derive(Args)]
pub struct AppLookupArgs {
    pub name: String,
    /// Environment to look in (defaults to the connection environment)
    #[arg(long = "env")]
    pub env: Option<String>,
    /// Create the app when it does not exist
    #[arg(long)]
    pub create_if_missing: bool,
}

impl AppLookupArgs {
    fn options(&self) -> LookupOptions {
        LookupOptions {
            environment: self.env.clone().unwrap_or_default(),
            create_if_missing: self.create_if_missing,
        }
    }
}

#[derive(Subcommand)]
pub enum SandboxCommand {
    /// Create a sandbox and print its id
    Create(Box<SandboxCreateArgs>),
}

#[derive(Args)]
#[command(group = clap::ArgGroup::new("registry_auth").multiple(false))]
pub struct SandboxCreateArgs {
    /// App owning the sandbox (created when missing)
    #[arg(long)]
    pub app: String,
    /// Registry tag of the container image
    #[arg(long)]
    pub image: String,
    /// Static registry credentials, by secret name
    #[arg(long, group = "registry_auth")]
    pub registry_secret: Option<String>,
    /// AWS ECR credentials, by secret name
    #[arg(long, group = "registry_auth")]
    pub aws_secret: Option<String>,
    /// GCP Artifact Registry credentials, by secret name
    #[arg(long, group = "registry_auth")]
    pub gcp_secret: Option<String>,
    /// CPU request in physical cores
    #[arg(long, default_value_t = 0.0)]
    pub cpu: f64,
    /// Memory request in MiB
    #[arg(long, default_value_t = 0)]
    pub memory: u32,
    /// Maximum sandbox lifetime in seconds
    #[arg(long)]
    pub timeout: Option<f64>,
    /// Port exposed through a TLS tunnel
    #[arg(long = "port")]
    pub encrypted_ports: Vec<u16>,
    /// Port exposed through an HTTP/2 TLS tunnel
    #[arg(long = "h2-port")]
    pub h2_ports: Vec<u16>,
    /// Port exposed without encryption
    #[arg(long = "unencrypted-port")]
    pub unencrypted_ports: Vec<u16>,
    /// Volume mount as MOUNT_PATH=VOLUME_NAME
    #[arg(long = "volume", value_parser = parse_volume)]
    pub volumes: Vec<(String, String)>,
    /// Command to run in the sandbox
    #[arg(last = true)]
    pub command: Vec<String>,
}

fn parse_volume(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((path, name)) if !path.is_empty() && !name.is_empty() => {
            Ok((path.to_string(), name.to_string()))
        }
        _ => Err(format!("expected MOUNT_PATH=VOLUME_NAME, got '{s}'")),
    }
}

fn timeout(secs: Option<f64>) -> CliResult<Option<Duration>> {
    secs.map(|s| {
        Duration::try_from_secs_f64(s)
            .map_err(|e| CliError::InvalidArgument(format!("timeout {s}: {e}")))
    })
    .transpose()
}

async fn connect(args: &ConnectionArgs) -> CliResult<Client> {
    let resolved = config::resolve(args).await?;
    let transport = HttpTransport::new(resolved.http)?;
    Ok(Client::new(Arc::new(transport), resolved.settings))
}

pub async fn run_app(conn: &ConnectionArgs, command: AppCommand) -> CliResult<()> {
    let client = connect(conn).await?;
    match command {
        AppCommand::Lookup(args) => {
            let app = client
                .app_lookup(&Context::background(), &args.name, &args.options())
                .await?;
            println!("{}", app.app_id());
        }
    }
    Ok(())
}

pub async fn run_sandbox(conn: &ConnectionArgs, command: SandboxCommand) -> CliResult<()> {
    let client = connect(conn).await?;
    match command {
        SandboxCommand::Create(args) => {
            let sandbox_id = create_sandbox(&client, *args).await?;
            println!("{sandbox_id}");
        }
    }
    Ok(())
}

async fn create_sandbox(client: &Client, args: SandboxCreateArgs) -> CliResult<String> {
    let ctx = Context::background();
    let existing = LookupOptions::default();
    let app = client
        .app_lookup(
            &ctx,
            &args.app,
            &LookupOptions {
                create_if_missing: true,
                ..LookupOptions::default()
            },
        )
        .await?;

    let image = resolve_image(client, &ctx, &app, &args).await?;

    let mut options = SandboxOptions {
        cpu: args.cpu,
        memory: args.memory,
        timeout: timeout(args.timeout)?,
        command: args.command,
        encrypted_ports: args.encrypted_ports,
        h2_ports: args.h2_ports,
        unencrypted_ports: args.unencrypted_ports,
        ..SandboxOptions::default()
    };
    for (mount_path, name) in &args.volumes {
        let volume = client.volume_from_name(&ctx, name, &existing).await?;
        options = options.mount(mount_path.as_str(), volume);
    }

    let sandbox = client.create_sandbox(&app, &image, &options).await?;
    info!(app = %args.app, sandbox_id = sandbox.sandbox_id(), "sandbox ready");
    Ok(sandbox.sandbox_id().to_string())
}

async fn resolve_image(
    client: &Client,
    ctx: &Context,
    app: &App,
    args: &SandboxCreateArgs,
) -> CliResult<Image> {
    let lookup = |name: &str| {
        let name = name.to_string();
        async move {
            client
                .secret_from_name(ctx, &name, &LookupOptions::default())
                .await
        }
    };

    let image = if let Some(name) = &args.aws_secret {
        let secret: Secret = lookup(name).await?;
        client.image_from_aws_ecr(app, &args.image, &secret).await?
    } else if let Some(name) = &args.gcp_secret {
        let secret = lookup(name).await?;
        client
            .image_from_gcp_artifact_registry(app, &args.image, &secret)
            .await?
    } else {
        let secret = match &args.registry_secret {
            Some(name) => Some(lookup(name).await?),
            None => None,
        };
        client
            .image_from_registry(app, &args.image, &ImageFromRegistryOptions { secret })
            .await?
    };
    Ok(image)
}
