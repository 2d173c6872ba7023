use clap::Parser;
use dataproduct_schema::{parse_settings_file, ServiceSettings};
use dataproduct_server::{ServerError, TenantRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "dataproduct-server",
    about = "Serves permission-filtered dataproduct and weblayer trees"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 5022)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Service settings file (TOML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with one configuration subdirectory per tenant. Overrides
    /// the settings file.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Number of request worker threads.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Seconds between checks for changed tenant configuration; 0 disables.
    #[arg(long, default_value_t = 30)]
    reload_interval: u64,
}

fn run(cli: Cli) -> Result<(), ServerError> {
    let mut settings = match &cli.config {
        Some(path) => parse_settings_file(path)?,
        None => ServiceSettings::default(),
    };
    if let Some(dir) = cli.config_dir {
        settings.config_dir = dir;
    }

    let addr = format!("{}:{}", cli.bind, cli.port);
    info!("starting dataproduct-server on {addr}");
    info!(
        "config directory: {} (default tenant '{}')",
        settings.config_dir.display(),
        settings.default_tenant
    );

    let registry = Arc::new(TenantRegistry::new(settings));
    let reload_interval =
        (cli.reload_interval > 0).then(|| Duration::from_secs(cli.reload_interval));
    dataproduct_server::run_server(&registry, &addr, cli.workers, reload_interval)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
