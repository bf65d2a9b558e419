//! ---
//! rw_section: "01-core-functionality"
//! rw_subsection: "binary"
//! rw_type: "source"
//! rw_scope: "code"
//! rw_description: "Binary entrypoint for the RailWatch daemon."
//! rw_version: "v0.1.0"
//! rw_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use railwatch_common::config::AppConfig;
use railwatch_common::logging::{init_tracing, LogFormat};
use railwatch_hub::{ConnectionHub, HubConfig, HubMetrics};
use railwatch_metrics::{new_registry, spawn_http_server, DaemonMetrics, SharedRegistry};
use railwatch_net::ServerBuilder;
use railwatch_sim::{GeneratorProfile, StreamMetrics, TelemetryGenerator, TelemetryStream};
use tokio::signal;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "configs/railwatch.toml";

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "RailWatch daemon: synthetic track-inspection telemetry over websockets",
    long_about = None
)]
struct Cli {
    #[arg(long, value_name = "FILE", help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "ADDR", help = "Override the websocket listen address")]
    listen: Option<SocketAddr>,

    #[arg(long, help = "Seed the generator for a reproducible stream")]
    seed: Option<u64>,

    #[arg(long, value_name = "FORMAT", help = "Log format: structured-json or pretty")]
    log_format: Option<LogFormat>,

    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print version information and exit"
    )]
    version: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Serve websocket clients and stream telemetry")]
    Run,
    #[command(about = "Print the effective configuration as TOML and exit")]
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.version {
        println!("railwatchd {} ({})", env!("CARGO_PKG_VERSION"), build_profile());
        return Ok(());
    }

    let load_started = Instant::now();
    let loaded = AppConfig::load_with_source(cli.config.as_deref(), &[DEFAULT_CONFIG_PATH])?;
    let mut config = loaded.config;
    if let Some(listen) = cli.listen {
        config.server.listen = listen;
    }
    if let Some(seed) = cli.seed {
        config.stream.seed = Some(seed);
    }
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    config.validate()?;
    let load_duration = load_started.elapsed();

    if let Some(Commands::PrintConfig) = cli.command {
        let rendered =
            toml::to_string_pretty(&config).context("failed to render configuration")?;
        println!("{rendered}");
        return Ok(());
    }

    init_tracing("railwatchd", &config.logging)?;
    match &loaded.source {
        Some(path) => info!(config_path = %path.display(), "configuration loaded"),
        None => info!("no configuration file found; running with defaults"),
    }

    let registry = new_registry();
    let daemon_metrics = DaemonMetrics::new(registry.clone())?;
    daemon_metrics.observe_config_load(load_duration.as_secs_f64());
    daemon_metrics.inc_start();
    daemon_metrics.set_build_info(env!("CARGO_PKG_VERSION"), build_profile());

    run_daemon(config, registry).await
}

async fn run_daemon(config: AppConfig, registry: SharedRegistry) -> Result<()> {
    let metrics_server = if config.metrics.enabled {
        let server = spawn_http_server(registry.clone(), config.metrics.listen)?;
        info!(address = %server.addr(), "metrics exporter enabled");
        Some(server)
    } else {
        info!("metrics exporter disabled by configuration");
        None
    };

    let hub = ConnectionHub::with_metrics(
        HubConfig {
            send_timeout: config.server.send_timeout,
        },
        HubMetrics::new(registry.clone()).context("failed to register hub metrics")?,
    );

    let server = ServerBuilder::new(config.server.clone(), hub.clone())
        .spawn()
        .await
        .context("failed to start websocket server")?;

    let profile =
        GeneratorProfile::default().with_defect_probability(config.stream.defect_probability);
    let generator = TelemetryGenerator::with_optional_seed(profile, config.stream.seed)?;
    let stream_metrics =
        StreamMetrics::new(registry.clone()).context("failed to register stream metrics")?;
    let stream = TelemetryStream::new(hub.clone(), generator, config.stream.tick_interval)
        .with_metrics(stream_metrics)
        .spawn();

    info!(
        address = %server.local_addr(),
        tick_ms = config.stream.tick_interval.as_millis() as u64,
        seeded = config.stream.seed.is_some(),
        "daemon running; waiting for termination signal"
    );
    signal::ctrl_c().await?;
    info!("ctrl-c received; shutting down");

    let ticks = stream.shutdown().await?;
    info!(ticks, members = hub.len(), "telemetry stream drained");
    server.shutdown().await?;
    if let Some(server) = metrics_server {
        server.shutdown().await?;
    }
    Ok(())
}

fn build_profile() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}
