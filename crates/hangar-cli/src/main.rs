use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;

use hangar_config::{Config, ConfigOverrides};
use hangar_driver::DriverHandle;
use hangar_gazer::{GazerError, GazerOptions, UpstreamClient};
use hangar_juggler::JugglerHandle;
use hangar_oracle::{OracleClient, OracleOp, OracleReply};
use hangar_scribe::{Scribe, SecretaryOptions};
use hangar_supervisor::{ControlOptions, StatusOptions, TaskRegistry};
use hangar_transport::push_pull::channel;
use hangar_types::FarmStatus;

/// The hangar build-farm master: ingests upstream package events, plans and
/// dispatches builds to remote builders, ingests their artifacts, and
/// publishes the resulting static index.
#[derive(Parser, Debug)]
#[command(name = "hangar-master", version)]
struct Cli {
    /// Directory containing `hangar.toml` (defaults to the current directory).
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Override `database.dsn`.
    #[arg(long)]
    database_dsn: Option<String>,

    /// Override `output.path`.
    #[arg(long)]
    output_path: Option<PathBuf>,

    /// Override `sockets.builder`.
    #[arg(long)]
    builder_addr: Option<SocketAddr>,

    /// Override `dev_mode`.
    #[arg(long)]
    dev_mode: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            database_dsn: self.database_dsn.clone(),
            output_path: self.output_path.clone(),
            builder_addr: self.builder_addr,
            dev_mode: self.dev_mode.then_some(true),
        }
    }
}

fn install_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("HANGAR_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    install_tracing();
    let cli = Cli::parse();

    let config = hangar_config::load_config(&cli.config_dir)
        .context("failed to load hangar.toml")?
        .apply_env_overrides()
        .context("failed to apply HANGAR_* environment overrides")?
        .merge_overrides(cli.overrides());

    run(config)
}

fn run(config: Config) -> Result<()> {
    let oracle = OracleClient::from_config(&config).context("failed to start oracle connection pool")?;
    check_schema(&oracle)?;

    let upstream =
        UpstreamClient::new(config.upstream.events_url.clone(), config.upstream.catalogue_url.clone())
            .context("failed to build upstream http client")?;

    // ARCH -> DRIVER: the current pending-build snapshot.
    let (queue_push, queue_pull) = channel();
    // JUGGLER -> DRIVER: file verification/rejection outcomes.
    let (file_events_push, file_events_pull) = channel();
    // DRIVER -> JUGGLER: EXPECT_FILE announcements ahead of a transfer.
    let (juggler_expect_push, juggler_expect_pull) = channel();
    // DRIVER -> JUGGLER: ABORT_TRANSFER when a builder's session expires mid-transfer.
    let (juggler_abort_push, juggler_abort_pull) = channel();
    // DRIVER / CHASE / BIG_BRO -> SECRETARY: render requests.
    let (secretary_push, secretary_pull) = channel();
    // BIG_BRO -> SUPERVISOR: the composite status snapshot.
    let (status_push, status_pull) = channel();
    // SUPERVISOR -> GAZER / ARCH / SECRETARY: pause/resume/quit.
    let (gazer_control_push, gazer_control_pull) = channel();
    let (arch_control_push, arch_control_pull) = channel();
    let (secretary_control_push, secretary_control_pull) = channel();

    let driver_handle = hangar_driver::spawn(
        oracle.clone(),
        queue_pull,
        file_events_pull,
        secretary_push.clone(),
        juggler_expect_push,
        juggler_abort_push,
        config.upstream.base_url.clone(),
        config.timeouts.shutdown_grace,
    );

    let juggler_handle = hangar_juggler::spawn(
        hangar_juggler::JugglerOptions::from_config(&config),
        juggler_expect_pull,
        juggler_abort_pull,
        file_events_push,
    );

    let registry = TaskRegistry {
        gazer: gazer_control_push,
        arch: arch_control_push,
        secretary: secretary_control_push,
        driver: driver_handle.clone(),
    };

    spawn_builder_listener(config.sockets.builder, driver_handle.clone());
    spawn_file_listener(config.sockets.file, juggler_handle);

    spawn_gazer(oracle.clone(), upstream, gazer_control_pull, &config, registry.clone());
    spawn_arch(oracle.clone(), queue_push, arch_control_pull, &config);
    spawn_secretary(oracle.clone(), secretary_pull, secretary_control_pull, &config);
    spawn_chase(oracle.clone(), secretary_push.clone(), &config);
    spawn_bigbro(oracle, driver_handle, secretary_push, status_push, &config);

    let status_cache = Arc::new(Mutex::new(FarmStatus::default()));
    spawn_status_cache(status_pull, Arc::clone(&status_cache));
    spawn_status_listener(StatusOptions::from_config(&config), status_cache);

    hangar_supervisor::control::run(ControlOptions::from_config(&config), registry)
        .context("supervisor control listener failed")
}

/// Fail fast if the database's stamped schema version is not one this build
/// speaks: there is no recovering from a stored-procedure signature we do
/// not know about.
fn check_schema(oracle: &OracleClient) -> Result<()> {
    let configuration = match oracle.submit(OracleOp::GetConfiguration)? {
        OracleReply::Config(configuration) => configuration,
        _ => unreachable!("GetConfiguration always returns OracleReply::Config"),
    };
    hangar_schema::check_compatible(&configuration.schema_version)
        .with_context(|| format!("database schema {} is incompatible with this build", configuration.schema_version))?;
    Ok(())
}

fn spawn_builder_listener(addr: SocketAddr, driver: DriverHandle) {
    std::thread::Builder::new()
        .name("hangar-builder-listener".into())
        .spawn(move || {
            let listener = match TcpListener::bind(addr) {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(error = %e, %addr, "failed to bind builder listener");
                    return;
                }
            };
            tracing::info!(%addr, "builder listener bound");
            for incoming in listener.incoming() {
                let stream = match incoming {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept builder connection");
                        continue;
                    }
                };
                let driver = driver.clone();
                std::thread::Builder::new()
                    .name("hangar-builder-conn".into())
                    .spawn(move || {
                        if let Err(e) = hangar_driver::accept_connection(driver, stream) {
                            tracing::warn!(error = %e, "builder connection ended with an error");
                        }
                    })
                    .expect("failed to spawn builder connection thread");
            }
        })
        .expect("failed to spawn builder listener thread");
}

fn spawn_file_listener(addr: SocketAddr, juggler: JugglerHandle) {
    std::thread::Builder::new()
        .name("hangar-file-listener".into())
        .spawn(move || {
            let listener = match TcpListener::bind(addr) {
                Ok(listener) => listener,
                Err(e) => {
                    tracing::error!(error = %e, %addr, "failed to bind file listener");
                    return;
                }
            };
            tracing::info!(%addr, "file listener bound");
            for incoming in listener.incoming() {
                let stream = match incoming {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to accept file connection");
                        continue;
                    }
                };
                let juggler = juggler.clone();
                std::thread::Builder::new()
                    .name("hangar-file-conn".into())
                    .spawn(move || {
                        if let Err(e) = hangar_juggler::accept_connection(juggler, stream) {
                            tracing::warn!(error = %e, "file connection ended with an error");
                        }
                    })
                    .expect("failed to spawn file connection thread");
            }
        })
        .expect("failed to spawn file listener thread");
}

fn spawn_gazer(
    oracle: OracleClient,
    upstream: UpstreamClient,
    control: hangar_transport::push_pull::PullChannel,
    config: &Config,
    registry: TaskRegistry,
) {
    let options = GazerOptions::from_config(config);
    std::thread::Builder::new()
        .name("hangar-gazer".into())
        .spawn(move || {
            let on_fatal = move |err: &GazerError| {
                tracing::error!(error = %err, "gazer hit a fatal error, asking supervisor to shut down");
                if let Err(e) = registry.quit() {
                    tracing::error!(error = %e, "failed to request shutdown after gazer's fatal error");
                }
            };
            hangar_gazer::run(oracle, upstream, control, options, on_fatal);
        })
        .expect("failed to spawn gazer thread");
}

fn spawn_arch(
    oracle: OracleClient,
    driver: hangar_transport::push_pull::PushChannel,
    control: hangar_transport::push_pull::PullChannel,
    config: &Config,
) {
    let options = hangar_arch::ArchOptions::from_config(config);
    std::thread::Builder::new()
        .name("hangar-arch".into())
        .spawn(move || hangar_arch::run(oracle, driver, control, options))
        .expect("failed to spawn arch thread");
}

fn spawn_secretary(
    oracle: OracleClient,
    render_pull: hangar_transport::push_pull::PullChannel,
    control: hangar_transport::push_pull::PullChannel,
    config: &Config,
) {
    let scribe = Scribe::new(oracle.clone(), config.output.path.clone());
    let options = SecretaryOptions::from_config(config);
    std::thread::Builder::new()
        .name("hangar-secretary".into())
        .spawn(move || hangar_scribe::secretary::run(oracle, scribe, render_pull, control, options))
        .expect("failed to spawn secretary thread");
}

fn spawn_chase(oracle: OracleClient, secretary_push: hangar_transport::push_pull::PushChannel, config: &Config) {
    let options = hangar_chase::ChaseOptions::from_config(config);
    std::thread::Builder::new()
        .name("hangar-chase".into())
        .spawn(move || {
            if let Err(e) = hangar_chase::run(options, oracle, secretary_push) {
                tracing::error!(error = %e, "chase admin listener failed");
            }
        })
        .expect("failed to spawn chase thread");
}

fn spawn_bigbro(
    oracle: OracleClient,
    driver: DriverHandle,
    secretary_push: hangar_transport::push_pull::PushChannel,
    status_push: hangar_transport::push_pull::PushChannel,
    config: &Config,
) {
    let options = hangar_bigbro::BigBroOptions::from_config(config);
    std::thread::Builder::new()
        .name("hangar-bigbro".into())
        .spawn(move || hangar_bigbro::run(oracle, driver, secretary_push, status_push, options))
        .expect("failed to spawn bigbro thread");
}

fn spawn_status_cache(status_pull: hangar_transport::push_pull::PullChannel, cache: Arc<Mutex<FarmStatus>>) {
    std::thread::Builder::new()
        .name("hangar-status-cache".into())
        .spawn(move || hangar_supervisor::status::drain_into_cache(status_pull, cache))
        .expect("failed to spawn status cache thread");
}

fn spawn_status_listener(options: StatusOptions, cache: Arc<Mutex<FarmStatus>>) {
    std::thread::Builder::new()
        .name("hangar-status-listener".into())
        .spawn(move || {
            if let Err(e) = hangar_supervisor::status::run(options, cache) {
                tracing::error!(error = %e, "supervisor status listener failed");
            }
        })
        .expect("failed to spawn status listener thread");
}
