//! Binary entry point for the Skyhook CLI.

use std::io::{self, Write};
use std::process;
use std::time::Duration;

use camino::Utf8Path;
use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use skyhook::{
    AttemptReport, AvailabilityMonitor, CapacityProber, ConfigStore, ConfigStoreError,
    ConfigWriter, CreateRequest, DeployError, DeployOrchestrator, DeployPlan, Deployment, GpuKind,
    Instance, InstanceAction, InstanceId, LifecycleController, LifecycleError, Location,
    MonitorError, MonitorOutcome, MonitorPlan, ParseGpuKindError, ProviderError, VerdaClient,
    VerdaConfig,
};

mod cli;

use cli::{Cli, DeleteCommand, DeployCommand, InstanceArg, SetScriptCommand, ShapeArgs,
    WatchCommand};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("refusing to delete {0}: pass --yes to confirm")]
    DeleteNotConfirmed(String),
    #[error("invalid --gpu-type value: {0}")]
    GpuType(#[from] ParseGpuKindError),
    #[error("monitoring failed: {0}")]
    Monitor(#[from] MonitorError),
    #[error("lifecycle operation failed: {0}")]
    Lifecycle(#[from] LifecycleError),
    #[error("deployment failed: {0}")]
    Deploy(#[from] DeployError),
    #[error("provider request failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("configuration update failed: {0}")]
    ConfigStore(#[from] ConfigStoreError),
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let exit_code = match dispatch(cli).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .ok();
}

async fn dispatch(cli: Cli) -> Result<i32, CliError> {
    match cli {
        Cli::Check(args) => check(args).await,
        Cli::Watch(command) => watch(command).await,
        Cli::Deploy(command) => deploy(command).await,
        Cli::List => list().await,
        Cli::Status(arg) => status(arg).await,
        Cli::Start(arg) => act(arg, InstanceAction::Boot).await,
        Cli::Stop(arg) => act(arg, InstanceAction::Shutdown).await,
        Cli::Delete(command) => delete(command).await,
        Cli::SetScript(command) => set_script(&command),
        Cli::ShowConfig => show_config(),
    }
}

fn load_config() -> Result<VerdaConfig, CliError> {
    let config =
        VerdaConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    config
        .validate()
        .map_err(|err| CliError::Config(err.to_string()))?;
    Ok(config)
}

fn shape_from(config: &VerdaConfig, args: &ShapeArgs) -> Result<skyhook::ResourceShape, CliError> {
    let kind: Option<GpuKind> = args.gpu_type.as_deref().map(str::parse).transpose()?;
    config
        .shape_with(kind, args.gpu_count)
        .map_err(|err| CliError::Config(err.to_string()))
}

fn pinned_location(args: &ShapeArgs) -> Option<Location> {
    args.location.as_deref().map(Location::from)
}

fn merge_volume_ids(explicit: Vec<String>, config: &VerdaConfig) -> Vec<String> {
    if explicit.is_empty() {
        config.default_volume_id.clone().into_iter().collect()
    } else {
        explicit
    }
}

async fn check(args: ShapeArgs) -> Result<i32, CliError> {
    let config = load_config()?;
    let shape = shape_from(&config, &args)?;
    let Some(sku) = shape.sku() else {
        return Err(CliError::Monitor(MonitorError::UnknownResourceShape {
            shape,
        }));
    };

    let locations = config.locations_for(pinned_location(&args));
    let prober = CapacityProber::new(VerdaClient::from_config(&config));
    let outcome = prober.probe_any(shape, &sku, &locations).await;

    let mut stdout = io::stdout();
    match outcome.location {
        Some(location) => {
            writeln!(stdout, "{shape} ({sku}) has spot capacity at {location}").ok();
            Ok(0)
        }
        None => {
            writeln!(
                stdout,
                "{shape} ({sku}) has no spot capacity in {} location(s)",
                locations.len()
            )
            .ok();
            Ok(1)
        }
    }
}

async fn watch(command: WatchCommand) -> Result<i32, CliError> {
    let config = load_config()?;
    let shape = shape_from(&config, &command.shape)?;
    let plan = MonitorPlan {
        shape,
        interval: command
            .interval_secs
            .map_or_else(|| config.check_interval(), Duration::from_secs),
        max_attempts: command.max_checks.unwrap_or(config.max_checks),
        locations: config.locations_for(pinned_location(&command.shape)),
    };

    if command.deploy {
        let deploy_plan = DeployPlan {
            monitor: plan,
            create: CreateRequest {
                shape,
                image: config.default_image.clone(),
                hostname: None,
                volume_ids: merge_volume_ids(command.volume_id, &config),
                script_id: command
                    .script_id
                    .or_else(|| config.default_script_id.clone()),
            },
            wait_ready: true,
            ready_timeout: config.ready_timeout(),
            poll_interval: config.poll_interval(),
        };
        let orchestrator = DeployOrchestrator::new(
            VerdaClient::from_config(&config),
            config.hostname_prefix.clone(),
        );
        let deployment = orchestrator.deploy(&deploy_plan, print_attempt).await?;
        print_deployment(&deployment);
        return Ok(0);
    }

    let monitor = AvailabilityMonitor::new(VerdaClient::from_config(&config));
    match monitor.watch(&plan, print_attempt).await? {
        MonitorOutcome::Found {
            attempt, location, ..
        } => {
            writeln!(
                io::stdout(),
                "spot capacity found at {location} on check {attempt}"
            )
            .ok();
            Ok(0)
        }
        MonitorOutcome::Exhausted { attempts } => {
            writeln!(io::stdout(), "no spot capacity after {attempts} checks").ok();
            Ok(1)
        }
    }
}

async fn deploy(command: DeployCommand) -> Result<i32, CliError> {
    let config = load_config()?;
    let shape = shape_from(&config, &command.shape)?;
    let location = command
        .shape
        .location
        .as_deref()
        .map_or_else(|| config.location(), Location::from);
    let request = CreateRequest {
        shape,
        image: command
            .image
            .unwrap_or_else(|| config.default_image.clone()),
        hostname: command.hostname,
        volume_ids: merge_volume_ids(command.volume_id, &config),
        script_id: command
            .script_id
            .or_else(|| config.default_script_id.clone()),
    };

    let controller = LifecycleController::new(
        VerdaClient::from_config(&config),
        config.hostname_prefix.clone(),
    );
    let created = controller.create(&request, &location).await?;
    writeln!(
        io::stdout(),
        "created {} ({}) at {location}",
        created.id,
        created.hostname
    )
    .ok();

    if command.no_wait {
        return Ok(0);
    }

    let ready = controller
        .await_ready(&created.id, config.ready_timeout(), config.poll_interval())
        .await?;
    writeln!(io::stdout(), "{}", render_instance(&ready)).ok();
    Ok(0)
}

async fn list() -> Result<i32, CliError> {
    let config = load_config()?;
    let controller = controller_from(&config);
    let instances = controller.list(None).await?;

    let mut stdout = io::stdout();
    if instances.is_empty() {
        writeln!(stdout, "no instances").ok();
        return Ok(0);
    }
    for instance in &instances {
        writeln!(stdout, "{}", render_instance(instance)).ok();
    }
    Ok(0)
}

async fn status(arg: InstanceArg) -> Result<i32, CliError> {
    let config = load_config()?;
    let controller = controller_from(&config);
    let instance = controller.get(&InstanceId::from(arg.instance_id)).await?;
    writeln!(io::stdout(), "{}", render_instance(&instance)).ok();
    Ok(0)
}

async fn act(arg: InstanceArg, action: InstanceAction) -> Result<i32, CliError> {
    let config = load_config()?;
    let controller = controller_from(&config);
    let id = InstanceId::from(arg.instance_id);
    controller.act(&id, action).await?;
    writeln!(io::stdout(), "{action} requested for {id}").ok();
    Ok(0)
}

async fn delete(command: DeleteCommand) -> Result<i32, CliError> {
    // Confirmation is checked before anything else; an unconfirmed delete
    // must fail even when no credentials are configured.
    if !command.yes {
        return Err(CliError::DeleteNotConfirmed(command.instance_id));
    }

    let config = load_config()?;
    let controller = controller_from(&config);
    let id = InstanceId::from(command.instance_id);
    controller.act(&id, InstanceAction::Delete).await?;
    writeln!(io::stdout(), "deleted {id}").ok();
    Ok(0)
}

fn set_script(command: &SetScriptCommand) -> Result<i32, CliError> {
    apply_script_update(&ConfigStore::new(), command)
}

fn apply_script_update(
    store: &impl ConfigWriter,
    command: &SetScriptCommand,
) -> Result<i32, CliError> {
    let previous = store.current_script_id()?;
    let path = store.write_script_id(&command.script_id, command.force)?;
    writeln!(
        io::stdout(),
        "{}",
        render_script_update(previous.as_deref(), &command.script_id, &path)
    )
    .ok();
    Ok(0)
}

fn render_script_update(previous: Option<&str>, script_id: &str, path: &Utf8Path) -> String {
    match previous {
        Some(prior) if prior != script_id => {
            format!("default script ID {script_id} written to {path} (replaced {prior})")
        }
        _ => format!("default script ID {script_id} written to {path}"),
    }
}

fn show_config() -> Result<i32, CliError> {
    let config =
        VerdaConfig::load_without_cli_args().map_err(|err| CliError::Config(err.to_string()))?;
    let mut stdout = io::stdout();
    let secret = if config.client_secret.trim().is_empty() {
        "(unset)"
    } else {
        "(set)"
    };
    writeln!(stdout, "client_id: {}", config.client_id).ok();
    writeln!(stdout, "client_secret: {secret}").ok();
    writeln!(
        stdout,
        "default shape: {} x{}",
        config.default_gpu_type, config.default_gpu_count
    )
    .ok();
    writeln!(stdout, "default location: {}", config.default_location).ok();
    writeln!(stdout, "default image: {}", config.default_image).ok();
    writeln!(stdout, "hostname prefix: {}", config.hostname_prefix).ok();
    writeln!(
        stdout,
        "readiness: timeout {}s, poll every {}s",
        config.ready_timeout_secs, config.poll_interval_secs
    )
    .ok();
    writeln!(
        stdout,
        "watch: every {}s, up to {} checks",
        config.check_interval_secs, config.max_checks
    )
    .ok();
    writeln!(
        stdout,
        "default volume: {}",
        config.default_volume_id.as_deref().unwrap_or("(none)")
    )
    .ok();
    writeln!(
        stdout,
        "default script: {}",
        config.default_script_id.as_deref().unwrap_or("(none)")
    )
    .ok();
    Ok(0)
}

fn controller_from(config: &VerdaConfig) -> LifecycleController<VerdaClient> {
    LifecycleController::new(
        VerdaClient::from_config(config),
        config.hostname_prefix.clone(),
    )
}

fn print_attempt(report: &AttemptReport) {
    let mut stdout = io::stdout();
    if report.outcome.available {
        writeln!(
            stdout,
            "check {}/{}: capacity found",
            report.attempt, report.max_attempts
        )
        .ok();
    } else {
        writeln!(
            stdout,
            "check {}/{}: no capacity",
            report.attempt, report.max_attempts
        )
        .ok();
    }
}

fn print_deployment(deployment: &Deployment) {
    let mut stdout = io::stdout();
    writeln!(
        stdout,
        "deployed on check {}: {}",
        deployment.attempt,
        render_instance(&deployment.instance)
    )
    .ok();
}

fn render_instance(instance: &Instance) -> String {
    let ip = instance
        .public_ip
        .map_or_else(|| String::from("-"), |ip| ip.to_string());
    let location = instance.location.as_ref().map_or("-", Location::as_str);
    format!(
        "{}  {}  {}  {}  {}  {}",
        instance.id, instance.state, instance.sku, instance.hostname, ip, location
    )
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
