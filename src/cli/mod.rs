//! Command-line interface definitions for the `skyhook` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::Parser;

/// Top-level CLI for the `skyhook` binary.
#[derive(Debug, Parser)]
#[command(
    name = "skyhook",
    about = "Watch Verda spot GPU capacity and deploy instances the moment it appears",
    arg_required_else_help = true
)]
pub(crate) enum Cli {
    /// Probe spot capacity once across the configured locations.
    #[command(name = "check", about = "Probe spot capacity once across locations")]
    Check(ShapeArgs),
    /// Poll for capacity on a fixed cadence, optionally deploying on a hit.
    #[command(name = "watch", about = "Poll for capacity, optionally deploying on a hit")]
    Watch(WatchCommand),
    /// Create a spot instance as soon as capacity is found.
    #[command(name = "deploy", about = "Create a spot instance when capacity is found")]
    Deploy(DeployCommand),
    /// List instances on the account.
    #[command(name = "list", about = "List instances on the account")]
    List,
    /// Show one instance in detail.
    #[command(name = "status", about = "Show one instance in detail")]
    Status(InstanceArg),
    /// Boot a stopped instance.
    #[command(name = "start", about = "Boot a stopped instance")]
    Start(InstanceArg),
    /// Shut an instance down without deleting it.
    #[command(name = "stop", about = "Shut an instance down without deleting it")]
    Stop(InstanceArg),
    /// Permanently delete an instance.
    #[command(name = "delete", about = "Permanently delete an instance")]
    Delete(DeleteCommand),
    /// Remember a startup script as the configured default.
    #[command(name = "set-script", about = "Remember a startup script as the default")]
    SetScript(SetScriptCommand),
    /// Print the effective configuration.
    #[command(name = "show-config", about = "Print the effective configuration")]
    ShowConfig,
}

/// Resource shape overrides shared by capacity subcommands.
#[derive(Debug, Parser)]
pub(crate) struct ShapeArgs {
    /// Override the GPU family (for example B300 or H200) for this run.
    #[arg(long, value_name = "TYPE")]
    pub(crate) gpu_type: Option<String>,
    /// Override the GPU count for this run.
    #[arg(long, value_name = "COUNT")]
    pub(crate) gpu_count: Option<u32>,
    /// Pin the probe to a single location instead of scanning all of them.
    #[arg(long, value_name = "LOCATION")]
    pub(crate) location: Option<String>,
}

/// Arguments for the `skyhook watch` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct WatchCommand {
    /// Shape and location overrides.
    #[command(flatten)]
    pub(crate) shape: ShapeArgs,
    /// Seconds between capacity checks.
    #[arg(long, value_name = "SECONDS")]
    pub(crate) interval_secs: Option<u64>,
    /// Give up after this many checks.
    #[arg(long, value_name = "COUNT")]
    pub(crate) max_checks: Option<u32>,
    /// Deploy an instance as soon as capacity is found.
    #[arg(long)]
    pub(crate) deploy: bool,
    /// Volume to attach if a deployment happens (repeatable).
    #[arg(long, value_name = "ID")]
    pub(crate) volume_id: Vec<String>,
    /// Startup script for the deployed instance.
    #[arg(long, value_name = "ID")]
    pub(crate) script_id: Option<String>,
}

/// Arguments for the `skyhook deploy` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DeployCommand {
    /// Shape and location overrides.
    #[command(flatten)]
    pub(crate) shape: ShapeArgs,
    /// Override the OS image for this deployment.
    #[arg(long, value_name = "IMAGE")]
    pub(crate) image: Option<String>,
    /// Explicit hostname instead of a generated one.
    #[arg(long, value_name = "NAME")]
    pub(crate) hostname: Option<String>,
    /// Volume to attach at creation (repeatable).
    #[arg(long, value_name = "ID")]
    pub(crate) volume_id: Vec<String>,
    /// Startup script for the new instance.
    #[arg(long, value_name = "ID")]
    pub(crate) script_id: Option<String>,
    /// Return as soon as the create call is accepted instead of waiting for
    /// the instance to reach the running state.
    #[arg(long)]
    pub(crate) no_wait: bool,
}

/// Instance identifier argument shared by lifecycle subcommands.
#[derive(Debug, Parser)]
pub(crate) struct InstanceArg {
    /// Provider-assigned instance ID.
    #[arg(value_name = "INSTANCE_ID")]
    pub(crate) instance_id: String,
}

/// Arguments for the `skyhook delete` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct DeleteCommand {
    /// Provider-assigned instance ID.
    #[arg(value_name = "INSTANCE_ID")]
    pub(crate) instance_id: String,
    /// Confirm the deletion. Without this flag nothing is deleted.
    #[arg(long)]
    pub(crate) yes: bool,
}

/// Arguments for the `skyhook set-script` subcommand.
#[derive(Debug, Parser)]
pub(crate) struct SetScriptCommand {
    /// Startup script ID to record as the default.
    #[arg(value_name = "SCRIPT_ID")]
    pub(crate) script_id: String,
    /// Overwrite an existing default script ID in configuration.
    #[arg(long)]
    pub(crate) force: bool,
}
