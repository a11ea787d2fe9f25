use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use respin_core::{current_unix_timestamp, ExclusionSet, Package, PackageStatus};
use respin_installer::{
    clear_dirty_marker, default_user_prefix, missing_files,
    read_dirty_markers, soft_uninstall, touch_stamp, validate_root_name, write_dirty_marker,
    PrefixLayout, SoftUninstallStatus,
};
use respin_registry::{
    read_lock_holder, repair_registry_lock, with_registry_lock, LockRepair, PackageRegistry,
};
use respin_resolver::{
    compute_rebuild_set, invalidate, run_rebuild_pass_with_builder, InvalidationContext,
    OutcomeState, RebuildPlan, RebuildReport,
};

mod command_flows;
mod completion;
mod config;
mod dispatch;
mod render;

use command_flows::*;
use completion::write_completions_script;
use config::{load_config, RespinConfig};
use render::*;

#[derive(Parser, Debug)]
#[command(name = "respin")]
#[command(
    about = "Reinstall packages in place and rebuild what depends on them",
    long_about = None,
    version
)]
struct Cli {
    /// Install prefix holding the package state
    #[arg(long, env = "RESPIN_PREFIX", value_name = "PATH", global = true)]
    prefix: Option<PathBuf>,

    /// Configuration file (defaults to <prefix>/respin.toml)
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Disable badges, colours and progress bars
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a freshly installed package
    Register {
        name: String,
        #[arg(long)]
        version: String,
        #[arg(long = "dependency", value_name = "NAME")]
        dependencies: Vec<String>,
        #[arg(long = "file", value_name = "PATH")]
        files: Vec<String>,
    },
    /// List registered packages
    List,
    /// Show one package in detail
    Show { name: String },
    /// Mark packages uninstalled while keeping their files on disk
    SoftUninstall {
        #[arg(required = true)]
        names: Vec<String>,
    },
    /// Mark a build root dirty so its next rebuild recomputes the plan
    Invalidate {
        #[arg(long)]
        root: Option<String>,
        #[arg(long = "exclude", value_name = "NAME")]
        excluded: Vec<String>,
        /// Files whose modification time is bumped, e.g. a top-level configure
        #[arg(long = "touch", value_name = "PATH")]
        touch: Vec<PathBuf>,
    },
    /// Print the rebuild order for a build root
    Plan {
        #[arg(long)]
        root: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Rebuild every stale package of a build root
    Rebuild {
        #[arg(long)]
        root: Option<String>,
        /// Shell command run per package; {name}, {version} and {prefix} are substituted
        #[arg(long, value_name = "TEMPLATE")]
        command: Option<String>,
    },
    /// Report prefix paths, dirty roots and packages with missing files
    Doctor,
    /// Clear a registry lock left behind by a process that no longer runs
    Repair,
    /// Print a shell completion script
    Completions { shell: clap_complete::Shell },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = tracing_subscriber::EnvFilter::try_from_env("RESPIN_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(err) = dispatch::run_cli(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests;
