//! Command line surface.

use std::fmt;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use instant_engine::WalkOrder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Parser)]
#[command(name = "instant", version, about = "Deploy packages and their dependencies")]
pub struct Cli {
    /// Directory searched for package manifests (overrides the config file).
    #[arg(long, global = true)]
    pub packages_root: Option<PathBuf>,

    /// Configuration file (defaults to $INSTANT_CONFIG_PATH or the user config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Initialise packages, dependencies first.
    Init(DeployArgs),
    /// Bring packages up, dependencies first.
    Up(DeployArgs),
    /// Bring packages down, dependents first.
    Down(DeployArgs),
    /// Destroy packages and their data, dependents first.
    Destroy(DeployArgs),
    /// Run package test suites, dependencies first.
    Test(TestArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct DeployArgs {
    /// Deployment target.
    #[arg(short, long, value_enum)]
    pub target: Option<Target>,

    /// Ignore package dependencies and act only on the listed packages.
    #[arg(short, long)]
    pub only: bool,

    /// Development mode (passed to swarm scripts as `dev`).
    #[arg(short, long)]
    pub dev: bool,

    /// Profile from the config file to take packages, mode and env files from.
    #[arg(long)]
    pub profile: Option<String>,

    /// Maximum number of package actions running at once.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Package ids to operate on; all discovered packages when omitted.
    pub packages: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct TestArgs {
    /// Host the test suites run against.
    #[arg(short = 'H', long, default_value = "localhost")]
    pub host: String,

    /// Port the test suites run against.
    #[arg(short, long, default_value = "5000")]
    pub port: String,

    /// Package ids to test; all discovered packages when omitted.
    pub packages: Vec<String>,
}

/// Platform a package is deployed to; selects the script that is run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Docker,
    #[value(alias = "k8s")]
    #[serde(alias = "k8s")]
    Kubernetes,
    Swarm,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Target::Docker => "docker",
            Target::Kubernetes => "kubernetes",
            Target::Swarm => "swarm",
        })
    }
}

/// The lifecycle step a deploy command performs on each package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployCommand {
    Init,
    Up,
    Down,
    Destroy,
}

impl DeployCommand {
    /// Argument handed to package scripts.
    pub fn as_str(self) -> &'static str {
        match self {
            DeployCommand::Init => "init",
            DeployCommand::Up => "up",
            DeployCommand::Down => "down",
            DeployCommand::Destroy => "destroy",
        }
    }

    /// Teardown visits dependents before their dependencies; setup waits for dependencies.
    pub fn walk_order(self) -> WalkOrder {
        match self {
            DeployCommand::Down | DeployCommand::Destroy => WalkOrder::Pre,
            DeployCommand::Init | DeployCommand::Up => WalkOrder::Post,
        }
    }
}

impl fmt::Display for DeployCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
