mod cli;
mod config;
mod deploy;
mod environment;
mod process;
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use instant_registry::PackageRegistry;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, DeployCommand};
use crate::config::load_config;
use crate::deploy::{DeployPlan, run_deploy};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let packages_root = cli.packages_root.clone().unwrap_or_else(|| config.packages_root.clone());

    let registry = PackageRegistry::discover(&packages_root)
        .with_context(|| format!("failed to discover packages under {}", packages_root.display()))?;
    info!(
        "Found {} packages: {}",
        registry.len(),
        registry.ids().map(String::as_str).collect::<Vec<_>>().join(", ")
    );

    let (command, args) = match cli.command {
        Command::Init(args) => (DeployCommand::Init, args),
        Command::Up(args) => (DeployCommand::Up, args),
        Command::Down(args) => (DeployCommand::Down, args),
        Command::Destroy(args) => (DeployCommand::Destroy, args),
        Command::Test(args) => return testing::run_tests(&args, &registry, &config.test_runner).await,
    };

    let plan = DeployPlan::resolve(command, &args, &config)?;
    run_deploy(plan, Arc::new(registry)).await
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}
