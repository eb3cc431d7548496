//! `test`: run each package's feature suite, dependencies first.

use std::path::PathBuf;

use anyhow::{Result, bail};
use instant_engine::{ActionError, build_dependency_tree};
use instant_registry::PackageRegistry;
use instant_types::PackageId;
use tracing::info;

use crate::cli::TestArgs;
use crate::deploy::report_failures;
use crate::process::run_logged;

/// Packages to test, every dependency ahead of its dependents.
pub fn test_order(registry: &PackageRegistry, requested: &[PackageId]) -> Result<Vec<PackageId>> {
    let chosen = registry.select(requested)?;
    let tree = build_dependency_tree(registry, &chosen)?;
    Ok(tree.dependency_order())
}

/// Feature directory handed to the test runner.
pub fn features_dir(registry: &PackageRegistry, id: &str) -> Option<PathBuf> {
    registry.get(id).map(|record| record.path().join("features"))
}

/// Runs suites one package at a time; a failing suite does not stop the rest.
///
/// `test_runner` is a program optionally followed by whitespace separated
/// arguments; the features directory is appended last.
pub async fn run_tests(args: &TestArgs, registry: &PackageRegistry, test_runner: &str) -> Result<()> {
    let mut runner_words = test_runner.split_whitespace().map(String::from);
    let Some(program) = runner_words.next() else {
        bail!("test runner command is empty");
    };
    let runner_args: Vec<String> = runner_words.collect();

    let ordered = test_order(registry, &args.packages)?;
    info!("Running tests for packages: {}", ordered.join(", "));
    info!("Using host: {}:{}", args.host, args.port);

    let mut failures = Vec::new();
    for id in &ordered {
        let Some(features) = features_dir(registry, id) else {
            continue;
        };
        let mut command_args = runner_args.clone();
        command_args.push(features.display().to_string());
        if let Err(cause) = run_logged(id, &program, &command_args, &[]).await {
            failures.push(ActionError::new(id.clone(), cause));
        }
    }

    report_failures("test", &failures)
}
