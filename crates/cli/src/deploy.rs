//! `init`, `up`, `down` and `destroy`: run each package's deployment script
//! in dependency order.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use instant_engine::{ActionError, bounded_action, build_dependency_tree, walk_dependency_tree};
use instant_registry::PackageRegistry;
use instant_types::PackageRecord;
use instant_util::load_env_file;
use tracing::{debug, error, info};

use crate::cli::{DeployArgs, DeployCommand, Target};
use crate::config::{ConfigError, InstantConfig};
use crate::environment::{log_environment, package_environment};
use crate::process::run_logged;

/// Fully resolved settings of one deploy invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployPlan {
    pub command: DeployCommand,
    pub target: Target,
    pub dev: bool,
    pub only: bool,
    pub concurrency: usize,
    pub packages: Vec<String>,
    pub env_files: Vec<PathBuf>,
}

impl DeployPlan {
    /// Merge command line flags over the selected profile and config defaults.
    pub fn resolve(command: DeployCommand, args: &DeployArgs, config: &InstantConfig) -> Result<Self, ConfigError> {
        let profile = args.profile.as_deref().map(|name| config.profile(name)).transpose()?;

        let packages = match profile {
            Some(profile) if args.packages.is_empty() => profile.packages.clone(),
            _ => args.packages.clone(),
        };
        let concurrency = args.concurrency.unwrap_or(config.concurrency);
        if concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        Ok(Self {
            command,
            target: args.target.unwrap_or(config.target),
            dev: args.dev || profile.is_some_and(|profile| profile.dev),
            only: args.only || profile.is_some_and(|profile| profile.only),
            concurrency,
            packages,
            env_files: profile.map(|profile| config.env_file_paths(profile)).unwrap_or_default(),
        })
    }

    /// `dev` or `prod`, as handed to swarm scripts.
    pub fn mode(&self) -> &'static str {
        if self.dev { "dev" } else { "prod" }
    }
}

/// Runs one package's deployment script.
pub struct PackageScriptRunner {
    registry: Arc<PackageRegistry>,
    command: DeployCommand,
    target: Target,
    mode: &'static str,
    file_env: IndexMap<String, String>,
}

impl PackageScriptRunner {
    pub fn new(registry: Arc<PackageRegistry>, plan: &DeployPlan, file_env: IndexMap<String, String>) -> Self {
        Self {
            registry,
            command: plan.command,
            target: plan.target,
            mode: plan.mode(),
            file_env,
        }
    }

    /// Script for the configured target inside the package directory.
    pub fn script_path(&self, record: &PackageRecord) -> PathBuf {
        match self.target {
            Target::Docker => record.path().join("docker").join("compose.sh"),
            Target::Kubernetes => record.path().join("kubernetes").join("main").join("k8s.sh"),
            Target::Swarm => record.path().join("swarm.sh"),
        }
    }

    /// Arguments after the script path.
    pub fn script_args(&self) -> Vec<String> {
        match self.target {
            Target::Swarm => vec![self.command.as_str().to_string(), self.mode.to_string()],
            Target::Docker | Target::Kubernetes => vec![self.command.as_str().to_string()],
        }
    }

    pub async fn run(&self, id: &str) -> Result<()> {
        let record = self
            .registry
            .get(id)
            .with_context(|| format!("package '{id}' is not registered"))?;

        let env = package_environment(record, &self.file_env, |key| std::env::var(key).ok());
        log_environment(record, &env);

        let script = self.script_path(record);
        if !script.is_file() {
            bail!("script {} not found for target {}", script.display(), self.target);
        }

        let mut args = vec![script.display().to_string()];
        args.extend(self.script_args());
        run_logged(id, "bash", &args, &env)
            .await
            .with_context(|| format!("script {} returned an error", script.display()))
    }
}

/// Execute a deploy command over the chosen packages.
pub async fn run_deploy(plan: DeployPlan, registry: Arc<PackageRegistry>) -> Result<()> {
    info!(deploy_target = %plan.target, mode = plan.mode(), "target environment is {}", plan.target);
    let chosen = registry.select(&plan.packages)?;
    info!("selected package IDs to operate on: {}", chosen.join(", "));

    let mut file_env = IndexMap::new();
    for path in &plan.env_files {
        file_env.extend(load_env_file(path)?);
    }

    let runner = Arc::new(PackageScriptRunner::new(Arc::clone(&registry), &plan, file_env));

    let failures: Vec<ActionError> = if plan.only {
        let mut failures = Vec::new();
        for id in &chosen {
            if let Err(cause) = runner.run(id).await {
                failures.push(ActionError::new(id.clone(), cause));
            }
        }
        failures
    } else {
        let tree = build_dependency_tree(registry.as_ref(), &chosen)?;
        debug!(tree = %tree.to_json_pretty()?, "dependency tree");

        let action = bounded_action(
            move |id: String| {
                let runner = Arc::clone(&runner);
                async move { runner.run(&id).await }
            },
            plan.concurrency,
        )?;
        let report = walk_dependency_tree(&tree, plan.command.walk_order(), action).await;
        debug!(invocations = report.invocations, "walk finished");
        report.failures.into_values().collect()
    };

    report_failures(plan.command.as_str(), &failures)
}

/// Log every failure and turn a non-empty list into an error.
pub fn report_failures(what: &str, failures: &[ActionError]) -> Result<()> {
    if failures.is_empty() {
        info!("{what} finished for all packages");
        return Ok(());
    }
    for failure in failures {
        error!(package = %failure.package_id(), "{failure}");
    }
    let ids: Vec<&str> = failures.iter().map(ActionError::package_id).collect();
    bail!("{what} failed for {} package(s): {}", failures.len(), ids.join(", "))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use instant_types::PackageMetadata;

    use super::*;
    use crate::config::Profile;

    fn config_with_profile() -> InstantConfig {
        InstantConfig {
            concurrency: 6,
            target: Target::Swarm,
            profiles: vec![Profile {
                name: "dev".into(),
                packages: vec!["core".into(), "mpi".into()],
                dev: true,
                only: false,
                env_files: vec![".env.dev".into()],
            }],
            source_dir: Some(PathBuf::from("/srv/platform")),
            ..Default::default()
        }
    }

    #[test]
    fn flags_fall_back_to_config_defaults() {
        let plan = DeployPlan::resolve(DeployCommand::Up, &DeployArgs::default(), &InstantConfig::default()).expect("resolve");
        assert_eq!(plan.target, Target::Docker);
        assert_eq!(plan.concurrency, 10);
        assert_eq!(plan.mode(), "prod");
        assert!(plan.packages.is_empty() && plan.env_files.is_empty());
    }

    #[test]
    fn profile_supplies_packages_mode_and_env_files() {
        let args = DeployArgs {
            profile: Some("dev".into()),
            ..Default::default()
        };
        let plan = DeployPlan::resolve(DeployCommand::Init, &args, &config_with_profile()).expect("resolve");
        assert_eq!(plan.packages, vec!["core", "mpi"]);
        assert_eq!(plan.mode(), "dev");
        assert_eq!(plan.target, Target::Swarm);
        assert_eq!(plan.concurrency, 6);
        assert_eq!(plan.env_files, vec![PathBuf::from("/srv/platform/.env.dev")]);
    }

    #[test]
    fn explicit_flags_override_profile() {
        let args = DeployArgs {
            profile: Some("dev".into()),
            target: Some(Target::Docker),
            concurrency: Some(2),
            packages: vec!["hmis".into()],
            ..Default::default()
        };
        let plan = DeployPlan::resolve(DeployCommand::Down, &args, &config_with_profile()).expect("resolve");
        assert_eq!(plan.packages, vec!["hmis"]);
        assert_eq!(plan.target, Target::Docker);
        assert_eq!(plan.concurrency, 2);
    }

    #[test]
    fn unknown_profile_and_zero_concurrency_are_rejected() {
        let args = DeployArgs {
            profile: Some("prod".into()),
            ..Default::default()
        };
        assert!(matches!(
            DeployPlan::resolve(DeployCommand::Up, &args, &config_with_profile()),
            Err(ConfigError::UnknownProfile { .. })
        ));

        let args = DeployArgs {
            concurrency: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            DeployPlan::resolve(DeployCommand::Up, &args, &InstantConfig::default()),
            Err(ConfigError::InvalidConcurrency)
        ));
    }

    fn runner_for(target: Target, dev: bool, registry: PackageRegistry) -> PackageScriptRunner {
        let plan = DeployPlan {
            command: DeployCommand::Up,
            target,
            dev,
            only: false,
            concurrency: 1,
            packages: vec![],
            env_files: vec![],
        };
        PackageScriptRunner::new(Arc::new(registry), &plan, IndexMap::new())
    }

    fn core_record(path: impl Into<PathBuf>) -> PackageRecord {
        PackageRecord::new(
            PackageMetadata {
                id: "core".into(),
                ..Default::default()
            },
            path,
        )
    }

    #[test]
    fn script_location_and_arguments_follow_the_target() {
        let record = core_record("/packages/core");

        let docker = runner_for(Target::Docker, false, PackageRegistry::default());
        assert_eq!(docker.script_path(&record), PathBuf::from("/packages/core/docker/compose.sh"));
        assert_eq!(docker.script_args(), vec!["up"]);

        let kubernetes = runner_for(Target::Kubernetes, false, PackageRegistry::default());
        assert_eq!(kubernetes.script_path(&record), PathBuf::from("/packages/core/kubernetes/main/k8s.sh"));

        let swarm = runner_for(Target::Swarm, true, PackageRegistry::default());
        assert_eq!(swarm.script_path(&record), PathBuf::from("/packages/core/swarm.sh"));
        assert_eq!(swarm.script_args(), vec!["up", "dev"]);
    }

    #[tokio::test]
    async fn missing_script_fails_the_package() {
        let temp_dir = tempfile::tempdir().unwrap();
        let registry: PackageRegistry = [core_record(temp_dir.path())].into_iter().collect();
        let runner = runner_for(Target::Docker, false, registry);

        let error = runner.run("core").await.expect_err("no script");
        assert!(error.to_string().contains("not found"), "unexpected error: {error}");
        assert!(runner.run("ghost").await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn deploy_runs_scripts_in_dependency_order() {
        let temp_dir = tempfile::tempdir().unwrap();
        let journal = temp_dir.path().join("journal.log");
        let mut records = Vec::new();
        for (id, deps) in [("core", vec![]), ("mpi", vec!["core".to_string()])] {
            let directory = temp_dir.path().join(id);
            fs::create_dir_all(directory.join("docker")).unwrap();
            fs::write(
                directory.join("docker").join("compose.sh"),
                format!("echo \"{id} $1\" >> \"{}\"\n", journal.display()),
            )
            .unwrap();
            records.push(PackageRecord::new(
                PackageMetadata {
                    id: id.into(),
                    dependencies: deps,
                    ..Default::default()
                },
                directory,
            ));
        }
        let registry: PackageRegistry = records.into_iter().collect();
        let plan = DeployPlan {
            command: DeployCommand::Up,
            target: Target::Docker,
            dev: false,
            only: false,
            concurrency: 2,
            packages: vec!["mpi".into()],
            env_files: vec![],
        };

        run_deploy(plan, Arc::new(registry)).await.expect("deploy");

        assert_eq!(fs::read_to_string(&journal).unwrap(), "core up\nmpi up\n");
    }

    #[test]
    fn failures_become_an_error_listing_packages() {
        assert!(report_failures("up", &[]).is_ok());

        let failures = vec![
            ActionError::new("core", anyhow::anyhow!("exit 1")),
            ActionError::new("mpi", anyhow::anyhow!("exit 2")),
        ];
        let error = report_failures("up", &failures).expect_err("failures");
        assert_eq!(error.to_string(), "up failed for 2 package(s): core, mpi");
    }
}
