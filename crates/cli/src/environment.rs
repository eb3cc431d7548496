//! Environment handed to package scripts.
//!
//! Precedence, highest first: the invoking process environment, profile env
//! files, then the defaults a package declares. The process environment
//! itself is never mutated; values are passed to the child process only.

use indexmap::IndexMap;
use instant_types::{EnvSource, EnvVar, PackageRecord};
use instant_util::redact_env_value;
use tracing::info;

/// Effective environment for `record`.
///
/// `lookup` reads the process environment; it is injected so the precedence
/// rules can be exercised without touching real variables.
pub fn package_environment<L>(record: &PackageRecord, file_env: &IndexMap<String, String>, lookup: L) -> Vec<EnvVar>
where
    L: Fn(&str) -> Option<String>,
{
    let declared = &record.metadata.environment_variables;
    let mut vars = Vec::with_capacity(declared.len() + file_env.len());

    for (key, default_value) in declared {
        let var = if let Some(value) = lookup(key) {
            EnvVar::new(key, value, EnvSource::Process)
        } else if let Some(value) = file_env.get(key) {
            EnvVar::new(key, value, EnvSource::File)
        } else {
            EnvVar::new(key, default_value, EnvSource::Default)
        };
        vars.push(var.with_default(default_value));
    }

    for (key, value) in file_env {
        if declared.contains_key(key) || lookup(key).is_some() {
            continue;
        }
        vars.push(EnvVar::new(key, value, EnvSource::File));
    }

    vars
}

/// Log the package's configuration, with secret values redacted.
pub fn log_environment(record: &PackageRecord, vars: &[EnvVar]) {
    info!(package = %record.id(), name = %record.metadata.name, variables = vars.len(), "config details");
    for var in vars {
        info!(
            package = %record.id(),
            variable = %var.key,
            default = %var.default_value.as_deref().map(|value| redact_env_value(&var.key, value)).unwrap_or_default(),
            value = %redact_env_value(&var.key, &var.value),
            source = ?var.source,
            "environment variable"
        );
    }
}
