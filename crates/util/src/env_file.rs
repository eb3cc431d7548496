//! Minimal `KEY=VALUE` env file support for profile env files.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EnvFileError {
    #[error("failed to read env file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid line {line} in env file {}: expected KEY=VALUE", path.display())]
    InvalidLine { path: PathBuf, line: usize },
}

/// Parse env file content. Returns the 1-based number of the first malformed line on error.
///
/// Blank lines and `#` comments are skipped, an optional `export ` prefix is
/// accepted, and a value wrapped in matching single or double quotes is
/// unwrapped. Later assignments override earlier ones.
pub fn parse_env_file(content: &str) -> Result<IndexMap<String, String>, usize> {
    let mut vars = IndexMap::new();
    for (index, raw_line) in content.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line.split_once('=').ok_or(index + 1)?;
        let key = key.trim();
        if key.is_empty() {
            return Err(index + 1);
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }
    Ok(vars)
}

/// Read and parse the env file at `path`.
pub fn load_env_file(path: &Path) -> Result<IndexMap<String, String>, EnvFileError> {
    let content = fs::read_to_string(path).map_err(|source| EnvFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let vars = parse_env_file(&content).map_err(|line| EnvFileError::InvalidLine {
        path: path.to_path_buf(),
        line,
    })?;
    debug!(path = %path.display(), count = vars.len(), "loaded env file");
    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)) {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignments_comments_and_quotes() {
        let vars = parse_env_file(
            "# platform settings\n\
             CLUSTERED_MODE=false\n\
             \n\
             export OPENHIM_CORE_MEDIATOR_HOSTNAME=localhost\n\
             MONGO_SET_COUNT=\"1\"\n\
             GREETING='hello world'\n\
             CLUSTERED_MODE=true\n",
        )
        .expect("parse env file");

        assert_eq!(vars["CLUSTERED_MODE"], "true");
        assert_eq!(vars["OPENHIM_CORE_MEDIATOR_HOSTNAME"], "localhost");
        assert_eq!(vars["MONGO_SET_COUNT"], "1");
        assert_eq!(vars["GREETING"], "hello world");
        assert_eq!(vars.len(), 4);
    }

    #[test]
    fn malformed_line_reports_its_number() {
        assert_eq!(parse_env_file("A=1\nnot an assignment\n"), Err(2));
        assert_eq!(parse_env_file("=value"), Err(1));
    }

    #[test]
    fn load_reads_from_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join(".env.dev");
        fs::write(&path, "NODE_ENV=dev\n").unwrap();

        let vars = load_env_file(&path).expect("load env file");
        assert_eq!(vars["NODE_ENV"], "dev");

        let error = load_env_file(&temp_dir.path().join("missing.env")).expect_err("missing file");
        assert!(matches!(error, EnvFileError::Read { .. }));
    }
}
