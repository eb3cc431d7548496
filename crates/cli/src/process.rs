//! Child process execution with output forwarded to the log.

use std::process::{ExitStatus, Stdio};

use anyhow::{Context, Result, bail};
use instant_types::EnvVar;
use instant_util::redact_sensitive;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{info, warn};

/// Run `program` with `args` and `env`, forwarding each output line to the log.
///
/// Fails when the process cannot be spawned or exits unsuccessfully.
pub async fn run_logged(label: &str, program: &str, args: &[String], env: &[EnvVar]) -> Result<()> {
    let command_line = std::iter::once(program.to_string()).chain(args.iter().cloned()).collect::<Vec<_>>().join(" ");
    info!(package = %label, command = %command_line, "executing");

    let mut command = Command::new(program);
    command
        .args(args)
        .envs(env.iter().map(|var| (var.key.as_str(), var.value.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command.spawn().with_context(|| format!("failed to spawn `{command_line}`"))?;
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, _, _) = tokio::join!(child.wait(), forward_lines(label, stdout, false), forward_lines(label, stderr, true));
    let status: ExitStatus = status.with_context(|| format!("failed to wait for `{command_line}`"))?;

    if !status.success() {
        bail!("`{command_line}` returned an error ({status})");
    }
    Ok(())
}

async fn forward_lines<R>(label: &str, reader: Option<R>, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return;
    };
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = redact_sensitive(&line);
                if is_stderr {
                    warn!(package = %label, "{line}");
                } else {
                    info!(package = %label, "{line}");
                }
            }
            Ok(None) => break,
            Err(error) => {
                warn!(package = %label, error = %error, "stopped reading process output");
                break;
            }
        }
    }
}
