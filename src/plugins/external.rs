//! Helpers for tools backed by an external binary (ffmpeg, pdftoppm).

use anyhow::Context;
use std::path::Path;
use tokio::process::Command;

#[derive(thiserror::Error, Debug)]
pub enum ExternalError {
    #[error("{bin} is not available: {reason}")]
    Unavailable { bin: String, reason: String },

    #[error("{bin} failed ({status}): {stderr}")]
    Failed { bin: String, status: String, stderr: String },
}

/// Checks that `bin` can be spawned at all. The exit status is ignored since
/// `-version`/`-v` exit codes differ between builds.
pub async fn check_binary(bin: &str, version_arg: &str) -> Result<(), ExternalError> {
    Command::new(bin)
        .arg(version_arg)
        .output()
        .await
        .map(|_| ())
        .map_err(|e| ExternalError::Unavailable { bin: bin.to_string(), reason: e.to_string() })
}

/// Runs `cmd` to completion, turning a non-zero exit into an error carrying stderr.
pub async fn run(bin: &str, mut cmd: Command) -> anyhow::Result<()> {
    let out = cmd
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("spawn {}", bin))?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
        return Err(ExternalError::Failed {
            bin: bin.to_string(),
            status: out.status.to_string(),
            stderr: tail.into_iter().rev().collect::<Vec<_>>().join(" | "),
        }
        .into());
    }
    Ok(())
}

/// Writes `data` into `dir` under `name`.
pub async fn stage_input(dir: &Path, name: &str, data: &[u8]) -> anyhow::Result<std::path::PathBuf> {
    let path = dir.join(name);
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("stage {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let err = check_binary("definitely-not-a-real-binary-7f3a", "-version")
            .await
            .unwrap_err();
        assert!(matches!(err, ExternalError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn stage_input_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = stage_input(dir.path(), "in.bin", b"abc").await.unwrap();
        assert_eq!(tokio::fs::read(path).await.unwrap(), b"abc");
    }
}
