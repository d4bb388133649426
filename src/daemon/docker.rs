//! Docker CLI backed daemon access.
//!
//! Every operation shells out to the docker CLI, so the daemon connection
//! (`DOCKER_HOST`, `DOCKER_CONTEXT`, TLS settings) is whatever the CLI itself
//! resolves from the environment.

use super::{ImageDaemon, ImageExport, ImageSummary};
use crate::error::DaemonError;
use serde::Deserialize;
use std::io;
use std::pin::Pin;
use std::process::{Output, Stdio};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Default docker CLI program
pub const DOCKER_PROGRAM: &str = "docker";

/// Timeout for the daemon reachability probe.
/// Only `docker version` is bounded; pulls and saves may take arbitrarily long.
pub const DAEMON_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Daemon access through the docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(DOCKER_PROGRAM)
    }
}

impl DockerCli {
    /// Use `program` (a name on PATH or a path) as the docker CLI
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(args).stdin(Stdio::null());
        command
    }

    async fn output(&self, args: &[&str]) -> io::Result<Output> {
        log::debug!("Running {} {}", self.program, args.join(" "));
        self.command(args).output().await
    }
}

impl ImageDaemon for DockerCli {
    type Export = DockerExport;

    async fn ping(&self) -> Result<(), DaemonError> {
        which::which(&self.program).map_err(|e| DaemonError::Connection {
            reason: format!("docker CLI '{}' not found: {}", self.program, e),
        })?;

        let probe = timeout(
            DAEMON_PROBE_TIMEOUT,
            self.output(&["version", "--format", "{{.Server.Version}}"]),
        )
        .await
        .map_err(|_| DaemonError::Connection {
            reason: format!(
                "daemon did not answer within {} seconds",
                DAEMON_PROBE_TIMEOUT.as_secs()
            ),
        })?
        .map_err(|e| DaemonError::Connection {
            reason: e.to_string(),
        })?;

        if !probe.status.success() {
            return Err(DaemonError::Connection {
                reason: failure_reason(&probe),
            });
        }

        log::debug!(
            "Connected to docker daemon {}",
            String::from_utf8_lossy(&probe.stdout).trim()
        );
        Ok(())
    }

    async fn pull(&self, reference: &str) -> Result<(), DaemonError> {
        let output = self
            .output(&["pull", reference])
            .await
            .map_err(|e| DaemonError::Pull {
                image: reference.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DaemonError::Pull {
                image: reference.to_string(),
                reason: failure_reason(&output),
            });
        }
        Ok(())
    }

    async fn tag(&self, source: &str, target: &str) -> Result<(), DaemonError> {
        let tag_error = |reason: String| DaemonError::Tag {
            source_image: source.to_string(),
            target: target.to_string(),
            reason,
        };

        let output = self
            .output(&["tag", source, target])
            .await
            .map_err(|e| tag_error(e.to_string()))?;

        if !output.status.success() {
            return Err(tag_error(failure_reason(&output)));
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ImageSummary>, DaemonError> {
        let listing = self
            .output(&["image", "ls", "--quiet", "--no-trunc"])
            .await
            .map_err(|e| DaemonError::List {
                reason: e.to_string(),
            })?;
        if !listing.status.success() {
            return Err(DaemonError::List {
                reason: failure_reason(&listing),
            });
        }

        let ids = unique_lines(&String::from_utf8_lossy(&listing.stdout));
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["image", "inspect", "--format", "{{json .}}"];
        args.extend(ids.iter().map(String::as_str));

        let inspected = self.output(&args).await.map_err(|e| DaemonError::List {
            reason: e.to_string(),
        })?;
        if !inspected.status.success() {
            return Err(DaemonError::List {
                reason: failure_reason(&inspected),
            });
        }

        parse_inspect_output(&String::from_utf8_lossy(&inspected.stdout)).map_err(|e| {
            DaemonError::List {
                reason: format!("unexpected docker image inspect output: {}", e),
            }
        })
    }

    async fn save(&self, image_ids: &[String]) -> Result<DockerExport, DaemonError> {
        let mut args = vec!["image", "save"];
        args.extend(image_ids.iter().map(String::as_str));
        log::debug!("Running {} {}", self.program, args.join(" "));

        let mut child = self
            .command(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DaemonError::Save {
                reason: e.to_string(),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| DaemonError::Save {
            reason: "docker image save produced no output stream".to_string(),
        })?;
        // Drained concurrently so a chatty save cannot stall on a full pipe.
        let stderr = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut message = String::new();
                let _ = stderr.read_to_string(&mut message).await;
                message
            })
        });

        Ok(DockerExport {
            child,
            stdout,
            stderr,
        })
    }
}

/// Output of a running `docker image save`.
///
/// The child process is killed if the export is dropped before [`close`].
///
/// [`close`]: ImageExport::close
#[derive(Debug)]
pub struct DockerExport {
    child: Child,
    stdout: ChildStdout,
    stderr: Option<JoinHandle<String>>,
}

impl AsyncRead for DockerExport {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stdout).poll_read(cx, buf)
    }
}

impl ImageExport for DockerExport {
    async fn close(self) -> Result<(), DaemonError> {
        let DockerExport {
            mut child,
            stdout,
            stderr,
        } = self;

        // Closing our end lets a still-running save exit instead of blocking on the pipe.
        drop(stdout);

        let status = child.wait().await.map_err(|e| DaemonError::Save {
            reason: e.to_string(),
        })?;

        let message = match stderr {
            Some(drain) => drain.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            Ok(())
        } else {
            let message = message.trim();
            Err(DaemonError::Save {
                reason: if message.is_empty() {
                    format!("docker image save exited with {}", status)
                } else {
                    message.to_string()
                },
            })
        }
    }
}

/// Subset of `docker image inspect` output satchel reads
#[derive(Debug, Deserialize)]
struct InspectRecord {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Parent", default)]
    parent: Option<String>,
    #[serde(rename = "RepoTags", default)]
    repo_tags: Option<Vec<String>>,
}

impl From<InspectRecord> for ImageSummary {
    fn from(record: InspectRecord) -> Self {
        Self {
            id: record.id,
            parent_id: record.parent.unwrap_or_default(),
            repo_tags: record.repo_tags.unwrap_or_default(),
        }
    }
}

/// Parse one JSON document per line, as printed by `--format '{{json .}}'`
fn parse_inspect_output(stdout: &str) -> Result<Vec<ImageSummary>, serde_json::Error> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str::<InspectRecord>(line).map(ImageSummary::from))
        .collect()
}

/// Non-empty lines, first occurrence only, in order
fn unique_lines(stdout: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for line in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if !lines.iter().any(|seen| seen == line) {
            lines.push(line.to_string());
        }
    }
    lines
}

fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_inspect_output() {
        let stdout = concat!(
            r#"{"Id":"sha256:aaa","Parent":"","RepoTags":["java:8","openjdk:8"],"Size":1}"#,
            "\n",
            r#"{"Id":"sha256:bbb","Parent":"sha256:aaa","RepoTags":[]}"#,
            "\n\n",
            r#"{"Id":"sha256:ccc","RepoTags":null}"#,
            "\n",
        );

        let summaries = parse_inspect_output(stdout).unwrap();
        assert_eq!(
            summaries,
            vec![
                ImageSummary::new("sha256:aaa", "", ["java:8", "openjdk:8"]),
                ImageSummary::new("sha256:bbb", "sha256:aaa", Vec::<String>::new()),
                ImageSummary::new("sha256:ccc", "", Vec::<String>::new()),
            ]
        );
    }

    #[test]
    fn test_parse_inspect_output_rejects_garbage() {
        assert!(parse_inspect_output("not json\n").is_err());
    }

    #[test]
    fn test_unique_lines_keeps_first_occurrence() {
        let ids = unique_lines("sha256:a\nsha256:b\n\nsha256:a\n sha256:c \n");
        assert_eq!(ids, vec!["sha256:a", "sha256:b", "sha256:c"]);
    }

    /// Shell script standing in for the docker CLI
    #[cfg(unix)]
    fn fake_docker(dir: &std::path::Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("docker");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_save_with_large_stderr_does_not_stall() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let program = fake_docker(
            temp_dir.path(),
            "head -c 262144 /dev/zero | tr '\\000' e >&2\nprintf payload\nexit 3",
        );
        let docker = DockerCli::new(program);

        let mut export = docker.save(&["sha256:aaa".to_string()]).await.unwrap();
        let mut data = Vec::new();
        timeout(Duration::from_secs(30), export.read_to_end(&mut data))
            .await
            .expect("export stalled")
            .unwrap();
        assert_eq!(data, b"payload");

        match export.close().await {
            Err(DaemonError::Save { reason }) => assert_eq!(reason.len(), 262_144),
            other => panic!("expected a save failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ping_reports_missing_program() {
        let docker = DockerCli::new("satchel-no-such-docker-binary");
        let result = docker.ping().await;
        assert!(matches!(result, Err(DaemonError::Connection { .. })));
    }
}
