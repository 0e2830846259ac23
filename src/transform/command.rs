// src/transform/command.rs

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::TransformError;
use crate::paths::path_utils::to_slash;
use crate::paths::CompiledPathSet;
use crate::transform::hash::compute_inputs_hash;
use crate::transform::{Artifact, StepContext, TransformStep};
use crate::types::BoxFuture;

const KIND: &str = "command";

/// Lines of tool output kept for the error message of a failed command.
const TAIL_LINES: usize = 20;

/// Runs an external tool through the platform shell, from the project root.
///
/// `{inputs}` expands to the resolved inputs (root-relative, shell-quoted,
/// space-separated) and `{output}` to `output`. `{stage}` was substituted
/// when the step was built.
#[derive(Debug, Clone)]
pub struct CommandStep {
    pub cmd: String,
    pub src: Option<CompiledPathSet>,
    /// Root-relative file the tool writes, if any.
    pub output: Option<String>,
    /// Set for `cache = true` steps: key of this step in the hash store.
    pub cache_key: Option<String>,
}

/// Inputs resolved and measured on the blocking pool.
struct Prepared {
    inputs: Vec<String>,
    bytes_in: u64,
    hash: Option<String>,
}

impl CommandStep {
    /// Final shell command line.
    pub fn render(&self, inputs: &[String]) -> String {
        let quoted: Vec<String> = inputs.iter().map(|i| shell_quote(i)).collect();
        let mut line = self.cmd.replace("{inputs}", &quoted.join(" "));
        if let Some(output) = &self.output {
            line = line.replace("{output}", &shell_quote(output));
        }
        line
    }

    fn prepare(&self, ctx: &StepContext) -> Result<Prepared, TransformError> {
        let paths = match &self.src {
            Some(set) => ctx.resolve(KIND, set)?,
            None => Vec::new(),
        };

        let mut bytes_in = 0u64;
        for path in &paths {
            let bytes = ctx.fs.read(path).map_err(|e| {
                TransformError::new(KIND, format!("{e:#}")).with_file(ctx.display_path(path))
            })?;
            bytes_in += bytes.len() as u64;
        }

        let inputs: Vec<String> = paths.iter().map(|p| to_slash(&ctx.display_path(p))).collect();
        let hash = match &self.cache_key {
            Some(_) => Some(
                compute_inputs_hash(ctx.fs.as_ref(), &paths, &self.render(&inputs))
                    .map_err(|e| TransformError::new(KIND, format!("hashing inputs: {e:#}")))?,
            ),
            None => None,
        };

        Ok(Prepared {
            inputs,
            bytes_in,
            hash,
        })
    }

    fn is_fresh(&self, ctx: &StepContext, hash: &str) -> Result<bool, TransformError> {
        let Some(key) = &self.cache_key else {
            return Ok(false);
        };
        let stored = ctx
            .hashes
            .lock()
            .load(key)
            .map_err(|e| TransformError::new(KIND, format!("loading hash: {e:#}")))?;
        let output_present = match &self.output {
            Some(output) => ctx.fs.exists(&ctx.path(output)),
            None => true,
        };
        Ok(output_present && stored.as_deref() == Some(hash))
    }

    async fn run(&self, ctx: StepContext) -> Result<Artifact, TransformError> {
        let prepared = {
            let step = self.clone();
            let ctx = ctx.clone();
            tokio::task::spawn_blocking(move || step.prepare(&ctx))
                .await
                .map_err(|e| TransformError::new(KIND, format!("step panicked: {e}")))??
        };

        if let Some(hash) = &prepared.hash {
            if self.is_fresh(&ctx, hash)? {
                info!(cmd = %self.cmd, "inputs unchanged, skipping command");
                return Ok(Artifact::cached());
            }
        }

        let line = self.render(&prepared.inputs);
        debug!(cmd = %line, inputs = prepared.inputs.len(), "running command");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&line);
            c
        };
        cmd.current_dir(&ctx.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| TransformError::new(KIND, format!("spawning `{line}`: {e}")))?;

        let stdout = child.stdout.take().map(|s| collect_tail(s, "stdout"));
        let stderr = child.stderr.take().map(|s| collect_tail(s, "stderr"));

        let status = child
            .wait()
            .await
            .map_err(|e| TransformError::new(KIND, format!("waiting for `{line}`: {e}")))?;

        let stdout_tail = join_tail(stdout).await;
        let stderr_tail = join_tail(stderr).await;

        if !status.success() {
            let tail = if stderr_tail.is_empty() { &stdout_tail } else { &stderr_tail };
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let mut err = TransformError::new(
                KIND,
                format!("`{}` exited with {}: {}", self.cmd, code, tail.join("\n")),
            );
            if let Some(file) = originating_file(&prepared.inputs, tail) {
                err = err.with_file(file);
            }
            return Err(err);
        }

        if let (Some(key), Some(hash)) = (&self.cache_key, &prepared.hash) {
            ctx.hashes
                .lock()
                .save(key, hash)
                .map_err(|e| TransformError::new(KIND, format!("storing hash: {e:#}")))?;
        }

        let mut artifact = Artifact {
            bytes_in: prepared.bytes_in,
            ..Artifact::default()
        };
        if let Some(output) = &self.output {
            let path = ctx.path(output);
            if let Ok(bytes) = ctx.fs.read(&path) {
                artifact.bytes_out = bytes.len() as u64;
            }
            artifact.outputs.push(path);
        }
        Ok(artifact)
    }
}

impl TransformStep for CommandStep {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn label(&self) -> String {
        self.cmd.clone()
    }

    fn apply<'a>(&'a self, ctx: &'a StepContext) -> BoxFuture<'a, Result<Artifact, TransformError>> {
        Box::pin(self.run(ctx.clone()))
    }
}

/// Consume a child stream line by line, keeping the last few lines.
fn collect_tail<R>(stream: R, name: &'static str) -> JoinHandle<Vec<String>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut tail = VecDeque::with_capacity(TAIL_LINES);
        while let Ok(Some(line)) = lines.next_line().await {
            debug!("{}: {}", name, line);
            if tail.len() == TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line);
        }
        tail.into_iter().collect()
    })
}

async fn join_tail(handle: Option<JoinHandle<Vec<String>>>) -> Vec<String> {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => Vec::new(),
    }
}

/// First input named in the tool's output, if any.
fn originating_file(inputs: &[String], output: &[String]) -> Option<PathBuf> {
    inputs
        .iter()
        .find(|input| output.iter().any(|line| line.contains(input.as_str())))
        .map(PathBuf::from)
}

fn shell_quote(s: &str) -> String {
    let safe = !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '@' | '+'));
    if safe {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(cmd: &str) -> CommandStep {
        CommandStep {
            cmd: cmd.to_string(),
            src: None,
            output: Some("build/all.min.js".to_string()),
            cache_key: None,
        }
    }

    #[test]
    fn render_quotes_inputs_and_output() {
        let line = step("uglify {inputs} -o {output}")
            .render(&["client/a.js".to_string(), "client/my file.js".to_string()]);
        assert_eq!(line, "uglify client/a.js 'client/my file.js' -o build/all.min.js");
    }

    #[test]
    fn originating_file_is_first_input_mentioned() {
        let inputs = vec!["client/a.js".to_string(), "client/b.js".to_string()];
        let output = vec!["client/b.js: line 3, col 1, Missing semicolon.".to_string()];
        assert_eq!(originating_file(&inputs, &output), Some(PathBuf::from("client/b.js")));
        assert_eq!(originating_file(&inputs, &["all good".to_string()]), None);
    }

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), r"'it'\''s'");
        assert_eq!(shell_quote("a/b-c.js"), "a/b-c.js");
    }
}
