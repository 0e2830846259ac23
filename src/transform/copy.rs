// src/transform/copy.rs

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::TransformError;
use crate::paths::CompiledPathSet;
use crate::transform::{run_blocking, Artifact, StepContext, TransformStep};
use crate::types::BoxFuture;

const KIND: &str = "copy";

/// Copies the resolved inputs into the `dest` directory.
///
/// With `base`, a file keeps its path relative to `base`
/// (`client/images/icons/a.png` with base `client/images` lands in
/// `dest/icons/a.png`). Without it, only the file name is kept.
#[derive(Debug, Clone)]
pub struct CopyStep {
    pub src: CompiledPathSet,
    pub dest: String,
    pub base: Option<String>,
}

impl CopyStep {
    fn target_for(&self, ctx: &StepContext, input: &Path) -> PathBuf {
        let dest_dir = ctx.path(&self.dest);
        if let Some(base) = &self.base {
            if let Ok(rel) = input.strip_prefix(ctx.path(base)) {
                return dest_dir.join(rel);
            }
        }
        match input.file_name() {
            Some(name) => dest_dir.join(name),
            None => dest_dir,
        }
    }

    fn run(&self, ctx: &StepContext) -> Result<Artifact, TransformError> {
        let inputs = ctx.resolve(KIND, &self.src)?;
        let mut artifact = Artifact::default();

        for input in &inputs {
            let fail = |e: anyhow::Error| {
                TransformError::new(KIND, format!("{e:#}")).with_file(ctx.display_path(input))
            };
            let bytes = ctx.fs.read(input).map_err(fail)?;
            let target = self.target_for(ctx, input);
            ctx.fs.write(&target, &bytes).map_err(fail)?;

            artifact.bytes_in += bytes.len() as u64;
            artifact.bytes_out += bytes.len() as u64;
            artifact.outputs.push(target);
        }

        debug!(dest = %self.dest, files = inputs.len(), "copied inputs");
        Ok(artifact)
    }
}

impl TransformStep for CopyStep {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn label(&self) -> String {
        format!("{}/", self.dest)
    }

    fn apply<'a>(&'a self, ctx: &'a StepContext) -> BoxFuture<'a, Result<Artifact, TransformError>> {
        let step = self.clone();
        let ctx = ctx.clone();
        Box::pin(run_blocking(KIND, move || step.run(&ctx)))
    }
}
