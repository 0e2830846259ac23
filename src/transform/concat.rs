// src/transform/concat.rs

use tracing::debug;

use crate::errors::TransformError;
use crate::paths::CompiledPathSet;
use crate::transform::{run_blocking, Artifact, StepContext, TransformStep};
use crate::types::BoxFuture;

const KIND: &str = "concat";

/// Concatenates the resolved inputs, in path-set order, into `dest`.
#[derive(Debug, Clone)]
pub struct ConcatStep {
    pub src: CompiledPathSet,
    /// Root-relative destination file.
    pub dest: String,
    pub separator: String,
}

impl ConcatStep {
    fn run(&self, ctx: &StepContext) -> Result<Artifact, TransformError> {
        let inputs = ctx.resolve(KIND, &self.src)?;
        let mut bundle: Vec<u8> = Vec::new();
        let mut bytes_in = 0u64;

        for (i, path) in inputs.iter().enumerate() {
            let bytes = ctx.fs.read(path).map_err(|e| {
                TransformError::new(KIND, format!("{e:#}")).with_file(ctx.display_path(path))
            })?;
            bytes_in += bytes.len() as u64;
            if i > 0 {
                bundle.extend_from_slice(self.separator.as_bytes());
            }
            bundle.extend_from_slice(&bytes);
        }

        let dest = ctx.path(&self.dest);
        ctx.fs
            .write(&dest, &bundle)
            .map_err(|e| TransformError::new(KIND, format!("{e:#}")).with_file(&self.dest))?;
        debug!(dest = %self.dest, files = inputs.len(), "concatenated inputs");

        Ok(Artifact {
            outputs: vec![dest],
            bytes_in,
            bytes_out: bundle.len() as u64,
            cached: false,
        })
    }
}

impl TransformStep for ConcatStep {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn label(&self) -> String {
        self.dest.clone()
    }

    fn apply<'a>(&'a self, ctx: &'a StepContext) -> BoxFuture<'a, Result<Artifact, TransformError>> {
        let step = self.clone();
        let ctx = ctx.clone();
        Box::pin(run_blocking(KIND, move || step.run(&ctx)))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn step(patterns: &[&str]) -> ConcatStep {
        let patterns: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        ConcatStep {
            src: CompiledPathSet::compile("js", &patterns).unwrap(),
            dest: "build/all.js".to_string(),
            separator: ";\n".to_string(),
        }
    }

    #[tokio::test]
    async fn modules_come_first_in_declared_order() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("proj/app/b.js", "b");
        fs.add_file("proj/app/a.js", "a");
        fs.add_file("proj/app/z.module.js", "mod");
        let ctx = StepContext::in_memory(PathBuf::from("proj"), fs.clone());

        let artifact = step(&["app/**/*.module.js", "app/**/*.js"]).apply(&ctx).await.unwrap();

        assert_eq!(fs.contents("proj/build/all.js").as_deref(), Some("mod;\na;\nb"));
        assert_eq!(artifact.outputs, vec![PathBuf::from("proj/build/all.js")]);
        assert_eq!(artifact.bytes_in, 5);
        assert_eq!(artifact.bytes_out, 9);
    }

    #[tokio::test]
    async fn empty_input_set_writes_empty_bundle() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_dir("proj");
        let ctx = StepContext::in_memory(PathBuf::from("proj"), fs.clone());

        let artifact = step(&["app/**/*.js"]).apply(&ctx).await.unwrap();
        assert_eq!(artifact.bytes_out, 0);
        assert_eq!(fs.contents("proj/build/all.js").as_deref(), Some(""));
    }
}
