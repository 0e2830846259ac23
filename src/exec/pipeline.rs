// src/exec/pipeline.rs

use tracing::{debug, info};

use crate::dag::TaskAction;
use crate::errors::TransformError;
use crate::transform::{StepContext, TransformStep};
use crate::types::BoxFuture;

/// A task body made of transform steps, applied in declaration order.
///
/// The first failing step fails the task; later steps do not run.
#[derive(Debug, Default)]
pub struct StepPipeline {
    steps: Vec<Box<dyn TransformStep>>,
}

impl StepPipeline {
    pub fn new(steps: Vec<Box<dyn TransformStep>>) -> Self {
        Self { steps }
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl TaskAction for StepPipeline {
    fn run<'a>(&'a self, task: &'a str, ctx: &'a StepContext) -> BoxFuture<'a, Result<(), TransformError>> {
        Box::pin(async move {
            for (index, step) in self.steps.iter().enumerate() {
                debug!(task = %task, step = step.kind(), index, label = %step.label(), "applying step");
                let artifact = step.apply(ctx).await?;

                if artifact.cached {
                    continue;
                }
                if !artifact.outputs.is_empty() {
                    info!(
                        task = %task,
                        step = step.kind(),
                        label = %step.label(),
                        "{}",
                        artifact.size_report()
                    );
                }
            }
            Ok(())
        })
    }
}
