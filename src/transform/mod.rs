// src/transform/mod.rs

//! Transform steps: the leaf units of work inside a task.
//!
//! A step is a function of its resolved inputs and its configuration whose
//! side effect is writing a destination under the project root. The
//! orchestrator only sees the [`TransformStep`] trait; the variants are:
//!
//! - [`command::CommandStep`]: an external tool run through the shell.
//! - [`concat::ConcatStep`]: bundling by concatenation, in path-set order.
//! - [`copy::CopyStep`]: copying files into a directory (fonts, images).
//! - [`inject::InjectStep`]: writing script/link tags into an HTML page.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::StepConfig;
use crate::errors::{ConfigurationError, TransformError};
use crate::fs::FileSystem;
use crate::paths::{CompiledPathSet, PathCatalog};
use crate::types::BoxFuture;

pub mod cache;
pub mod command;
pub mod concat;
pub mod copy;
pub mod hash;
pub mod inject;

pub use cache::{open_hash_store, FileHashStore, HashStore, MemoryHashStore};

/// Everything a step needs from its surroundings. Cheap to clone.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub hashes: Arc<Mutex<Box<dyn HashStore>>>,
}

impl StepContext {
    pub fn new(root: PathBuf, fs: Arc<dyn FileSystem>, hashes: Box<dyn HashStore>) -> Self {
        Self {
            root,
            fs,
            hashes: Arc::new(Mutex::new(hashes)),
        }
    }

    /// Context with an in-memory hash store.
    pub fn in_memory(root: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self::new(root, fs, Box::new(MemoryHashStore::new()))
    }

    /// Absolute (root-joined) path for a root-relative destination.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Resolve a step's inputs, mapping resolution failures to `step`.
    pub fn resolve(
        &self,
        step: &str,
        set: &CompiledPathSet,
    ) -> Result<Vec<PathBuf>, TransformError> {
        set.resolve(self.fs.as_ref(), &self.root)
            .map_err(|e| TransformError::new(step, format!("resolving inputs: {e:#}")))
    }

    /// Root-relative display form of a path, for errors and logs.
    pub fn display_path(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// What a successful step produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifact {
    /// Files written, root-joined.
    pub outputs: Vec<PathBuf>,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// The step was skipped because its inputs hash was unchanged.
    pub cached: bool,
}

impl Artifact {
    pub fn cached() -> Self {
        Self {
            cached: true,
            ..Self::default()
        }
    }

    /// `12.4 kB → 3.1 kB (25%)`.
    pub fn size_report(&self) -> String {
        let percent = if self.bytes_in == 0 {
            100
        } else {
            (self.bytes_out * 100) / self.bytes_in
        };
        format!(
            "{} → {} ({}%)",
            human_bytes(self.bytes_in),
            human_bytes(self.bytes_out),
            percent
        )
    }
}

fn human_bytes(n: u64) -> String {
    if n < 1000 {
        format!("{n} B")
    } else if n < 1_000_000 {
        format!("{:.1} kB", n as f64 / 1000.0)
    } else {
        format!("{:.1} MB", n as f64 / 1_000_000.0)
    }
}

/// One transform over a file set.
pub trait TransformStep: Send + Sync + Debug {
    /// Variant name, used in logs and [`TransformError::step`].
    fn kind(&self) -> &'static str;

    /// Short human label (the command line, the destination).
    fn label(&self) -> String;

    fn apply<'a>(&'a self, ctx: &'a StepContext) -> BoxFuture<'a, Result<Artifact, TransformError>>;
}

/// Run synchronous step work on the blocking pool.
pub(crate) async fn run_blocking<F>(step: &'static str, work: F) -> Result<Artifact, TransformError>
where
    F: FnOnce() -> Result<Artifact, TransformError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| TransformError::new(step, format!("step panicked: {e}")))?
}

/// Build the step at `index` of `task` from its configuration.
///
/// Patterns go through the catalog (`@name`, `{stage}`) and are compiled
/// here, so a malformed path set is reported before anything runs.
pub fn build_step(
    task: &str,
    index: usize,
    config: &StepConfig,
    catalog: &PathCatalog,
) -> Result<Box<dyn TransformStep>, ConfigurationError> {
    let owner = format!("task.{task}.step[{index}]");
    let compile = |patterns: &[String]| -> Result<CompiledPathSet, ConfigurationError> {
        let expanded = catalog.expand(&owner, patterns)?;
        CompiledPathSet::compile(&owner, &expanded)
    };

    let step: Box<dyn TransformStep> = match config {
        StepConfig::Command {
            cmd,
            src,
            output,
            cache,
        } => Box::new(command::CommandStep {
            cmd: catalog.substitute(cmd),
            src: if src.is_empty() { None } else { Some(compile(src)?) },
            output: output.as_deref().map(|o| catalog.substitute(o)),
            cache_key: cache.then(|| format!("{task}#{index}")),
        }),
        StepConfig::Concat {
            src,
            dest,
            separator,
        } => Box::new(concat::ConcatStep {
            src: compile(src)?,
            dest: catalog.substitute(dest),
            separator: separator.clone(),
        }),
        StepConfig::Copy { src, dest, base } => Box::new(copy::CopyStep {
            src: compile(src)?,
            dest: catalog.substitute(dest),
            base: base.as_deref().map(|b| catalog.substitute(b)),
        }),
        StepConfig::Inject {
            target,
            dest,
            blocks,
            ignore_path,
        } => {
            let mut compiled = Vec::with_capacity(blocks.len());
            for block in blocks {
                compiled.push(inject::InjectBlock {
                    name: block.name.clone(),
                    src: compile(&block.src)?,
                });
            }
            Box::new(inject::InjectStep {
                target: catalog.substitute(target),
                dest: catalog.substitute(dest),
                blocks: compiled,
                ignore_path: ignore_path.as_deref().map(|p| catalog.substitute(p)),
            })
        }
    };
    Ok(step)
}
