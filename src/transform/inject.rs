// src/transform/inject.rs

use std::path::Path;

use tracing::{debug, warn};

use crate::errors::TransformError;
use crate::paths::path_utils::to_slash;
use crate::paths::CompiledPathSet;
use crate::transform::{run_blocking, Artifact, StepContext, TransformStep};
use crate::types::BoxFuture;

const KIND: &str = "inject";
const END_TAG: &str = "<!-- endinject -->";

/// Files injected between one pair of `<!-- NAME:EXT -->` markers.
#[derive(Debug, Clone)]
pub struct InjectBlock {
    pub name: String,
    pub src: CompiledPathSet,
}

/// Rewrites an HTML page, replacing the content between inject markers with
/// one tag per resolved file, and writes it into the `dest` directory under
/// the page's own file name.
///
/// ```html
/// <!-- inject:css -->
/// <link rel="stylesheet" href="/content/all.min.css">
/// <!-- endinject -->
/// ```
#[derive(Debug, Clone)]
pub struct InjectStep {
    pub target: String,
    pub dest: String,
    pub blocks: Vec<InjectBlock>,
    pub ignore_path: Option<String>,
}

impl InjectStep {
    fn url_for(&self, ctx: &StepContext, path: &Path) -> String {
        let rel = to_slash(&ctx.display_path(path));
        match self.ignore_path.as_deref().and_then(|p| strip_dir(&rel, p)) {
            Some(stripped) => format!("/{stripped}"),
            None => format!("/{rel}"),
        }
    }

    fn run(&self, ctx: &StepContext) -> Result<Artifact, TransformError> {
        let target = ctx.path(&self.target);
        let mut html = ctx.fs.read_to_string(&target).map_err(|e| {
            TransformError::new(KIND, format!("{e:#}")).with_file(&self.target)
        })?;
        let bytes_in = html.len() as u64;

        for block in &self.blocks {
            let files = ctx.resolve(KIND, &block.src)?;
            for ext in ["css", "js", "html"] {
                let tags: Vec<String> = files
                    .iter()
                    .filter(|f| f.extension().is_some_and(|e| e == ext))
                    .filter_map(|f| tag_for(ext, &self.url_for(ctx, f)))
                    .collect();
                if tags.is_empty() {
                    continue;
                }
                let start_tag = format!("<!-- {}:{} -->", block.name, ext);
                match replace_block(&html, &start_tag, &tags) {
                    Some(updated) => {
                        debug!(marker = %start_tag, files = tags.len(), "injected tags");
                        html = updated;
                    }
                    None => warn!(
                        target = %self.target,
                        marker = %start_tag,
                        "inject marker not found, files not injected"
                    ),
                }
            }
        }

        let file_name = target.file_name().ok_or_else(|| {
            TransformError::new(KIND, "target has no file name").with_file(&self.target)
        })?;
        let out = ctx.path(&self.dest).join(file_name);
        ctx.fs.write(&out, html.as_bytes()).map_err(|e| {
            TransformError::new(KIND, format!("{e:#}")).with_file(ctx.display_path(&out))
        })?;

        Ok(Artifact {
            outputs: vec![out],
            bytes_in,
            bytes_out: html.len() as u64,
            cached: false,
        })
    }
}

/// `rel` without the leading directory `prefix`. Only whole path segments
/// match: `build/stage` strips `build/stage/a.js` but not `build/stagex/a.js`.
fn strip_dir<'a>(rel: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        return None;
    }
    let rest = rel.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}

fn tag_for(ext: &str, url: &str) -> Option<String> {
    match ext {
        "js" => Some(format!(r#"<script src="{url}"></script>"#)),
        "css" => Some(format!(r#"<link rel="stylesheet" href="{url}">"#)),
        "html" => Some(format!(r#"<link rel="import" href="{url}">"#)),
        _ => None,
    }
}

/// Replace everything between each `start_tag` and the following end tag.
/// Tags are indented like the start marker. `None` if the marker is absent.
fn replace_block(html: &str, start_tag: &str, tags: &[String]) -> Option<String> {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    let mut found = false;

    while let Some(start) = rest.find(start_tag) {
        let after_start = start + start_tag.len();
        let Some(end_rel) = rest[after_start..].find(END_TAG) else {
            break;
        };
        found = true;

        let line_start = rest[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let indent: String = rest[line_start..start]
            .chars()
            .take_while(|c| c.is_whitespace())
            .collect();

        out.push_str(&rest[..after_start]);
        for tag in tags {
            out.push('\n');
            out.push_str(&indent);
            out.push_str(tag);
        }
        out.push('\n');
        out.push_str(&indent);
        out.push_str(END_TAG);

        rest = &rest[after_start + end_rel + END_TAG.len()..];
    }

    if !found {
        return None;
    }
    out.push_str(rest);
    Some(out)
}

impl TransformStep for InjectStep {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn label(&self) -> String {
        format!("{} -> {}/", self.target, self.dest)
    }

    fn apply<'a>(&'a self, ctx: &'a StepContext) -> BoxFuture<'a, Result<Artifact, TransformError>> {
        let step = self.clone();
        let ctx = ctx.clone();
        Box::pin(run_blocking(KIND, move || step.run(&ctx)))
    }
}
