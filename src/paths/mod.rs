// src/paths/mod.rs

//! Path sets: ordered glob collections resolved lazily against the project
//! root.
//!
//! - [`pathset`] compiles patterns and resolves them to ordered file lists.
//! - [`catalog`] holds the named sets from `[paths]` and expands `@name`
//!   references and the `{stage}` placeholder.
//! - [`path_utils`] has the small path helpers shared with the watchers.

pub mod catalog;
pub mod path_utils;
pub mod pathset;

pub use catalog::{PathCatalog, STAGE_PLACEHOLDER};
pub use pathset::{CompiledPathSet, PathSet};
