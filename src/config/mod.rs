// src/config/mod.rs

//! `Assetdag.toml`: model, loading, validation, and conversion into the
//! runtime pieces (registry, watch groups, server plan).

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::{build_registry, build_watch_groups, serve_plan, ServePlan};
pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ConfigFile, ConfigSection, InjectBlockConfig, LiveReloadConfig, RawConfigFile, ServeConfig,
    ServeEnvConfig, StepConfig, TaskConfig, WatchConfig,
};
