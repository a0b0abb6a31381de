//! Configuration loading, validation, and env substitution.
//!
//! Config files: `shelfscan.toml`, `shelfscan.yaml`, or `shelfscan.json`
//! Searched in `./` then `~/.config/shelfscan/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw
//! file text before parsing.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        BrowserConfig, ConvergenceConfig, CountPattern, OutputConfig, ParserConfig,
        ShelfscanConfig, TargetConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
