//! CLI argument model and validation for the renec deployment binary.
//!
//! Parses flags (with `RENEC_*` environment fallbacks) and turns them into a
//! validated [`renec_deployment::DeploymentConfig`].

pub mod cli_args;
pub mod validation;

pub use cli_args::Cli;
pub use validation::*;
