//! CLI, configuration, terminal rendering
//!
//! This crate provides the `timedonut` command-line interface.

pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod display;
pub mod error;
pub mod secret;

pub use app::App;
pub use cli::Cli;
pub use error::{ClientError, ClientResult};
