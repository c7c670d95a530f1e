//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration management (init, show, path)
//! - [`run`] - Main command (fan a batch manifest out through the scheduler)

pub mod config;
pub mod run;
