//! # dialogue-types
//!
//! Shared types for the dialogue management engine.
//!
//! This crate holds the pieces every other crate in the workspace agrees on:
//! - Settings: layered configuration for hosts embedding the engine
//! - Errors: the workspace-level error type
//!
//! ## Usage
//!
//! ```rust
//! use dialogue_types::Settings;
//!
//! let settings = Settings::default();
//! assert_eq!(settings.log_level, "info");
//! ```

pub mod config;
pub mod error;

pub use config::Settings;
pub use error::DialogueError;

