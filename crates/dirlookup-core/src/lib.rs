//! # dirlookup-core
//!
//! Core types and configuration loading for directory user lookups.
//!
//! This crate carries everything that does not need a network connection: the error type,
//! the connection configuration and the layered loader that resolves it, identifiers and the
//! user record produced by a lookup.
//!
//! ## Modules
//!
//! - [`error`] - Error type shared by every lookup crate
//! - [`config`] - Connection configuration and the structured file model
//! - [`loader`] - Layered configuration loading (file, secrets, environment variables)
//! - [`environment`] - Active environment name resolution
//! - [`secret`] - Best-effort secret file reading
//! - [`identifier`] - Typed lookup identifiers
//! - [`user`] - Normalized user record

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod environment;
pub mod error;
pub mod identifier;
pub mod loader;
pub mod secret;
pub mod user;

// Re-export commonly used types
pub use config::{ConfigFile, DirectoryConfig, EnvironmentLayer};
pub use error::{Error, Result};
pub use identifier::{Identifier, IdentifierKind};
pub use loader::{load_config, ConfigLoader};
pub use user::UserRecord;
