//! LDAP-backed directory user lookups.
//!
//! [`Searcher`] owns a single directory connection established from a
//! [`DirectoryConfig`](dirlookup_core::DirectoryConfig) and resolves [`Identifier`]s into
//! [`UserRecord`]s.

#![deny(missing_docs)]

mod client;
mod filter;

pub use client::{LdapEntry, Searcher};
pub use dirlookup_core::{DirectoryConfig, Error, Identifier, IdentifierKind, UserRecord};
pub use filter::{escape_filter_value, extract_hostname, identifier_filter};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = dirlookup_core::Result<T>;
