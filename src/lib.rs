//! MCP client subsystem.
//!
//! Connects to Model Context Protocol servers over streamable HTTP or stdio,
//! diagnoses failed stdio startups, compiles capability manifests and
//! invokes tools under a bounded timeout.
//!
//! # Modules
//!
//! - [`config`]: process-wide client settings and CLI arguments
//! - [`mcp`]: sessions, transports, error taxonomy and manifests

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]

pub mod config;
pub mod mcp;
