//! Server definitions file (`mcp.json`).
//!
//! ```json
//! {
//!   "mcpServers": {
//!     "time": { "command": "npx", "args": ["-y", "@mcpcentral/mcp-time"] },
//!     "tavily": {
//!       "url": "https://mcp.tavily.com/mcp/",
//!       "auth": { "type": "bearer", "token": "${TAVILY_API_KEY}" }
//!     }
//!   }
//! }
//! ```
//!
//! `type` may be omitted: entries with a `command` are stdio servers, entries
//! with a `url` are HTTP servers.

use super::error::McpError;
use super::types::ConnectionParams;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeMap, fs, io, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServersFileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("no MCP server named `{0}`")]
    UnknownServer(String),
    #[error(transparent)]
    Invalid(#[from] McpError),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct McpServersFile {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: BTreeMap<String, Value>,
}

impl McpServersFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServersFileError> {
        let path = path.as_ref();
        let txt = fs::read_to_string(path).map_err(|source| ServersFileError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&txt).map_err(|source| ServersFileError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.mcp_servers.keys().map(String::as_str)
    }

    /// Resolve one entry into connection parameters.
    ///
    /// Placeholders are expanded, the entry name becomes the connection name
    /// unless one is given, and a missing `type` is inferred.
    pub fn connection_params(&self, server: &str) -> Result<ConnectionParams, ServersFileError> {
        let entry = self
            .mcp_servers
            .get(server)
            .ok_or_else(|| ServersFileError::UnknownServer(server.to_string()))?;

        let mut entry = expand_env_value(entry.clone());
        if let Value::Object(fields) = &mut entry {
            fields
                .entry("name")
                .or_insert_with(|| Value::String(server.to_string()));
            if !fields.contains_key("type") {
                let inferred = if fields.contains_key("command") {
                    Some("stdio")
                } else if fields.contains_key("url") {
                    Some("http")
                } else {
                    None
                };
                if let Some(kind) = inferred {
                    fields.insert("type".to_string(), Value::String(kind.to_string()));
                }
            }
        }

        Ok(ConnectionParams::from_value(entry)?)
    }
}

/// Expand `${VAR}` placeholders from the process environment.
///
/// Unknown variables are left as written.
pub fn expand_env_placeholders(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let key = &after[..end];
                let value = (!key.is_empty() && !key.contains('='))
                    .then(|| std::env::var(key).ok())
                    .flatten();
                match value {
                    Some(value) => out.push_str(&value),
                    None => out.push_str(&rest[start..start + 2 + end + 1]),
                }
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

fn expand_env_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_env_placeholders(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(expand_env_value).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k, expand_env_value(v)))
                .collect(),
        ),
        other => other,
    }
}
