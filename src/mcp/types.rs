//! Connection parameters and MCP descriptor snapshots.

use super::error::{McpError, RedactedParams};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// How to reach an MCP server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ConnectionParams {
    /// Remote server speaking the streamable HTTP transport.
    Http {
        name: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth: Option<AuthConfig>,
    },
    /// Local server spawned as a child process, talking over stdio.
    Stdio {
        name: String,
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        env: Option<HashMap<String, String>>,
    },
}

impl ConnectionParams {
    /// Parse params from an untyped JSON value.
    ///
    /// Unknown `type` tags are reported as `VALIDATION_ERROR` rather than as
    /// a deserialization failure.
    pub fn from_value(value: serde_json::Value) -> Result<Self, McpError> {
        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();

        match tag.as_str() {
            "http" | "stdio" => serde_json::from_value(value).map_err(|e| {
                McpError::validation(format!("Invalid MCP connection parameters: {e}"))
                    .with_original_error(&e)
                    .with_params(RedactedParams::type_only(tag.clone()))
            }),
            other => Err(McpError::validation(format!(
                "Unsupported MCP connection type: {other}"
            ))
            .with_params(RedactedParams::type_only(other))),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Http { name, .. } | Self::Stdio { name, .. } => name,
        }
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::Http { .. } => "http",
            Self::Stdio { .. } => "stdio",
        }
    }

    /// View safe to embed in error metadata and logs.
    pub fn redacted(&self) -> RedactedParams {
        match self {
            Self::Http { name, .. } => RedactedParams {
                kind: self.type_tag().to_string(),
                name: Some(name.clone()),
                command: None,
                args: None,
            },
            Self::Stdio {
                name,
                command,
                args,
                ..
            } => RedactedParams {
                kind: self.type_tag().to_string(),
                name: Some(name.clone()),
                command: Some(command.clone()),
                args: Some(args.clone()),
            },
        }
    }
}

/// Credentials for HTTP servers.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    Bearer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
    #[serde(rename = "oauth2")]
    OAuth2(OAuth2Credentials),
    None,
}

/// OAuth2 token material. Refresh and rotation happen elsewhere.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuth2Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Expiry as a unix timestamp in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_metadata: Option<serde_json::Value>,
}

impl AuthConfig {
    /// Value for the `Authorization` header, if this config yields one.
    pub fn authorization_value(&self) -> Option<String> {
        match self {
            Self::Bearer { token: Some(token) } => Some(format!("Bearer {token}")),
            Self::OAuth2(OAuth2Credentials {
                access_token: Some(token),
                ..
            }) => Some(format!("Bearer {token}")),
            Self::Bearer { token: None } | Self::OAuth2(_) | Self::None => None,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer { token } => f
                .debug_struct("Bearer")
                .field("token", &token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::OAuth2(creds) => fmt::Debug::fmt(creds, f),
            Self::None => f.write_str("None"),
        }
    }
}

impl fmt::Debug for OAuth2Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("OAuth2")
            .field("access_token", &redact(&self.access_token))
            .field("refresh_token", &redact(&self.refresh_token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("scope", &self.scope)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpTool {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "empty_object_schema")]
    pub input_schema: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpResource {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpPrompt {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<PromptArgument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

/// Identity the server reported during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerIdentity {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Result of a single `tools/call`, passed through as the peer sent it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<serde_json::Value>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
    #[serde(
        rename = "structuredContent",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_content: Option<serde_json::Value>,
}

impl ToolCallResult {
    /// Render the content blocks as Markdown.
    ///
    /// Binary blocks are inlined as data URIs; unknown block types are dropped.
    pub fn to_markdown(&self) -> String {
        self.content
            .iter()
            .filter_map(render_block)
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn render_block(block: &serde_json::Value) -> Option<String> {
    let field = |key: &str| block.get(key).and_then(serde_json::Value::as_str);
    let data_uri = || {
        Some(format!(
            "data:{};base64,{}",
            field("mimeType").unwrap_or("application/octet-stream"),
            field("data")?
        ))
    };

    match field("type")? {
        "text" => field("text").map(str::to_string),
        "image" => data_uri().map(|url| format!("![]({url})")),
        "audio" => data_uri().map(|url| format!("<resource type=\"audio\" url=\"{url}\" />")),
        "resource" => {
            let resource = block.get("resource")?;
            Some(format!("<resource type=\"resource\">{resource}</resource>"))
        }
        _ => None,
    }
}

/// Coerce loosely-typed tool arguments into a JSON object.
///
/// Objects pass through, strings holding a JSON object are decoded, and
/// anything else becomes an empty object.
pub fn arguments_from_value(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::String(text) => match serde_json::from_str(&text) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        },
        _ => serde_json::Map::new(),
    }
}
