//! Manifest compilation.

use super::types::{McpPrompt, McpResource, McpTool, ServerIdentity};
use serde::{Deserialize, Serialize};

const DEFAULT_AVATAR: &str = "MCP_AVATAR";

/// Summary of what a server exposes.
///
/// Empty capability classes are absent rather than empty lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<McpTool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<McpResource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<Vec<McpPrompt>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

/// Strip one leading `v` from a version string.
pub fn strip_version_prefix(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

impl Manifest {
    pub fn compile(
        tools: Vec<McpTool>,
        resources: Vec<McpResource>,
        prompts: Vec<McpPrompt>,
        identity: Option<&ServerIdentity>,
    ) -> Self {
        Self {
            tools: non_empty(tools),
            resources: non_empty(resources),
            prompts: non_empty(prompts),
            title: identity.and_then(|id| id.title.clone()),
            version: identity
                .and_then(|id| id.version.as_deref())
                .map(|v| strip_version_prefix(v).to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_none()
            && self.resources.is_none()
            && self.prompts.is_none()
            && self.title.is_none()
            && self.version.is_none()
    }

    /// One-line summary such as `files MCP server has 3 tools,1 prompts`.
    pub fn describe(&self, identifier: &str) -> String {
        let counts = [
            ("tools", self.tools.as_ref().map(Vec::len)),
            ("resources", self.resources.as_ref().map(Vec::len)),
            ("prompts", self.prompts.as_ref().map(Vec::len)),
        ]
        .into_iter()
        .filter_map(|(label, count)| count.map(|n| format!("{n} {label}")))
        .collect::<Vec<_>>();

        if counts.is_empty() {
            format!("{identifier} MCP server")
        } else {
            format!("{identifier} MCP server has {}", counts.join(","))
        }
    }

    /// Wrap this manifest into a plugin description for a tool host.
    pub fn to_plugin(&self, identifier: &str, metadata: Option<PluginMetadata>) -> PluginManifest {
        let metadata = metadata.unwrap_or_default();
        let api = self
            .tools
            .iter()
            .flatten()
            .map(|tool| PluginApi {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.input_schema.clone(),
            })
            .collect();

        PluginManifest {
            identifier: identifier.to_string(),
            api,
            meta: PluginMeta {
                title: metadata.name.unwrap_or_else(|| identifier.to_string()),
                description: metadata
                    .description
                    .unwrap_or_else(|| self.describe(identifier)),
                avatar: metadata
                    .avatar
                    .unwrap_or_else(|| DEFAULT_AVATAR.to_string()),
            },
            manifest: self.clone(),
        }
    }
}

/// Caller-supplied display overrides for [`Manifest::to_plugin`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMetadata {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginApi {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginMeta {
    pub title: String,
    pub description: String,
    pub avatar: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginManifest {
    pub identifier: String,
    pub api: Vec<PluginApi>,
    pub meta: PluginMeta,
    #[serde(flatten)]
    pub manifest: Manifest,
}
