use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::draft::NodeDraft;
use super::{Extension, Node, Scalar};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NodeRecordError {
    #[error(r#"unknown node type "{0}""#)]
    UnknownType(String),
    #[error("raw_config is not a JSON object: {0}")]
    InvalidRawConfig(String),
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Flat JSON wire shape of a node, as exchanged with storage and HTTP
/// collaborators.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub server: String,
    pub port: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uuid: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub network: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(skip_serializing_if = "is_false")]
    pub tls: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sni: String,
    /// Comma-joined ALPN list.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub alpn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plugin: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub plugin_opts: String,
    #[serde(skip_serializing_if = "is_false")]
    pub allow_insecure: bool,
    /// The extension bag as serialized JSON text.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw_config: String,
}

/// Parses `raw_config` text, keeping only scalar entries.
pub(crate) fn parse_raw_config(raw: &str) -> Result<Extension, NodeRecordError> {
    if raw.trim().is_empty() {
        return Ok(Extension::new());
    }
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| NodeRecordError::InvalidRawConfig(e.to_string()))?;
    Ok(map
        .iter()
        .filter_map(|(k, v)| Scalar::from_json(v).map(|v| (k.clone(), v)))
        .collect())
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        let draft = NodeDraft::from(node);
        let raw_config = if draft.extension.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&draft.extension).unwrap_or_default()
        };
        NodeRecord {
            name: draft.name,
            kind: draft.type_name,
            server: draft.server,
            port: draft.port,
            uuid: draft.uuid,
            password: draft.password,
            method: draft.method,
            network: draft.network,
            path: draft.path,
            host: draft.host,
            tls: draft.tls,
            sni: draft.sni,
            alpn: draft.alpn.join(","),
            plugin: draft.plugin,
            plugin_opts: draft.plugin_opts,
            allow_insecure: draft.allow_insecure,
            raw_config,
        }
    }
}

impl TryFrom<NodeRecord> for Node {
    type Error = NodeRecordError;

    fn try_from(record: NodeRecord) -> Result<Self, Self::Error> {
        let extension = parse_raw_config(&record.raw_config)?;
        NodeDraft {
            type_name: record.kind,
            name: record.name,
            server: record.server,
            port: record.port,
            uuid: record.uuid,
            username: String::new(),
            password: record.password,
            method: record.method,
            network: record.network,
            path: record.path,
            host: record.host,
            tls: record.tls,
            sni: record.sni,
            alpn: super::NodeTlsLayer::parse_alpn(&record.alpn),
            plugin: record.plugin,
            plugin_opts: record.plugin_opts,
            allow_insecure: record.allow_insecure,
            extension,
        }
        .into_node()
    }
}
