use serde::Deserialize;
use serde_json::Value;

use super::decode::{DecodeError, DecodeResult, NodeCollector};
use super::Subscription;
use crate::coerce::Lenient;
use crate::node::draft::NodeDraft;
use crate::node::Node;

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Sip008 {
    FullFormat { servers: Vec<Value> },
    BasicFormat(Vec<Value>),
}

#[derive(Debug, Clone, Deserialize)]
struct Sip008Server {
    remarks: Option<String>,
    server: String,
    server_port: Lenient<u16>,
    method: String,
    password: String,
    #[serde(default)]
    plugin: String,
    #[serde(default)]
    plugin_opts: String,
    // Custom fields are allowed.
    // https://shadowsocks.org/doc/sip008.html
}

impl From<Sip008Server> for NodeDraft {
    fn from(s: Sip008Server) -> Self {
        let mut draft = NodeDraft::new("ss");
        draft.name = s.remarks.map(|r| r.trim().to_string()).unwrap_or_default();
        draft.server = s.server.trim().into();
        draft.port = s.server_port.0;
        draft.method = s.method;
        draft.password = s.password;
        draft.plugin = s.plugin;
        draft.plugin_opts = s.plugin_opts;
        draft
    }
}

/// A `{"servers": [...]}` document or a bare array of server records. Each
/// record stands alone; one bad record does not spoil the rest.
pub fn decode_sip008(text: &str) -> DecodeResult<Subscription> {
    let doc: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let servers = match serde_json::from_value(doc).map_err(|_| DecodeError::UnknownShape)? {
        Sip008::FullFormat { servers } | Sip008::BasicFormat(servers) => servers,
    };

    let mut out = NodeCollector::default();
    for (idx, server) in servers.iter().enumerate() {
        out.push_result(idx + 1, node_from_server(server));
    }
    Ok(out.finish())
}

/// Reads one SIP008 server record. The error is the skip reason.
pub(super) fn node_from_server(server: &Value) -> Result<Node, String> {
    let server =
        Sip008Server::deserialize(server).map_err(|e| format!("invalid SIP008 server: {e}"))?;
    NodeDraft::from(server)
        .into_node()
        .map_err(|e| e.to_string())
}
