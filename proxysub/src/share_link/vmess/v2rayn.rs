use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::coerce::{coerce_int, coerce_port, first_string, first_trimmed, Lenient};
use crate::node::protocol::VMessProxy;
use crate::node::{Node, NodeProtocol, NodeTlsLayer, Scalar};
use crate::share_link::decode::{
    decode_base64_lenient, percent_decode_utf8, DecodeError, DecodeResult,
};
use crate::share_link::encode::{EncodeError, EncodeResult};

const DEFAULT_NAME: &str = "VMess Node";

#[derive(Serialize)]
struct V2raynDoc<'a> {
    #[serde(rename = "v")]
    version: Lenient<u8>,
    #[serde(rename = "ps")]
    name: &'a str,
    #[serde(rename = "add")]
    host: &'a str,
    port: u16,
    #[serde(rename = "id")]
    user_id: &'a str,
    #[serde(rename = "aid")]
    alter_id: i64,
    #[serde(rename = "scy", skip_serializing_if = "Option::is_none")]
    security: Option<&'a str>,
    #[serde(rename = "net")]
    obfs_type: &'a str,
    #[serde(rename = "type")]
    header_type: &'a str,
    #[serde(rename = "host")]
    obfs_host: &'a str,
    #[serde(rename = "path")]
    obfs_path: &'a str,
    tls: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    sni: &'a str,
    #[serde(skip_serializing_if = "String::is_empty")]
    alpn: String,
}

/// Decodes the v2rayN flavour: Base64 of a loosely typed JSON object.
pub(crate) fn decode_v2rayn(body: &str) -> DecodeResult<Node> {
    let b64 = percent_decode_utf8(body.trim())?;
    let doc = decode_base64_lenient(&b64).ok_or(DecodeError::InvalidEncoding)?;
    let doc: Map<String, Value> =
        serde_json::from_slice(&doc).map_err(|_| DecodeError::InvalidEncoding)?;

    let server = first_trimmed(&doc, &["add"]).ok_or(DecodeError::MissingInfo("server"))?;
    let port = doc
        .get("port")
        .and_then(coerce_port)
        .ok_or(DecodeError::MissingInfo("port"))?;
    let uuid = first_string(&doc, &["id"]).ok_or(DecodeError::MissingInfo("uuid"))?;

    let mut node = Node::new(server, port, NodeProtocol::VMess(VMessProxy { uuid }));
    node.name = first_string(&doc, &["ps"]).unwrap_or_else(|| DEFAULT_NAME.into());
    node.transport.network = Some(first_trimmed(&doc, &["net"]).unwrap_or_else(|| "tcp".into()));
    node.transport.path = Some(first_string(&doc, &["path"]).unwrap_or_else(|| "/".into()));
    node.transport.host = first_string(&doc, &["host"]);
    node.tls = NodeTlsLayer {
        enabled: first_string(&doc, &["tls"])
            .filter(|t| t.trim().eq_ignore_ascii_case("tls"))
            .is_some(),
        sni: first_string(&doc, &["sni"]),
        alpn: first_string(&doc, &["alpn"])
            .map(|a| NodeTlsLayer::parse_alpn(&a))
            .unwrap_or_default(),
        skip_cert_check: false,
    };

    if let Some(aid) = doc.get("aid").and_then(coerce_int) {
        node.extension.insert("aid".into(), Scalar::Int(aid));
    }
    if let Some(scy) = first_string(&doc, &["scy"]) {
        node.extension.insert("scy".into(), Scalar::Str(scy));
    }
    if let Some(header_type) = first_string(&doc, &["type"]).filter(|t| t != "none") {
        node.extension.insert("type".into(), Scalar::Str(header_type));
    }
    Ok(node)
}

pub(crate) fn encode_v2rayn(vmess: &VMessProxy, node: &Node) -> EncodeResult<String> {
    if vmess.uuid.is_empty() {
        return Err(EncodeError::MissingInfo("uuid"));
    }
    let alter_id = match node.extension.get("aid") {
        Some(Scalar::Int(aid)) => *aid,
        Some(Scalar::Str(aid)) => aid.trim().parse().unwrap_or(0),
        _ => 0,
    };
    let alpn = node.tls.alpn.join(",");
    let doc = V2raynDoc {
        version: 2.into(),
        name: &node.name,
        host: &node.server,
        port: node.port,
        user_id: &vmess.uuid,
        alter_id,
        security: node.extension_str("scy"),
        obfs_type: node.transport.network.as_deref().unwrap_or("tcp"),
        header_type: node.extension_str("type").unwrap_or("none"),
        obfs_host: node.transport.host.as_deref().unwrap_or_default(),
        obfs_path: node.transport.path.as_deref().unwrap_or_default(),
        tls: if node.tls.enabled { "tls" } else { "" },
        sni: node.tls.sni.as_deref().unwrap_or_default(),
        alpn: if node.tls.enabled { alpn } else { String::new() },
    };

    let doc =
        serde_json::to_string(&doc).map_err(|_| EncodeError::UnsupportedComponent("json"))?;
    Ok("vmess://".to_owned() + &STANDARD.encode(doc.as_bytes()))
}
