use serde_json::{Map, Value};

use super::decode::{DecodeError, DecodeResult, NodeCollector};
use super::sip008::node_from_server;
use super::Subscription;
use crate::coerce::{
    coerce_bool, coerce_int, coerce_port, coerce_string, first_bool, first_of, first_string,
    first_trimmed,
};
use crate::node::draft::NodeDraft;
use crate::node::record::parse_raw_config;
use crate::node::{Node, NodeKind, NodeRecordError, NodeTlsLayer, Scalar};

/// Extension keys read verbatim, with their stored name.
const PASSTHROUGH_KEYS: &[(&str, &[&str])] = &[
    ("flow", &["flow"]),
    ("scy", &["scy"]),
    ("obfs", &["obfs"]),
    ("protocol", &["protocol"]),
    ("obfsparam", &["obfsparam", "obfs-param"]),
    ("protoparam", &["protoparam", "protocol-param"]),
];

fn nested<'a>(obj: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (last, parents) = path.split_last()?;
    let mut cur = obj;
    for key in parents {
        cur = cur.get(*key)?.as_object()?;
    }
    cur.get(*last)
}

fn nested_string(obj: &Map<String, Value>, path: &[&str]) -> Option<String> {
    nested(obj, path).and_then(coerce_string)
}

fn read_alpn(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => NodeTlsLayer::parse_alpn(s),
        Value::Array(items) => items
            .iter()
            .filter_map(coerce_string)
            .map(|s| s.trim().to_string())
            .collect(),
        _ => vec![],
    }
}

/// `{"mode": "tls", "host": "a.co"}` becomes `mode=tls;host=a.co`.
pub(super) fn join_plugin_opts(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .filter_map(|(k, v)| coerce_string(v).map(|v| format!("{k}={v}")))
                .collect::<Vec<_>>()
                .join(";"),
        ),
        v => coerce_string(v),
    }
}

fn read_tls(obj: &Map<String, Value>) -> bool {
    match first_of(obj, &["tls"]) {
        Some(Value::String(s)) if s.trim().eq_ignore_ascii_case("tls") => true,
        Some(v) => coerce_bool(v).unwrap_or(false),
        None => false,
    }
}

/// Builds a node from a loosely typed object, tolerating the field spellings
/// of the common producers. Aliases follow primary-wins precedence.
pub(super) fn node_from_object(obj: &Map<String, Value>) -> Result<Node, NodeRecordError> {
    let type_name = first_trimmed(obj, &["type"]).unwrap_or_default();
    let kind = NodeKind::from_type_name(&type_name);
    let mut draft = NodeDraft::new(type_name);

    draft.extension = match first_of(obj, &["raw_config"]) {
        Some(Value::String(raw)) => parse_raw_config(raw)?,
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(k, v)| Scalar::from_json(v).map(|v| (k.clone(), v)))
            .collect(),
        _ => Default::default(),
    };

    draft.name = first_string(obj, &["name", "remarks", "ps"]).unwrap_or_default();
    draft.server = first_trimmed(obj, &["server", "add", "address"]).unwrap_or_default();
    draft.port = first_of(obj, &["port", "server_port"])
        .and_then(coerce_port)
        .unwrap_or(0);
    draft.uuid = first_string(obj, &["uuid", "id"]).unwrap_or_default();
    draft.username = first_string(obj, &["username"]).unwrap_or_default();
    draft.password = first_string(obj, &["password"]).unwrap_or_default();

    let method = first_string(obj, &["method", "cipher"]).unwrap_or_default();
    if kind == Some(NodeKind::VMess) {
        if !method.is_empty() {
            draft.set_ext("scy", method);
        }
    } else {
        draft.method = method;
    }

    draft.network = first_trimmed(obj, &["network", "net"]).unwrap_or_default();
    draft.path = first_string(obj, &["path", "ws-path"])
        .or_else(|| nested_string(obj, &["ws-opts", "path"]))
        .unwrap_or_default();
    draft.host = first_string(obj, &["host"])
        .or_else(|| nested_string(obj, &["ws-headers", "Host"]))
        .or_else(|| nested_string(obj, &["ws-opts", "headers", "Host"]))
        .unwrap_or_default();

    draft.tls = read_tls(obj);
    draft.sni = first_string(obj, &["sni", "servername", "peer"]).unwrap_or_default();
    draft.alpn = first_of(obj, &["alpn", "alpns"])
        .map(read_alpn)
        .unwrap_or_default();
    draft.allow_insecure =
        first_bool(obj, &["allow_insecure", "allowInsecure", "skip-cert-verify"]).unwrap_or(false);

    draft.plugin = first_string(obj, &["plugin"]).unwrap_or_default();
    draft.plugin_opts = first_of(obj, &["plugin_opts", "plugin-opts", "pluginOpts"])
        .and_then(join_plugin_opts)
        .unwrap_or_default();

    if let Some(udp) = first_bool(obj, &["udp"]) {
        draft.set_ext("udp", udp);
    }
    if let Some(aid) = first_of(obj, &["aid", "alterId"]).and_then(coerce_int) {
        draft.set_ext("aid", aid);
    }
    for (stored, keys) in PASSTHROUGH_KEYS {
        if let Some(v) = first_string(obj, keys) {
            draft.set_ext(stored, v);
        }
    }

    draft.into_node()
}

/// A bare array of node objects, or an object with a `servers` or `proxies`
/// array. Elements without a `type` are read as SIP008 server records, the
/// rest as loosely typed node objects.
pub fn decode_json(text: &str) -> DecodeResult<Subscription> {
    let doc: Value =
        serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;
    let items = match &doc {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("servers").or_else(|| obj.get("proxies")) {
            Some(Value::Array(items)) => items,
            _ => return Err(DecodeError::UnknownShape),
        },
        _ => return Err(DecodeError::UnknownShape),
    };

    let mut out = NodeCollector::default();
    for (idx, item) in items.iter().enumerate() {
        match item {
            Value::Object(obj) if !obj.contains_key("type") => {
                out.push_result(idx + 1, node_from_server(item))
            }
            Value::Object(obj) => out.push_result(idx + 1, node_from_object(obj)),
            _ => out.skip(idx + 1, "element is not an object"),
        }
    }
    Ok(out.finish())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::node::protocol::{ShadowsocksPlugin, ShadowsocksProxy, VMessProxy};
    use crate::node::NodeProtocol;
    use crate::subscription::SkippedUnit;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_node_from_object_vmess_aliases() {
        let obj = object(json!({
            "type": "vmess",
            "ps": "hk",
            "add": "a.co",
            "port": "443",
            "id": "uuid-1",
            "aid": "2",
            "cipher": "auto",
            "net": "ws",
            "ws-opts": { "path": "/ws", "headers": { "Host": "cdn.a.co" } },
            "tls": "tls",
            "servername": "sni.a.co",
            "alpns": ["h2", "http/1.1"],
            "skip-cert-verify": "1",
        }));
        let node = node_from_object(&obj).unwrap();
        let mut expected = Node::new(
            "a.co",
            443,
            NodeProtocol::VMess(VMessProxy {
                uuid: "uuid-1".into(),
            }),
        );
        expected.name = "hk".into();
        expected.transport.network = Some("ws".into());
        expected.transport.path = Some("/ws".into());
        expected.transport.host = Some("cdn.a.co".into());
        expected.tls = NodeTlsLayer {
            enabled: true,
            sni: Some("sni.a.co".into()),
            alpn: vec!["h2".into(), "http/1.1".into()],
            skip_cert_check: true,
        };
        expected.extension.insert("aid".into(), Scalar::Int(2));
        expected.extension.insert("scy".into(), "auto".into());
        assert_eq!(node, expected);
    }
    #[test]
    fn test_node_from_object_primary_wins() {
        let obj = object(json!({
            "type": "ss",
            "server": "a.co",
            "port": 1,
            "method": "aes-128-gcm",
            "cipher": "rc4-md5",
            "password": "p",
            "network": "",
            "net": "ws",
            "allowInsecure": false,
            "skip-cert-verify": true,
        }));
        let node = node_from_object(&obj).unwrap();
        assert_eq!(node.transport.network.as_deref(), Some("ws"));
        assert!(!node.tls.skip_cert_check);
        assert_eq!(
            node.protocol,
            NodeProtocol::Shadowsocks(ShadowsocksProxy {
                method: "aes-128-gcm".into(),
                password: "p".into(),
                plugin: None,
            })
        );
    }
    #[test]
    fn test_node_from_object_keeps_credential_whitespace() {
        let obj = object(json!({
            "type": " trojan ",
            "server": " a.co ",
            "port": 443,
            "password": " p ",
            "network": " ws ",
        }));
        let node = node_from_object(&obj).unwrap();
        assert_eq!(node.server, "a.co");
        assert_eq!(node.transport.network.as_deref(), Some("ws"));
        assert_eq!(node.password(), Some(" p "));
    }
    #[test]
    fn test_node_from_object_plugin_opts_object() {
        let obj = object(json!({
            "type": "shadowsocks",
            "server": "a.co",
            "port": 1,
            "cipher": "aes-128-gcm",
            "password": "p",
            "plugin": "obfs",
            "plugin-opts": { "host": "b.co", "mode": "tls" },
            "udp": true,
        }));
        let node = node_from_object(&obj).unwrap();
        assert_eq!(
            node.protocol,
            NodeProtocol::Shadowsocks(ShadowsocksProxy {
                method: "aes-128-gcm".into(),
                password: "p".into(),
                plugin: Some(ShadowsocksPlugin {
                    name: "obfs".into(),
                    opts: "host=b.co;mode=tls".into(),
                }),
            })
        );
        assert_eq!(node.extension.get("udp"), Some(&Scalar::Bool(true)));
    }
    #[test]
    fn test_node_from_object_raw_config() {
        let obj = object(json!({
            "type": "trojan",
            "server": "a.co",
            "port": 443,
            "password": "p",
            "raw_config": r#"{"flow":"x","n":1,"list":[1]}"#,
        }));
        let node = node_from_object(&obj).unwrap();
        assert_eq!(node.extension.get("flow"), Some(&Scalar::Str("x".into())));
        assert_eq!(node.extension.get("n"), Some(&Scalar::Int(1)));
        assert_eq!(node.extension.get("list"), None);

        let obj = object(json!({ "type": "trojan", "raw_config": "[]" }));
        assert!(matches!(
            node_from_object(&obj),
            Err(NodeRecordError::InvalidRawConfig(_))
        ));
    }

    #[test]
    fn test_decode_json_shapes() {
        let item = json!({ "type": "trojan", "server": "a.co", "port": 443, "password": "p" });
        let bare = json!([item.clone()]).to_string();
        let wrapped = json!({ "proxies": [item] }).to_string();
        assert_eq!(decode_json(&bare).unwrap().nodes.len(), 1);
        assert_eq!(decode_json(&wrapped).unwrap().nodes.len(), 1);
        assert_eq!(
            decode_json(r#"{"servers": []}"#),
            Ok(Subscription::default())
        );
        assert_eq!(
            decode_json(r#"{"nodes": []}"#),
            Err(DecodeError::UnknownShape)
        );
        assert_eq!(decode_json("true"), Err(DecodeError::UnknownShape));
        assert!(matches!(
            decode_json("[1,"),
            Err(DecodeError::InvalidJson(_))
        ));
    }
    #[test]
    fn test_decode_json_mixed_sip008_and_generic() {
        let text = json!([
            {
                "server": "s.co",
                "server_port": 8388,
                "method": "aes-128-gcm",
                "password": "p"
            },
            { "type": "trojan", "server": "t.co", "port": 443, "password": "p" },
            { "server": "x.co", "server_port": 1 },
        ])
        .to_string();
        let sub = decode_json(&text).unwrap();
        let kinds: Vec<_> = sub.nodes.iter().map(Node::kind).collect();
        assert_eq!(kinds, [NodeKind::Shadowsocks, NodeKind::Trojan]);
        assert_eq!(sub.skipped.len(), 1);
        assert_eq!(sub.skipped[0].position, 3);
        assert!(sub.skipped[0].reason.starts_with("invalid SIP008 server: "));
    }
    #[test]
    fn test_decode_json_skips() {
        let text = json!([
            1,
            { "type": "vless", "server": "a.co", "port": 1 },
            { "type": "vmess", "server": "a.co", "port": 1 },
            { "type": "http", "server": "a.co", "port": 8080 },
        ])
        .to_string();
        let sub = decode_json(&text).unwrap();
        assert_eq!(sub.nodes.len(), 1);
        assert_eq!(sub.nodes[0].kind(), NodeKind::Http);
        assert_eq!(
            sub.skipped,
            vec![
                SkippedUnit {
                    position: 1,
                    reason: "element is not an object".into(),
                },
                SkippedUnit {
                    position: 2,
                    reason: r#"unknown node type "vless""#.into(),
                },
                SkippedUnit {
                    position: 3,
                    reason: "vmess node lacks required fields".into(),
                },
            ]
        );
    }
}
