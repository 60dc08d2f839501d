use std::collections::BTreeMap;

use super::decode::NodeCollector;
use super::Subscription;
use crate::coerce::parse_flag;
use crate::node::draft::NodeDraft;
use crate::node::{NodeKind, NodeTlsLayer};

/// `key=value` arguments of a proxy line, keys lowercased. A key given twice
/// keeps its last value.
pub(super) type LineArgs<'a> = BTreeMap<String, &'a str>;

pub(super) fn collect_args<'a>(fields: impl IntoIterator<Item = &'a str>) -> LineArgs<'a> {
    fields
        .into_iter()
        .filter_map(|arg| {
            let (k, v) = arg.split_once('=')?;
            Some((k.trim().to_ascii_lowercase(), v.trim()))
        })
        .collect()
}

/// Removes every key in `keys` and returns the value of the first one that is
/// not blank. `keys[0]` is the primary name.
pub(super) fn take_arg(args: &mut LineArgs, keys: &[&str]) -> Option<String> {
    let mut found = None;
    for key in keys {
        if let Some(v) = args.remove(*key) {
            if found.is_none() && !v.is_empty() {
                found = Some(v.to_string());
            }
        }
    }
    found
}

pub(super) fn take_flag(args: &mut LineArgs, keys: &[&str]) -> Option<bool> {
    take_arg(args, keys).map(|v| parse_flag(&v))
}

/// Moves leftover arguments into the extension bag as strings.
pub(super) fn keep_extra_args(draft: &mut NodeDraft, args: LineArgs) {
    for (k, v) in args {
        if !v.is_empty() {
            draft.set_ext(&k, v);
        }
    }
}

/// `Host:a.co|X-Key:v` header list.
fn header_value(headers: &str, name: &str) -> Option<String> {
    headers
        .split('|')
        .filter_map(|kv| kv.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case(name))
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn is_comment(line: &str) -> bool {
    line.starts_with('#') || line.starts_with("//") || line.starts_with(';')
}

fn is_section_header(line: &str) -> bool {
    line.starts_with('[') && line.ends_with(']')
}

fn read_ws(draft: &mut NodeDraft, args: &mut LineArgs) {
    if take_flag(args, &["ws"]).unwrap_or(false) {
        draft.network = "ws".into();
    }
    if let Some(network) = take_arg(args, &["network"]) {
        draft.network = network;
    }
    draft.path = take_arg(args, &["ws-path", "path"]).unwrap_or_default();
    let headers = args.remove("ws-headers").unwrap_or_default();
    draft.host = take_arg(args, &["host"])
        .or_else(|| header_value(headers, "Host"))
        .unwrap_or_default();
}

fn read_tls(draft: &mut NodeDraft, args: &mut LineArgs) {
    if let Some(tls) = take_flag(args, &["tls"]) {
        draft.tls = tls;
    }
    draft.sni = take_arg(args, &["sni"])
        .filter(|sni| sni != "off")
        .unwrap_or_default();
    draft.allow_insecure = take_flag(args, &["skip-cert-verify"]).unwrap_or(false);
}

/// Parses `name = type, server, port, ...`. `Ok(None)` means the line names a
/// built-in policy rather than a proxy.
fn decode_surge_proxy_line(line: &str) -> Result<Option<NodeDraft>, &'static str> {
    let (name, rest) = line.split_once('=').ok_or("not a proxy line")?;
    let mut fields = rest.split(',').map(str::trim);
    let type_name = fields.next().unwrap_or_default().to_ascii_lowercase();
    if matches!(
        &*type_name,
        "direct" | "reject" | "reject-tinygif" | "reject-drop"
    ) {
        return Ok(None);
    }
    let server = fields.next().filter(|s| !s.is_empty()).ok_or("server is missing")?;
    let port = fields
        .next()
        .ok_or("port is missing")?
        .parse::<u16>()
        .map_err(|_| "port is not a number")?;

    let mut draft = NodeDraft::new(type_name);
    draft.name = name.trim().into();
    draft.server = server.into();
    draft.port = port;

    let mut fields = fields.peekable();
    let kind = NodeKind::from_type_name(&draft.type_name);
    if matches!(kind, Some(NodeKind::Http | NodeKind::Socks)) {
        if let Some(user) = fields.next_if(|f| !f.contains('=')) {
            draft.username = user.into();
            if let Some(pass) = fields.next_if(|f| !f.contains('=')) {
                draft.password = pass.into();
            }
        }
    }
    let mut args = collect_args(fields);
    args.remove("group");
    args.remove("no-error-alert");

    read_tls(&mut draft, &mut args);
    match kind {
        Some(NodeKind::Shadowsocks) => {
            draft.method = take_arg(&mut args, &["encrypt-method", "method"]).unwrap_or_default();
            draft.password = take_arg(&mut args, &["password"]).unwrap_or_default();
            draft.plugin = take_arg(&mut args, &["plugin"]).unwrap_or_default();
            draft.plugin_opts = take_arg(&mut args, &["plugin-opts"]).unwrap_or_default();
            if let Some(obfs) = take_arg(&mut args, &["obfs"]) {
                let mut opts = vec![format!("obfs={obfs}")];
                if let Some(host) = take_arg(&mut args, &["obfs-host"]) {
                    opts.push(format!("obfs-host={host}"));
                }
                if let Some(uri) = take_arg(&mut args, &["obfs-uri"]) {
                    opts.push(format!("obfs-uri={uri}"));
                }
                draft.plugin = "obfs".into();
                draft.plugin_opts = opts.join(";");
            }
            if let Some(udp) = take_flag(&mut args, &["udp-relay"]) {
                draft.set_ext("udp", udp);
            }
        }
        Some(NodeKind::VMess) => {
            draft.uuid = take_arg(&mut args, &["username", "uuid"]).unwrap_or_default();
            if let Some(scy) = take_arg(&mut args, &["encrypt-method"]) {
                draft.set_ext("scy", scy);
            }
            read_ws(&mut draft, &mut args);
        }
        Some(NodeKind::Trojan) => {
            draft.password = take_arg(&mut args, &["password"]).unwrap_or_default();
            draft.alpn = take_arg(&mut args, &["alpn"])
                .map(|a| NodeTlsLayer::parse_alpn(&a))
                .unwrap_or_default();
            read_ws(&mut draft, &mut args);
        }
        Some(NodeKind::Http | NodeKind::Socks) => {
            if let Some(user) = take_arg(&mut args, &["username"]) {
                draft.username = user;
            }
            if let Some(pass) = take_arg(&mut args, &["password"]) {
                draft.password = pass;
            }
            if let Some(udp) = take_flag(&mut args, &["udp", "udp-relay"]) {
                draft.set_ext("udp", udp);
            }
        }
        Some(NodeKind::ShadowsocksR) | None => {}
    }
    keep_extra_args(&mut draft, args);
    Ok(Some(draft))
}

/// Reads the `[Proxy]` section of a Surge config, or every line when the
/// document has no section headers at all.
pub fn decode_surge_proxy_list(text: &str) -> Subscription {
    let mut out = NodeCollector::default();
    let has_sections = text.lines().any(|l| is_section_header(l.trim()));
    let mut in_proxy_section = !has_sections;

    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || is_comment(line) {
            continue;
        }
        if is_section_header(line) {
            in_proxy_section = line.eq_ignore_ascii_case("[Proxy]");
            continue;
        }
        if !in_proxy_section || !line.contains('=') {
            continue;
        }
        match decode_surge_proxy_line(line) {
            Ok(Some(draft)) => out.push_result(idx + 1, draft.into_node()),
            Ok(None) => {}
            Err(reason) => out.skip(idx + 1, reason),
        }
    }
    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::protocol::{
        HttpProxy, ShadowsocksPlugin, ShadowsocksProxy, SocksProxy, TrojanProxy, VMessProxy,
    };
    use crate::node::{Node, NodeProtocol, Scalar};
    use crate::subscription::SkippedUnit;

    fn decode_one(line: &str) -> Node {
        let mut sub = decode_surge_proxy_list(line);
        assert_eq!(sub.skipped, vec![], "{line}");
        sub.nodes.pop().expect(line)
    }

    #[test]
    fn test_decode_surge_proxy_list() {
        let data = "
            // # aa = ss , a.com , 11451 , encrypt-method = aes-256-cfb , password = abc
            aa = ss , a.com , 11451 , group = g , no-error-alert = t , encrypt-method = aes-256-cfb , password = abc , udp-relay = true , kk
        ";
        let mut expected = Node::new(
            "a.com",
            11451,
            NodeProtocol::Shadowsocks(ShadowsocksProxy {
                method: "aes-256-cfb".into(),
                password: "abc".into(),
                plugin: None,
            }),
        );
        expected.name = "aa".into();
        expected.extension.insert("udp".into(), Scalar::Bool(true));
        assert_eq!(
            decode_surge_proxy_list(data),
            Subscription {
                nodes: vec![expected],
                skipped: vec![],
            }
        );
    }

    #[test]
    fn test_decode_surge_proxy_list_tls() {
        let cases = [
            (
                "aa = ss, a.com, 114, encrypt-method=aes-256-cfb, password=abc, tls=true, sni=b.com, skip-cert-verify=false",
                NodeTlsLayer {
                    enabled: true,
                    sni: Some("b.com".into()),
                    alpn: vec![],
                    skip_cert_check: false,
                },
            ),
            (
                "aa = https, a.com, 114",
                NodeTlsLayer {
                    enabled: true,
                    ..Default::default()
                },
            ),
            (
                "aa = trojan, a.com, 114, password=abc, sni=off, alpn=h2, skip-cert-verify=1",
                NodeTlsLayer {
                    enabled: true,
                    sni: None,
                    alpn: vec!["h2".into()],
                    skip_cert_check: true,
                },
            ),
            (
                "aa = socks5-tls, a.com, 114",
                NodeTlsLayer {
                    enabled: true,
                    ..Default::default()
                },
            ),
        ];
        for (data, expected_tls) in cases {
            assert_eq!(decode_one(data).tls, expected_tls, "{data}");
        }
    }

    #[test]
    fn test_decode_surge_proxy_list_obfs() {
        let cases = [
            (
                "aa = ss, a.com, 114, encrypt-method=aes-256-cfb, password=abc, obfs=http, obfs-host=b.com, obfs-uri=/path",
                "obfs=http;obfs-host=b.com;obfs-uri=/path",
            ),
            (
                "aa = ss, a.com, 114, encrypt-method=aes-256-cfb, password=abc, obfs=tls",
                "obfs=tls",
            ),
        ];
        for (data, expected_opts) in cases {
            assert_eq!(
                decode_one(data).protocol,
                NodeProtocol::Shadowsocks(ShadowsocksProxy {
                    method: "aes-256-cfb".into(),
                    password: "abc".into(),
                    plugin: Some(ShadowsocksPlugin {
                        name: "obfs".into(),
                        opts: expected_opts.into(),
                    }),
                }),
                "{data}"
            );
        }
    }

    #[test]
    fn test_decode_surge_proxy_list_ws() {
        let node = decode_one(
            "aa = vmess, a.com, 114, username=2222-3333, ws=true, ws-path=/path, ws-headers=H1:V1|Host:c.com|HH, encrypt-method=aes-128-gcm",
        );
        assert_eq!(
            node.protocol,
            NodeProtocol::VMess(VMessProxy {
                uuid: "2222-3333".into()
            })
        );
        assert_eq!(node.transport.network.as_deref(), Some("ws"));
        assert_eq!(node.transport.path.as_deref(), Some("/path"));
        assert_eq!(node.transport.host.as_deref(), Some("c.com"));
        assert_eq!(node.extension_str("scy"), Some("aes-128-gcm"));
    }

    #[test]
    fn test_decode_surge_proxy_list_protocol() {
        let cases = [
            (
                "aa = http, a.com, 114, always-use-connect=true",
                NodeProtocol::Http(HttpProxy::default()),
                None,
            ),
            (
                "aa = https, a.com, 114, user, pass",
                NodeProtocol::Http(HttpProxy {
                    password: "pass".into(),
                }),
                Some("user"),
            ),
            (
                "aa = socks5, a.com, 114, user, pass",
                NodeProtocol::Socks(SocksProxy {
                    password: "pass".into(),
                }),
                Some("user"),
            ),
            (
                "aa = socks5, a.com, 114, username=u2, password=p2",
                NodeProtocol::Socks(SocksProxy {
                    password: "p2".into(),
                }),
                Some("u2"),
            ),
            (
                "aa = trojan, a.com, 114, password=abc",
                NodeProtocol::Trojan(TrojanProxy {
                    password: "abc".into(),
                }),
                None,
            ),
        ];
        for (data, expected_protocol, expected_user) in cases {
            let node = decode_one(data);
            assert_eq!(node.protocol, expected_protocol, "{data}");
            assert_eq!(node.extension_str("username"), expected_user, "{data}");
        }
    }

    #[test]
    fn test_decode_surge_proxy_list_sections() {
        let data = "[General]\nloglevel = notify\n[Proxy]\nDIRECT = direct\n; note\naa = http, a.com, 114\n[Rule]\nFINAL = proxy\n";
        let sub = decode_surge_proxy_list(data);
        assert_eq!(sub.nodes.len(), 1);
        assert_eq!(sub.nodes[0].name, "aa");
        assert_eq!(sub.skipped, vec![]);
    }

    #[test]
    fn test_decode_surge_proxy_list_invalid() {
        let data = "aa = ss\naa = ss, a.com\naa = ss, a.com, 114514\naa = snell, a.com, 1\naa = ss, a.com, 1, password=p\n";
        let sub = decode_surge_proxy_list(data);
        assert_eq!(sub.nodes, vec![]);
        assert_eq!(
            sub.skipped,
            vec![
                SkippedUnit {
                    position: 1,
                    reason: "server is missing".into(),
                },
                SkippedUnit {
                    position: 2,
                    reason: "port is missing".into(),
                },
                SkippedUnit {
                    position: 3,
                    reason: "port is not a number".into(),
                },
                SkippedUnit {
                    position: 4,
                    reason: r#"unknown node type "snell""#.into(),
                },
                SkippedUnit {
                    position: 5,
                    reason: "ss node lacks required fields".into(),
                },
            ]
        );
    }

    #[test]
    fn test_take_arg_primary_wins() {
        let mut args = collect_args(["a=1", "b=2", "A=3", "c="]);
        assert_eq!(take_arg(&mut args, &["c", "b"]), Some("2".into()));
        assert_eq!(take_arg(&mut args, &["a"]), Some("3".into()));
        assert!(args.is_empty());
    }
}
