use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use log::warn;

use crate::node::{Node, NodeProtocol, Scalar};

const FIELD: usize = 4;
const NESTED: usize = 6;

const RESERVED_WORDS: &[&str] = &[
    "true", "false", "yes", "no", "on", "off", "y", "n", "null", "~",
];

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s != s.trim()
        || s.starts_with([
            '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
            '@', '`',
        ])
        || s.contains(": ")
        || s.contains(" #")
        || s.ends_with(':')
        || s.chars().any(char::is_control)
        || RESERVED_WORDS.iter().any(|w| s.eq_ignore_ascii_case(w))
        || s.parse::<f64>().is_ok()
}

/// Quotes a scalar that a YAML reader would otherwise misread.
fn yaml_str(s: &str) -> Cow<'_, str> {
    if !needs_quotes(s) {
        return Cow::Borrowed(s);
    }
    if s.chars().any(char::is_control) {
        let escaped = s
            .replace('\\', "\\\\")
            .replace('"', "\\\"")
            .replace('\n', "\\n")
            .replace('\t', "\\t");
        return Cow::Owned(format!("\"{escaped}\""));
    }
    Cow::Owned(format!("'{}'", s.replace('\'', "''")))
}

fn str_field(f: &mut Formatter<'_>, indent: usize, key: &str, value: &str) -> fmt::Result {
    writeln!(f, "{:indent$}{key}: {}", "", yaml_str(value))
}

fn opt_field(f: &mut Formatter<'_>, indent: usize, key: &str, value: Option<&str>) -> fmt::Result {
    match value.filter(|v| !v.is_empty()) {
        Some(value) => str_field(f, indent, key, value),
        None => Ok(()),
    }
}

fn key_line(f: &mut Formatter<'_>, indent: usize, key: &str) -> fmt::Result {
    writeln!(f, "{:indent$}{key}:", "")
}

fn raw_field(f: &mut Formatter<'_>, indent: usize, key: &str, value: impl Display) -> fmt::Result {
    writeln!(f, "{:indent$}{key}: {value}", "")
}

fn flag_field(f: &mut Formatter<'_>, indent: usize, key: &str, value: bool) -> fmt::Result {
    if value {
        raw_field(f, indent, key, true)?;
    }
    Ok(())
}

fn ext_bool(node: &Node, key: &str) -> Option<bool> {
    match node.extension.get(key) {
        Some(Scalar::Bool(b)) => Some(*b),
        Some(Scalar::Int(i)) => Some(*i != 0),
        Some(Scalar::Str(s)) => Some(crate::coerce::parse_flag(s)),
        None => None,
    }
}

fn write_alpn(f: &mut Formatter<'_>, node: &Node) -> fmt::Result {
    if node.tls.alpn.is_empty() {
        return Ok(());
    }
    key_line(f, FIELD, "alpn")?;
    for proto in &node.tls.alpn {
        writeln!(f, "{:indent$}- {}", "", yaml_str(proto), indent = NESTED)?;
    }
    Ok(())
}

fn write_ws_opts(f: &mut Formatter<'_>, node: &Node) -> fmt::Result {
    let Some(network) = node.transport.network.as_deref() else {
        return Ok(());
    };
    str_field(f, FIELD, "network", network)?;
    if !node.transport.is_ws() {
        return Ok(());
    }
    let path = node.transport.path.as_deref().filter(|p| !p.is_empty());
    let host = node.transport.host.as_deref().filter(|h| !h.is_empty());
    if path.is_none() && host.is_none() {
        return Ok(());
    }
    key_line(f, FIELD, "ws-opts")?;
    opt_field(f, NESTED, "path", path)?;
    if let Some(host) = host {
        key_line(f, NESTED, "headers")?;
        str_field(f, NESTED + 2, "Host", host)?;
    }
    Ok(())
}

fn write_udp(f: &mut Formatter<'_>, node: &Node) -> fmt::Result {
    match ext_bool(node, "udp") {
        Some(udp) => raw_field(f, FIELD, "udp", udp),
        None => Ok(()),
    }
}

fn write_node(f: &mut Formatter<'_>, node: &Node) -> fmt::Result {
    writeln!(f, "  - name: {}", yaml_str(&node.name))?;
    let clash_type = match node.protocol {
        NodeProtocol::Socks(_) => "socks5",
        _ => node.kind().as_str(),
    };
    raw_field(f, FIELD, "type", clash_type)?;
    str_field(f, FIELD, "server", &node.server)?;
    raw_field(f, FIELD, "port", node.port)?;

    match &node.protocol {
        NodeProtocol::Shadowsocks(ss) => {
            str_field(f, FIELD, "cipher", &ss.method)?;
            str_field(f, FIELD, "password", &ss.password)?;
            if let Some(plugin) = &ss.plugin {
                str_field(f, FIELD, "plugin", &plugin.name)?;
                let mut opts = plugin.opts_pairs().peekable();
                if opts.peek().is_some() {
                    key_line(f, FIELD, "plugin-opts")?;
                    for (k, v) in opts {
                        str_field(f, NESTED, k, v)?;
                    }
                }
            }
            write_udp(f, node)?;
        }
        NodeProtocol::ShadowsocksR(ssr) => {
            str_field(f, FIELD, "cipher", &ssr.method)?;
            str_field(f, FIELD, "password", &ssr.password)?;
            let protocol = node.extension_str("protocol").unwrap_or("origin");
            let obfs = node.extension_str("obfs").unwrap_or("plain");
            str_field(f, FIELD, "protocol", protocol)?;
            str_field(f, FIELD, "obfs", obfs)?;
            opt_field(f, FIELD, "protocol-param", node.extension_str("protoparam"))?;
            opt_field(f, FIELD, "obfs-param", node.extension_str("obfsparam"))?;
            write_udp(f, node)?;
        }
        NodeProtocol::VMess(vmess) => {
            str_field(f, FIELD, "uuid", &vmess.uuid)?;
            let aid = match node.extension.get("aid") {
                Some(Scalar::Int(aid)) => *aid,
                Some(Scalar::Str(aid)) => aid.trim().parse().unwrap_or(0),
                _ => 0,
            };
            raw_field(f, FIELD, "alterId", aid)?;
            str_field(f, FIELD, "cipher", node.extension_str("scy").unwrap_or("auto"))?;
            flag_field(f, FIELD, "tls", node.tls.enabled)?;
            opt_field(f, FIELD, "servername", node.tls.sni.as_deref())?;
            write_alpn(f, node)?;
            flag_field(f, FIELD, "skip-cert-verify", node.tls.skip_cert_check)?;
            write_ws_opts(f, node)?;
            write_udp(f, node)?;
        }
        NodeProtocol::Trojan(trojan) => {
            str_field(f, FIELD, "password", &trojan.password)?;
            opt_field(f, FIELD, "sni", node.tls.sni.as_deref())?;
            write_alpn(f, node)?;
            flag_field(f, FIELD, "skip-cert-verify", node.tls.skip_cert_check)?;
            write_ws_opts(f, node)?;
            write_udp(f, node)?;
        }
        NodeProtocol::Http(http) => {
            opt_field(f, FIELD, "username", node.extension_str("username"))?;
            opt_field(f, FIELD, "password", Some(http.password.as_str()))?;
            flag_field(f, FIELD, "tls", node.tls.enabled)?;
            opt_field(f, FIELD, "sni", node.tls.sni.as_deref())?;
            flag_field(f, FIELD, "skip-cert-verify", node.tls.skip_cert_check)?;
        }
        NodeProtocol::Socks(socks) => {
            opt_field(f, FIELD, "username", node.extension_str("username"))?;
            opt_field(f, FIELD, "password", Some(socks.password.as_str()))?;
            flag_field(f, FIELD, "tls", node.tls.enabled)?;
            flag_field(f, FIELD, "skip-cert-verify", node.tls.skip_cert_check)?;
            write_udp(f, node)?;
        }
    }
    Ok(())
}

struct ClashDocument<'a>(Vec<&'a Node>);

impl Display for ClashDocument<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return writeln!(f, "proxies: []");
        }
        writeln!(f, "proxies:")?;
        for node in &self.0 {
            write_node(f, node)?;
        }
        Ok(())
    }
}

/// A `proxies:` block with one item per usable node.
pub(super) fn encode_clash(nodes: &[Node]) -> String {
    let usable = nodes
        .iter()
        .filter(|node| {
            let valid = node.is_valid();
            if !valid {
                warn!("Skipping {} node {}: lacks required fields", node.kind(), node.name);
            }
            valid
        })
        .collect();
    ClashDocument(usable).to_string()
}
