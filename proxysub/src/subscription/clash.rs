//! A line scanner for the `proxies:` block of Clash configs.
//!
//! Only the subset of YAML that Clash providers actually emit is understood:
//! block mappings, block sequences of scalars, flow mappings and flow
//! sequences, plain and quoted scalars. Anchors, multi-line scalars and
//! sequences of mappings below the item level are not interpreted.

use serde_json::{Map, Value};

use super::decode::NodeCollector;
use super::json::node_from_object;
use super::Subscription;

#[derive(Debug)]
struct ClashItem {
    position: usize,
    dash_indent: usize,
    fields: Map<String, Value>,
    /// Block keys whose nested lines are still being read, innermost last.
    open: Vec<(usize, String)>,
}

#[derive(Debug)]
enum ScanState {
    OutsideProxies,
    BetweenItems,
    InsideItem(ClashItem),
}

/// Whether a quote seen after `last` (the previous non-blank character) and
/// `prev` starts a quoted scalar rather than sitting inside a plain one.
fn opens_scalar(last: Option<char>, prev: char) -> bool {
    match last {
        None | Some('[' | '{' | ',') => true,
        Some(':' | '-') => prev.is_whitespace(),
        _ => false,
    }
}

fn strip_comment(line: &str) -> &str {
    let mut quote = None;
    let mut last = None;
    let mut prev = ' ';
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some('\'') if c == '\'' => {
                if chars.next_if(|&(_, n)| n == '\'').is_none() {
                    quote = None;
                }
            }
            Some('"') if c == '\\' => {
                chars.next();
            }
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' if opens_scalar(last, prev) => quote = Some(c),
                '#' if prev.is_whitespace() => return &line[..i],
                _ => {}
            },
        }
        if quote.is_none() && !c.is_whitespace() {
            last = Some(c);
        }
        prev = c;
    }
    line
}

fn dash_entry(body: &str) -> Option<&str> {
    if body == "-" {
        return Some("");
    }
    body.strip_prefix("- ").map(str::trim_start)
}

fn unquote(s: &str) -> String {
    if s.len() >= 2 {
        if let Some(inner) = s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
            return inner.replace("''", "'");
        }
        if let Some(inner) = s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            let mut out = String::with_capacity(inner.len());
            let mut chars = inner.chars();
            while let Some(c) = chars.next() {
                if c != '\\' {
                    out.push(c);
                    continue;
                }
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c @ ('"' | '\\' | '/')) => out.push(c),
                    Some(c) => {
                        out.push('\\');
                        out.push(c);
                    }
                    None => out.push('\\'),
                }
            }
            return out;
        }
    }
    s.to_string()
}

fn is_plain_int(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'))
}

fn parse_scalar(s: &str) -> Value {
    if s.starts_with(['\'', '"']) {
        return Value::String(unquote(s));
    }
    match s {
        "" | "~" | "null" | "Null" | "NULL" => Value::Null,
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ if is_plain_int(s) => s
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(s.into())),
        _ => Value::String(s.into()),
    }
}

/// Splits a flow collection body on top-level commas.
fn split_flow(s: &str) -> Vec<&str> {
    let mut parts = vec![];
    let (mut depth, mut quote, mut start) = (0usize, None, 0);
    for (i, c) in s.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => quote = Some(c),
            (None, '{' | '[') => depth += 1,
            (None, '}' | ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

fn parse_value(s: &str) -> Value {
    let s = s.trim();
    if let Some(inner) = s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
        let map = split_flow(inner)
            .into_iter()
            .filter_map(|entry| {
                let (k, v) = entry.split_once(':')?;
                Some((unquote(k.trim()), parse_value(v)))
            })
            .collect();
        return Value::Object(map);
    }
    if let Some(inner) = s.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        return Value::Array(split_flow(inner).into_iter().map(parse_value).collect());
    }
    parse_scalar(s)
}

/// `key: value` or `key:` on a block line.
fn split_key(s: &str) -> Option<(String, &str)> {
    let (key, value) = match s.strip_suffix(':') {
        Some(key) if !key.contains(": ") => (key, ""),
        _ => s.split_once(": ")?,
    };
    let key = unquote(key.trim());
    (!key.is_empty()).then_some((key, value.trim()))
}

impl ClashItem {
    fn target(&mut self) -> Option<&mut Map<String, Value>> {
        let mut cur = &mut self.fields;
        for (_, key) in &self.open {
            cur = cur.get_mut(key)?.as_object_mut()?;
        }
        Some(cur)
    }

    fn read_field(&mut self, indent: usize, body: &str) {
        let Some((key, value)) = split_key(body) else {
            return;
        };
        while self.open.last().is_some_and(|(i, _)| *i >= indent) {
            self.open.pop();
        }
        let Some(target) = self.target() else {
            return;
        };
        if value.is_empty() {
            target.insert(key.clone(), Value::Object(Map::new()));
            self.open.push((indent, key));
        } else {
            target.insert(key, parse_value(value));
        }
    }

    fn read_seq_entry(&mut self, indent: usize, entry: &str) {
        while self.open.last().is_some_and(|(i, _)| *i > indent) {
            self.open.pop();
        }
        let Some((key_indent, key)) = self.open.pop() else {
            return;
        };
        let value = parse_value(entry);
        if let Some(slot) = self.target().and_then(|t| t.get_mut(&key)) {
            if slot.as_object().is_some_and(Map::is_empty) {
                *slot = Value::Array(vec![]);
            }
            if let Value::Array(items) = slot {
                items.push(value);
            }
        }
        self.open.push((key_indent, key));
    }

    fn flush(self, out: &mut NodeCollector) {
        out.push_result(self.position, node_from_object(&self.fields));
    }
}

fn read_flow_item(position: usize, flow: &str, out: &mut NodeCollector) {
    match parse_value(flow) {
        Value::Object(fields) => out.push_result(position, node_from_object(&fields)),
        _ => out.skip(position, "malformed flow mapping"),
    }
}

fn start_item(position: usize, indent: usize, body: &str, out: &mut NodeCollector) -> ScanState {
    let Some(entry) = dash_entry(body) else {
        return ScanState::BetweenItems;
    };
    if entry.starts_with('{') {
        read_flow_item(position, entry, out);
        return ScanState::BetweenItems;
    }
    let mut item = ClashItem {
        position,
        dash_indent: indent,
        fields: Map::new(),
        open: vec![],
    };
    item.read_field(indent + (body.len() - entry.len()), entry);
    ScanState::InsideItem(item)
}

pub fn decode_clash(text: &str) -> Subscription {
    let mut out = NodeCollector::default();
    let mut state = ScanState::OutsideProxies;

    for (idx, raw) in text.lines().enumerate() {
        let position = idx + 1;
        let line = strip_comment(raw).trim_end();
        let body = line.trim_start();
        if body.is_empty() {
            continue;
        }
        let indent = line.len() - body.len();

        if indent == 0 && !body.starts_with('-') {
            if let ScanState::InsideItem(item) = state {
                item.flush(&mut out);
            }
            state = match body.strip_prefix("proxies:").map(str::trim) {
                Some("") => ScanState::BetweenItems,
                Some(flow) => {
                    if let Value::Array(items) = parse_value(flow) {
                        for item in items {
                            match item {
                                Value::Object(fields) => {
                                    out.push_result(position, node_from_object(&fields))
                                }
                                _ => out.skip(position, "malformed flow mapping"),
                            }
                        }
                    }
                    ScanState::OutsideProxies
                }
                None => ScanState::OutsideProxies,
            };
            continue;
        }

        state = match state {
            ScanState::OutsideProxies => ScanState::OutsideProxies,
            ScanState::BetweenItems => start_item(position, indent, body, &mut out),
            ScanState::InsideItem(mut item) => match dash_entry(body) {
                Some(_) if indent <= item.dash_indent => {
                    item.flush(&mut out);
                    start_item(position, indent, body, &mut out)
                }
                Some(entry) => {
                    item.read_seq_entry(indent, entry);
                    ScanState::InsideItem(item)
                }
                None => {
                    item.read_field(indent, body);
                    ScanState::InsideItem(item)
                }
            },
        };
    }
    if let ScanState::InsideItem(item) = state {
        item.flush(&mut out);
    }
    out.finish()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::node::protocol::{ShadowsocksPlugin, ShadowsocksProxy, TrojanProxy, VMessProxy};
    use crate::node::{Node, NodeProtocol, NodeTlsLayer, Scalar};
    use crate::subscription::SkippedUnit;

    const CLASH_DOC: &str = r#"
port: 7890
mode: rule
proxies:
  - name: "ss1"
    type: ss
    server: a.co
    port: 8388
    cipher: aes-128-gcm
    password: "p#1" # trailing comment
    plugin: obfs
    plugin-opts:
      mode: tls
      host: b.co
    udp: true
  # comment
  - {name: vm, type: vmess, server: 1.2.3.4, port: 443, uuid: u-1, alterId: 0, cipher: auto, tls: true, servername: c.co, network: ws, ws-opts: {path: /ws, headers: {Host: c.co}}}
  - name: tj
    type: trojan
    server: t.co
    port: 443
    password: '0123'
    alpn:
      - h2
      - http/1.1
    skip-cert-verify: true
  - name: bad
    type: ss
    server: x.co
proxy-groups:
  - name: g
    type: select
    proxies:
      - ss1
rules:
  - MATCH,DIRECT
"#;

    #[test]
    fn test_decode_clash() {
        let sub = decode_clash(CLASH_DOC);

        let mut ss = Node::new(
            "a.co",
            8388,
            NodeProtocol::Shadowsocks(ShadowsocksProxy {
                method: "aes-128-gcm".into(),
                password: "p#1".into(),
                plugin: Some(ShadowsocksPlugin {
                    name: "obfs".into(),
                    opts: "host=b.co;mode=tls".into(),
                }),
            }),
        );
        ss.name = "ss1".into();
        ss.extension.insert("udp".into(), Scalar::Bool(true));

        let mut vm = Node::new(
            "1.2.3.4",
            443,
            NodeProtocol::VMess(VMessProxy { uuid: "u-1".into() }),
        );
        vm.name = "vm".into();
        vm.transport.network = Some("ws".into());
        vm.transport.path = Some("/ws".into());
        vm.transport.host = Some("c.co".into());
        vm.tls.enabled = true;
        vm.tls.sni = Some("c.co".into());
        vm.extension.insert("aid".into(), Scalar::Int(0));
        vm.extension.insert("scy".into(), "auto".into());

        let mut tj = Node::new(
            "t.co",
            443,
            NodeProtocol::Trojan(TrojanProxy {
                password: "0123".into(),
            }),
        );
        tj.name = "tj".into();
        tj.tls = NodeTlsLayer {
            enabled: true,
            sni: None,
            alpn: vec!["h2".into(), "http/1.1".into()],
            skip_cert_check: true,
        };

        let bad_line = CLASH_DOC
            .lines()
            .position(|l| l.contains("name: bad"))
            .unwrap()
            + 1;
        assert_eq!(
            sub,
            Subscription {
                nodes: vec![ss, vm, tj],
                skipped: vec![SkippedUnit {
                    position: bad_line,
                    reason: "ss node lacks required fields".into(),
                }],
            }
        );
    }
    #[test]
    fn test_decode_clash_zero_indent_items() {
        let doc = "proxies:\n- name: a\n  type: http\n  server: h.co\n  port: 8080\n  username: u\n- name: b\n  type: socks5\n  server: s.co\n  port: 1080\n";
        let sub = decode_clash(doc);
        let names: Vec<_> = sub.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(sub.nodes[0].extension_str("username"), Some("u"));
    }
    #[test]
    fn test_decode_clash_flow_proxies() {
        let doc = "proxies: [{name: a, type: trojan, server: t.co, port: 443, password: p}]";
        let sub = decode_clash(doc);
        assert_eq!(sub.nodes.len(), 1);
        assert_eq!(sub.nodes[0].name, "a");
    }
    #[test]
    fn test_decode_clash_apostrophe_in_plain_scalar() {
        let doc = "proxies:\n  - name: it's # note\n    type: trojan\n    server: t.co # edge\n    port: 443\n    password: p\n";
        let sub = decode_clash(doc);
        assert_eq!(sub.skipped, vec![]);
        assert_eq!(sub.nodes.len(), 1);
        assert_eq!(sub.nodes[0].name, "it's");
        assert_eq!(sub.nodes[0].server, "t.co");
    }
    #[test]
    fn test_decode_clash_no_proxies() {
        assert_eq!(
            decode_clash("port: 1\nrules:\n  - MATCH,DIRECT\n"),
            Subscription::default()
        );
    }

    #[test]
    fn test_parse_value() {
        let cases = [
            ("443", json!(443)),
            ("0123", json!("0123")),
            ("-1", json!(-1)),
            ("true", json!(true)),
            ("~", json!(null)),
            ("'it''s'", json!("it's")),
            (r#""a\"b""#, json!("a\"b")),
            ("[h2, 'http/1.1']", json!(["h2", "http/1.1"])),
            (
                "{a: 1, b: {c: 'x, y'}, d: [1, 2]}",
                json!({"a": 1, "b": {"c": "x, y"}, "d": [1, 2]}),
            ),
            ("plain text", json!("plain text")),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_value(input), expected, "{input}");
        }
    }
    #[test]
    fn test_strip_comment() {
        let cases = [
            ("a: b # c", "a: b "),
            ("# c", ""),
            ("a: 'b # c'", "a: 'b # c'"),
            ("a: b#c", "a: b#c"),
            ("name: it's # note", "name: it's "),
            ("name: 'it''s # x' # c", "name: 'it''s # x' "),
            (r#"- "a\" # b" # c"#, r#"- "a\" # b" "#),
            ("{ name: 'a # b', c: d } # e", "{ name: 'a # b', c: d } "),
        ];
        for (input, expected) in cases {
            assert_eq!(strip_comment(input), expected, "{input}");
        }
    }
}
