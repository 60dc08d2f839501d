use super::decode::NodeCollector;
use super::surge_proxy_list::{collect_args, keep_extra_args, take_arg, take_flag, LineArgs};
use super::Subscription;
use crate::node::draft::NodeDraft;
use crate::node::NodeKind;
use crate::share_link::decode_share_link;

const URI_PREFIXES: &[&str] = &["vmess://", "ss://", "trojan://", "ssr://"];

fn quantumult_type(name: &str) -> Option<&'static str> {
    Some(match &*name.trim().to_ascii_lowercase() {
        "shadowsocks" | "ss" => "ss",
        "vmess" => "vmess",
        "trojan" => "trojan",
        "http" => "http",
        "https" => "https",
        "socks" | "socks5" => "socks",
        _ => return None,
    })
}

/// `host:port`, with IPv6 hosts in brackets.
fn split_server(s: &str) -> Option<(&str, &str)> {
    let (host, port) = s.rsplit_once(':')?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Some((host, port))
}

fn read_args(draft: &mut NodeDraft, kind: NodeKind, args: &mut LineArgs) {
    if let Some(tls) = take_flag(args, &["over-tls", "tls"]) {
        draft.tls = tls;
    }
    draft.sni = take_arg(args, &["tls-host", "sni"]).unwrap_or_default();
    draft.allow_insecure = match take_flag(args, &["skip-cert-verify"]) {
        Some(skip) => skip,
        None => take_flag(args, &["tls-verification"]).is_some_and(|verify| !verify),
    };
    args.remove("tls-verification");
    if let Some(tag) = take_arg(args, &["tag"]) {
        draft.name = tag;
    }
    let udp = take_flag(args, &["udp-relay", "udp"]);

    match kind {
        NodeKind::Shadowsocks => {
            draft.method = take_arg(args, &["method"]).unwrap_or_default();
            draft.password = take_arg(args, &["password"]).unwrap_or_default();
            if let Some(obfs) = take_arg(args, &["obfs"]) {
                let mut opts = format!("obfs={obfs}");
                if let Some(host) = take_arg(args, &["obfs-host"]) {
                    opts.push_str(";obfs-host=");
                    opts.push_str(&host);
                }
                draft.plugin = "obfs".into();
                draft.plugin_opts = opts;
            }
        }
        NodeKind::VMess => {
            draft.uuid = take_arg(args, &["password"]).unwrap_or_default();
            if let Some(scy) = take_arg(args, &["method"]) {
                draft.set_ext("scy", scy);
            }
            match take_arg(args, &["obfs"]).as_deref() {
                Some("ws") => draft.network = "ws".into(),
                Some("wss") => {
                    draft.network = "ws".into();
                    draft.tls = true;
                }
                Some("over-tls") => draft.tls = true,
                Some(other) => draft.network = other.into(),
                None => {}
            }
            draft.host = take_arg(args, &["obfs-host"]).unwrap_or_default();
            draft.path = take_arg(args, &["obfs-uri", "obfs-path"]).unwrap_or_default();
        }
        NodeKind::Trojan => {
            draft.password = take_arg(args, &["password"]).unwrap_or_default();
        }
        NodeKind::Http | NodeKind::Socks => {
            draft.username = take_arg(args, &["username"]).unwrap_or_default();
            draft.password = take_arg(args, &["password"]).unwrap_or_default();
        }
        NodeKind::ShadowsocksR => {}
    }
    if let Some(udp) = udp {
        draft.set_ext("udp", udp);
    }
}

/// `type = name, server, port, k=v...` or the Quantumult X layout
/// `type = server:port, k=v..., tag=name`. `Ok(None)` means the line is not
/// a proxy definition.
fn decode_quantumult_line(line: &str) -> Result<Option<NodeDraft>, &'static str> {
    let Some((type_name, rest)) = line.split_once('=') else {
        return Ok(None);
    };
    let Some(type_name) = quantumult_type(type_name) else {
        return Ok(None);
    };
    let mut fields = rest.split(',').map(str::trim).peekable();
    let mut draft = NodeDraft::new(type_name);

    let first = fields.next().unwrap_or_default();
    // A classic name may contain ':' too. Quantumult X puts key=value pairs
    // right after the address, classic puts the bare server there.
    let quanx_server = (!first.contains('=') && !first.contains(' '))
        .then(|| split_server(first))
        .flatten()
        .and_then(|(host, port)| Some((host, port.parse::<u16>().ok()?)))
        .filter(|_| fields.peek().map_or(true, |next| next.contains('=')));
    if let Some((host, port)) = quanx_server {
        draft.server = host.into();
        draft.port = port;
    } else {
        draft.name = first.into();
        draft.server = fields
            .next_if(|f| !f.contains('='))
            .filter(|s| !s.is_empty())
            .ok_or("server is missing")?
            .into();
        draft.port = fields
            .next_if(|f| !f.contains('='))
            .ok_or("port is missing")?
            .parse()
            .map_err(|_| "port is not a number")?;
    }

    let mut args = collect_args(fields);
    let kind = NodeKind::from_type_name(type_name).ok_or("unknown type")?;
    read_args(&mut draft, kind, &mut args);
    keep_extra_args(&mut draft, args);
    Ok(Some(draft))
}

pub fn decode_quantumult(text: &str) -> Subscription {
    let mut out = NodeCollector::default();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
            continue;
        }
        let lower = line.to_ascii_lowercase();
        if URI_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            out.push_result(idx + 1, decode_share_link(line));
            continue;
        }
        match decode_quantumult_line(line) {
            Ok(Some(draft)) => out.push_result(idx + 1, draft.into_node()),
            Ok(None) => {}
            Err(reason) => out.skip(idx + 1, reason),
        }
    }
    out.finish()
}
