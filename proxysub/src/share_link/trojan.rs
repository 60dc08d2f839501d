use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use url::Url;

use super::decode::{
    extract_name_from_frag, is_ip_literal, percent_decode_utf8, take_query, url_host,
    DecodeError, DecodeResult, QueryMap,
};
use super::encode::{
    append_extension_pairs, encode_name, url_encode_host, with_query, EncodeError, EncodeResult,
};
use crate::coerce::parse_flag;
use crate::node::protocol::TrojanProxy;
use crate::node::{Node, NodeProtocol, NodeTlsLayer};

const MATERIALIZED_QUERIES: &[&str] = &[
    "sni",
    "alpn",
    "alpns",
    "allowInsecure",
    "skip-cert-verify",
    "ws",
    "path",
    "host",
];

impl TrojanProxy {
    pub(super) fn decode_share_link(url: &Url, queries: &mut QueryMap) -> DecodeResult<Node> {
        let password = percent_decode_utf8(url.username())?;
        if password.is_empty() {
            return Err(DecodeError::MissingInfo("password"));
        }
        let server = url_host(url)?;
        let port = url.port().unwrap_or(443);

        let mut node = Node::new(server, port, NodeProtocol::Trojan(TrojanProxy { password }));
        node.tls.enabled = true;
        node.tls.sni = take_query(queries, &["sni"]);
        node.tls.alpn = take_query(queries, &["alpn", "alpns"])
            .map(|a| NodeTlsLayer::parse_alpn(&a))
            .unwrap_or_default();
        node.tls.skip_cert_check = take_query(queries, &["allowInsecure", "skip-cert-verify"])
            .map(|s| parse_flag(&s))
            .unwrap_or(false);
        if node.tls.sni.is_none() && !is_ip_literal(&node.server) {
            node.tls.sni = Some(node.server.clone());
        }

        let ws_flag = queries.remove("ws").map(|s| parse_flag(&s)).unwrap_or(false);
        let ws_type = queries.get("type").filter(|t| *t == "ws").is_some();
        if ws_flag || ws_type {
            queries.remove("type");
            node.transport.network = Some("ws".into());
            node.transport.path = take_query(queries, &["path"]);
            node.transport.host = take_query(queries, &["host"]);
        }

        if let Some(name) = extract_name_from_frag(url) {
            node.name = name;
        }
        Ok(node)
    }

    pub(super) fn encode_share_link(&self, node: &Node) -> EncodeResult<String> {
        if self.password.is_empty() {
            return Err(EncodeError::MissingInfo("password"));
        }
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(sni) = &node.tls.sni {
            query.append_pair("sni", sni);
        }
        if !node.tls.alpn.is_empty() {
            query.append_pair("alpn", &node.tls.alpn.join(","));
        }
        if node.tls.skip_cert_check {
            query.append_pair("allowInsecure", "1");
        }
        if node.transport.is_ws() {
            query.append_pair("ws", "1");
            if let Some(path) = &node.transport.path {
                query.append_pair("path", path);
            }
            if let Some(host) = &node.transport.host {
                query.append_pair("host", host);
            }
        }
        append_extension_pairs(&mut query, node, MATERIALIZED_QUERIES);

        let base = format!(
            "trojan://{}@{}:{}",
            utf8_percent_encode(&self.password, NON_ALPHANUMERIC),
            url_encode_host(&node.server),
            node.port,
        );
        Ok(format!(
            "{}#{}",
            with_query(base, query.finish()),
            encode_name(&node.name)
        ))
    }
}
