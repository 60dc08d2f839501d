use url::Url;

use super::decode::{
    decode_userinfo, extract_name_from_frag, read_tls_queries, take_query, url_host,
    DecodeError, DecodeResult, QueryMap,
};
use super::encode::{
    append_extension_pairs, encode_name, url_encode_host, with_query, EncodeResult,
};
use crate::coerce::parse_flag;
use crate::node::protocol::HttpProxy;
use crate::node::{Node, NodeProtocol, Scalar};

const MATERIALIZED_QUERIES: &[&str] = &[
    "username",
    "tls",
    "sni",
    "host",
    "servername",
    "skip-cert-verify",
    "allowInsecure",
    "ws",
    "path",
    "ws-path",
    "ws-host",
];

/// `user[:pass]@` with both parts percent-encoded, or nothing.
pub(super) fn encode_userinfo(node: &Node) -> String {
    let user = node.extension_str("username").unwrap_or_default();
    let pass = node.password().unwrap_or_default();
    match (user, pass) {
        ("", "") => String::new(),
        (user, "") => format!("{}@", encode_name(user)),
        (user, pass) => format!("{}:{}@", encode_name(user), encode_name(pass)),
    }
}

impl HttpProxy {
    pub(super) fn decode_share_link(url: &Url, queries: &mut QueryMap) -> DecodeResult<Node> {
        let (username, password) = decode_userinfo(url)?;
        let server = url_host(url)?;
        let port = url
            .port_or_known_default()
            .ok_or(DecodeError::MissingInfo("port"))?;

        let mut node = Node::new(server, port, NodeProtocol::Http(HttpProxy { password }));
        if !username.is_empty() {
            node.extension.insert("username".into(), Scalar::Str(username));
        }
        read_tls_queries(&mut node, queries, url.scheme() == "https");

        node.transport.path = take_query(queries, &["path"]);
        if queries.remove("ws").map(|s| parse_flag(&s)).unwrap_or(false) {
            node.transport.network = Some("ws".into());
            if node.transport.path.is_none() {
                node.transport.path = take_query(queries, &["ws-path"]);
            }
            node.transport.host = take_query(queries, &["ws-host"]);
        }

        if let Some(name) = extract_name_from_frag(url) {
            node.name = name;
        }
        Ok(node)
    }

    pub(super) fn encode_share_link(&self, node: &Node) -> EncodeResult<String> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if let Some(sni) = node.tls.sni.as_ref().filter(|s| **s != node.server) {
            query.append_pair("sni", sni);
        }
        if node.tls.skip_cert_check {
            query.append_pair("skip-cert-verify", "1");
        }
        if let Some(path) = &node.transport.path {
            query.append_pair("path", path);
        }
        if node.transport.is_ws() {
            query.append_pair("ws", "1");
            if let Some(host) = &node.transport.host {
                query.append_pair("ws-host", host);
            }
        }
        append_extension_pairs(&mut query, node, MATERIALIZED_QUERIES);

        let base = format!(
            "{}://{}{}:{}/",
            if node.tls.enabled { "https" } else { "http" },
            encode_userinfo(node),
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
