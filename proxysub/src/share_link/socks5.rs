use url::Url;

use super::decode::{
    decode_userinfo, extract_name_from_frag, read_tls_queries, take_query, url_host,
    DecodeResult, QueryMap,
};
use super::encode::{
    append_extension_pairs, encode_name, url_encode_host, with_query, EncodeResult,
};
use super::http::encode_userinfo;
use crate::coerce::parse_flag;
use crate::node::protocol::SocksProxy;
use crate::node::{Node, NodeProtocol, Scalar};

const MATERIALIZED_QUERIES: &[&str] = &[
    "username",
    "udp",
    "tls",
    "sni",
    "host",
    "servername",
    "skip-cert-verify",
    "allowInsecure",
];

impl SocksProxy {
    pub(super) fn decode_share_link(url: &Url, queries: &mut QueryMap) -> DecodeResult<Node> {
        let (username, password) = decode_userinfo(url)?;
        let server = url_host(url)?;
        let port = url.port().unwrap_or(1080);

        let mut node = Node::new(server, port, NodeProtocol::Socks(SocksProxy { password }));
        if !username.is_empty() {
            node.extension.insert("username".into(), Scalar::Str(username));
        }
        if let Some(udp) = take_query(queries, &["udp"]) {
            node.extension
                .insert("udp".into(), Scalar::Bool(parse_flag(&udp)));
        }
        read_tls_queries(&mut node, queries, false);

        node.name = queries
            .remove("remarks")
            .filter(|s| !s.is_empty())
            .map(|s| s.into_owned())
            .or_else(|| extract_name_from_frag(url))
            .unwrap_or(node.name);
        Ok(node)
    }

    pub(super) fn encode_share_link(&self, node: &Node) -> EncodeResult<String> {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        if node.tls.enabled {
            query.append_pair("tls", "1");
        }
        if let Some(sni) = node.tls.sni.as_ref().filter(|s| **s != node.server) {
            query.append_pair("sni", sni);
        }
        if node.tls.skip_cert_check {
            query.append_pair("skip-cert-verify", "1");
        }
        if let Some(Scalar::Bool(true)) = node.extension.get("udp") {
            query.append_pair("udp", "1");
        }
        append_extension_pairs(&mut query, node, MATERIALIZED_QUERIES);

        let base = format!(
            "socks5://{}{}:{}",
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
