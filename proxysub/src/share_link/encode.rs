use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use thiserror::Error;

use crate::node::{Node, NodeProtocol, Scalar};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error(r#""{0}" is required, but is missing"#)]
    MissingInfo(&'static str),
    #[error(r#""{0}" cannot be encoded"#)]
    UnsupportedComponent(&'static str),
}

pub type EncodeResult<T> = Result<T, EncodeError>;

pub fn encode_share_link(node: &Node) -> EncodeResult<String> {
    if node.server.is_empty() {
        return Err(EncodeError::MissingInfo("server"));
    }
    if node.port == 0 {
        return Err(EncodeError::MissingInfo("port"));
    }
    match &node.protocol {
        NodeProtocol::Shadowsocks(p) => p.encode_share_link(node),
        NodeProtocol::VMess(p) => p.encode_share_link(node),
        NodeProtocol::Trojan(p) => p.encode_share_link(node),
        NodeProtocol::ShadowsocksR(p) => p.encode_share_link(node),
        NodeProtocol::Http(p) => p.encode_share_link(node),
        NodeProtocol::Socks(p) => p.encode_share_link(node),
    }
}

pub(super) fn url_encode_host(host: &str) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

pub(super) fn encode_name(name: &str) -> String {
    utf8_percent_encode(name, NON_ALPHANUMERIC).to_string()
}

/// Appends string-valued extension entries as query pairs, skipping keys the
/// scheme already wrote.
pub(super) fn append_extension_pairs(
    query: &mut url::form_urlencoded::Serializer<String>,
    node: &Node,
    materialized: &[&str],
) {
    for (key, value) in &node.extension {
        if materialized.contains(&&**key) {
            continue;
        }
        if let Scalar::Str(value) = value {
            query.append_pair(key, value);
        }
    }
}

/// Joins a query string onto `base`, leaving no dangling `?`.
pub(super) fn with_query(mut base: String, query: String) -> String {
    if !query.is_empty() {
        base.push('?');
        base.push_str(&query);
    }
    base
}
