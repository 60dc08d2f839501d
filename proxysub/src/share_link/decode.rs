use std::borrow::Cow;
use std::collections::BTreeMap;
use std::net::IpAddr;

use base64::Engine;
use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::Url;

use crate::node::protocol::{
    HttpProxy, ShadowsocksProxy, ShadowsocksRProxy, SocksProxy, TrojanProxy, VMessProxy,
};
use crate::node::{Node, NodeKind, Scalar};

pub static BASE64_ENGINE: base64::engine::GeneralPurpose = base64::engine::GeneralPurpose::new(
    &base64::alphabet::STANDARD,
    base64::engine::general_purpose::GeneralPurposeConfig::new()
        .with_decode_padding_mode(base64::engine::DecodePaddingMode::Indifferent),
);

pub static BASE64_URL_ENGINE: base64::engine::GeneralPurpose = base64::engine::GeneralPurpose::new(
    &base64::alphabet::URL_SAFE,
    base64::engine::general_purpose::GeneralPurposeConfig::new()
        .with_decode_padding_mode(base64::engine::DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid URL")]
    InvalidUrl,
    #[error("invalid URL, UTF-8 or Base64 encoding")]
    InvalidEncoding,
    #[error(r#""{0}" is required, but is missing"#)]
    MissingInfo(&'static str),
    #[error(r#"unknown value for field "{0}""#)]
    UnknownValue(&'static str),
    #[error("unknown URL scheme")]
    UnknownScheme,
}

pub type DecodeResult<T> = Result<T, DecodeError>;

pub(super) type QueryMap<'a> = BTreeMap<Cow<'a, str>, Cow<'a, str>>;

fn split_scheme(link: &str) -> Option<(String, &str)> {
    let (scheme, rest) = link.split_once("://")?;
    Some((scheme.to_ascii_lowercase(), rest))
}

/// The node kind a link would decode to, judged by its scheme only.
pub fn link_kind(link: &str) -> Option<NodeKind> {
    let (scheme, _) = split_scheme(link.trim())?;
    Some(match &*scheme {
        "vmess" => NodeKind::VMess,
        "ss" => NodeKind::Shadowsocks,
        "ssr" => NodeKind::ShadowsocksR,
        "trojan" => NodeKind::Trojan,
        "http" | "https" => NodeKind::Http,
        "socks" | "socks5" => NodeKind::Socks,
        _ => return None,
    })
}

pub fn decode_share_link(link: &str) -> DecodeResult<Node> {
    let link = link.trim();
    let (scheme, body) = split_scheme(link).ok_or(DecodeError::UnknownScheme)?;

    match &*scheme {
        "vmess" => return VMessProxy::decode_share_link(body),
        "ssr" => return ShadowsocksRProxy::decode_share_link(body),
        "ss" => return ShadowsocksProxy::decode_share_link(body),
        "trojan" | "http" | "https" | "socks" | "socks5" => {}
        _ => return Err(DecodeError::UnknownScheme),
    }

    let url = Url::parse(link).map_err(|_| DecodeError::InvalidUrl)?;
    let mut queries = url.query_pairs().collect::<QueryMap>();

    let mut node = match &*scheme {
        "trojan" => TrojanProxy::decode_share_link(&url, &mut queries)?,
        "http" | "https"
            if url
                .host_str()
                .filter(|h| h.eq_ignore_ascii_case("t.me"))
                .is_some() =>
        {
            return Err(DecodeError::UnknownScheme)
        }
        "http" | "https" => HttpProxy::decode_share_link(&url, &mut queries)?,
        _ => SocksProxy::decode_share_link(&url, &mut queries)?,
    };
    keep_extra_queries(&mut node, queries);
    Ok(node)
}

/// Moves every query parameter the scheme did not consume into the
/// extension bag.
pub(super) fn keep_extra_queries(node: &mut Node, mut queries: QueryMap) {
    while let Some((extra_key, extra_value)) = queries.pop_first() {
        if !extra_value.is_empty() {
            node.extension
                .insert(extra_key.into_owned(), Scalar::Str(extra_value.into_owned()));
        }
    }
}

/// Removes the first of `keys` with a non-blank value. All of `keys` are
/// consumed.
pub(super) fn take_query(queries: &mut QueryMap, keys: &[&str]) -> Option<String> {
    let mut found = None;
    for key in keys {
        if let Some(v) = queries.remove(*key) {
            if found.is_none() && !v.trim().is_empty() {
                found = Some(v.trim().to_string());
            }
        }
    }
    found
}

/// Username and password from the URL userinfo. A single `user:pass` token
/// without an explicit password is split at the first colon.
pub(super) fn decode_userinfo(url: &Url) -> DecodeResult<(String, String)> {
    let username = percent_decode_utf8(url.username())?;
    let password = percent_decode_utf8(url.password().unwrap_or_default())?;
    if password.is_empty() {
        if let Some((user, pass)) = username.split_once(':') {
            return Ok((user.to_string(), pass.to_string()));
        }
    }
    Ok((username, password))
}

/// Reads the TLS-related parameters shared by http and socks links.
pub(super) fn read_tls_queries(node: &mut Node, queries: &mut QueryMap, force_tls: bool) {
    let tls = take_query(queries, &["tls"])
        .map(|s| crate::coerce::parse_flag(&s))
        .unwrap_or(false);
    node.tls.enabled = force_tls || tls;
    node.tls.skip_cert_check = take_query(queries, &["skip-cert-verify", "allowInsecure"])
        .map(|s| crate::coerce::parse_flag(&s))
        .unwrap_or(false);
    node.tls.sni = take_query(queries, &["sni", "host", "servername"]);
    if node.tls.enabled && node.tls.sni.is_none() && !is_ip_literal(&node.server) {
        node.tls.sni = Some(node.server.clone());
    }
}

/// Decodes a display name from a URI fragment. `+` stands for a space
/// unless the fragment already encodes spaces another way.
pub(crate) fn decode_name(frag: &str) -> String {
    let frag = if frag.contains(' ') || frag.contains("%20") {
        Cow::Borrowed(frag)
    } else {
        Cow::Owned(frag.replace('+', " "))
    };
    percent_decode_str(&frag).decode_utf8_lossy().trim().to_string()
}

pub(super) fn extract_name_from_frag(url: &Url) -> Option<String> {
    url.fragment().map(decode_name).filter(|s| !s.is_empty())
}

pub(super) fn percent_decode_utf8(s: &str) -> DecodeResult<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| DecodeError::InvalidEncoding)
}

/// Host of a parsed URL without IPv6 brackets.
pub(super) fn url_host(url: &Url) -> DecodeResult<String> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(DecodeError::MissingInfo("server"))?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    percent_decode_utf8(host)
}

pub(crate) fn is_ip_literal(host: &str) -> bool {
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse::<IpAddr>().is_ok()
}

pub(crate) fn decode_base64_lenient(s: &str) -> Option<Vec<u8>> {
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    BASE64_ENGINE
        .decode(&s)
        .or_else(|_| BASE64_URL_ENGINE.decode(&s))
        .ok()
}

/// Base64 in either alphabet, padded or not, to UTF-8 text.
pub(crate) fn decode_base64_text(s: &str) -> DecodeResult<String> {
    let bytes = decode_base64_lenient(s).ok_or(DecodeError::InvalidEncoding)?;
    String::from_utf8(bytes).map_err(|_| DecodeError::InvalidEncoding)
}
