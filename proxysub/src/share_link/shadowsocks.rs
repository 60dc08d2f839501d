use std::borrow::Cow;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use super::decode::{
    decode_base64_text, decode_name, keep_extra_queries, percent_decode_utf8, DecodeError,
    DecodeResult, QueryMap,
};
use super::encode::{encode_name, url_encode_host, EncodeError, EncodeResult};
use crate::node::protocol::{ShadowsocksPlugin, ShadowsocksProxy};
use crate::node::{Node, NodeProtocol};

/// Splits `host:port`, where host may be a bracketed IPv6 literal and port
/// may carry a trailing `/`.
pub(super) fn split_host_port(s: &str) -> DecodeResult<(String, u16)> {
    let s = s.trim().trim_end_matches('/');
    let (host, port) = match s.strip_prefix('[') {
        Some(rest) => rest.split_once("]:"),
        None => s.rsplit_once(':'),
    }
    .ok_or(DecodeError::MissingInfo("port"))?;
    if host.is_empty() {
        return Err(DecodeError::MissingInfo("server"));
    }
    let port = port
        .parse::<u16>()
        .ok()
        .filter(|&p| p != 0)
        .ok_or(DecodeError::UnknownValue("port"))?;
    Ok((host.to_string(), port))
}

impl ShadowsocksProxy {
    /// Accepts both `ss://base64(method:password)@host:port` and the
    /// all-in-one `ss://base64(method:password@host:port)`.
    pub(super) fn decode_share_link(body: &str) -> DecodeResult<Node> {
        let (body, name) = match body.split_once('#') {
            Some((body, frag)) => (body, Some(decode_name(frag)).filter(|n| !n.is_empty())),
            None => (body, None),
        };
        let (body, query) = body.split_once('?').unwrap_or((body, ""));
        let mut queries = url::form_urlencoded::parse(query.as_bytes()).collect::<QueryMap>();
        let plugin = queries
            .remove("plugin")
            .and_then(|p| ShadowsocksPlugin::parse(&p));

        let body = percent_decode_utf8(body.trim().trim_end_matches('/'))?;
        let plain = if body.contains('@') {
            body
        } else {
            decode_base64_text(&body)?
        };
        let (auth, host_port) = plain
            .rsplit_once('@')
            .ok_or(DecodeError::MissingInfo("server"))?;
        let auth = if auth.contains(':') {
            Cow::Borrowed(auth)
        } else {
            Cow::Owned(decode_base64_text(auth)?)
        };
        let (method, password) = auth
            .split_once(':')
            .ok_or(DecodeError::MissingInfo("password"))?;
        if method.trim().is_empty() {
            return Err(DecodeError::MissingInfo("method"));
        }
        if password.is_empty() {
            return Err(DecodeError::MissingInfo("password"));
        }
        let (server, port) = split_host_port(host_port)?;

        let mut node = Node::new(
            server,
            port,
            NodeProtocol::Shadowsocks(ShadowsocksProxy {
                method: method.trim().to_string(),
                password: password.to_string(),
                plugin,
            }),
        );
        if let Some(name) = name {
            node.name = name;
        }
        keep_extra_queries(&mut node, queries);
        Ok(node)
    }

    pub(super) fn encode_share_link(&self, node: &Node) -> EncodeResult<String> {
        if self.method.is_empty() {
            return Err(EncodeError::MissingInfo("method"));
        }
        if self.password.is_empty() {
            return Err(EncodeError::MissingInfo("password"));
        }
        let userinfo = URL_SAFE_NO_PAD.encode(format!("{}:{}", self.method, self.password));
        let mut link = format!(
            "ss://{}@{}:{}",
            userinfo,
            url_encode_host(&node.server),
            node.port
        );
        if let Some(plugin) = &self.plugin {
            link.push('?');
            link.push_str(
                &url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("plugin", &plugin.to_param())
                    .finish(),
            );
        }
        link.push('#');
        link.push_str(&encode_name(&node.name));
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD;
    use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

    use super::*;
    use crate::node::Scalar;

    fn ss(method: &str, password: &str, plugin: Option<ShadowsocksPlugin>) -> NodeProtocol {
        NodeProtocol::Shadowsocks(ShadowsocksProxy {
            method: method.into(),
            password: password.into(),
            plugin,
        })
    }

    #[test]
    fn test_decode_sip002_with_plugin() {
        let node = ShadowsocksProxy::decode_share_link(
            "YWVzLTI1Ni1nY206cGFzcw==@example.com:8388?plugin=obfs-local%3Bobfs%3Dhttp#MyNode",
        )
        .unwrap();
        let mut expected = Node::new(
            "example.com",
            8388,
            ss(
                "aes-256-gcm",
                "pass",
                Some(ShadowsocksPlugin {
                    name: "obfs-local".into(),
                    opts: "obfs=http".into(),
                }),
            ),
        );
        expected.name = "MyNode".into();
        assert_eq!(node, expected);
    }
    #[test]
    fn test_decode_sip002_hosts() {
        let hosts = [
            ("3.187.225.7", "3.187.225.7"),
            ("a.co", "a.co"),
            ("[::1]", "::1"),
        ];
        for (host_part, expected_host) in hosts {
            let node = ShadowsocksProxy::decode_share_link(&format!(
                "YWVzLTI1Ni1jZmI6VVlMMUV2a2ZJMGNUNk5PWQ==@{host_part}:34187"
            ))
            .unwrap();
            assert_eq!(
                node,
                Node::new(expected_host, 34187, ss("aes-256-cfb", "UYL1EvkfI0cT6NOY", None))
            );
        }
    }
    #[test]
    fn test_decode_sip002_percent_encoded_userinfo() {
        let node = ShadowsocksProxy::decode_share_link(
            "YWVzLTI1Ni1jZmI6VVlMMUV2a2ZJMGNUNk5PWQ%3D%3D@a.co:1080/?group=g#c%2Fd",
        )
        .unwrap();
        assert_eq!(node.name, "c/d");
        assert_eq!(node.port, 1080);
        assert_eq!(node.extension.get("group"), Some(&Scalar::Str("g".into())));
    }
    #[test]
    fn test_decode_plain_userinfo() {
        let node = ShadowsocksProxy::decode_share_link("rc4-md5:p@ss@a.co:8388").unwrap();
        assert_eq!(node.protocol, ss("rc4-md5", "p@ss", None));
    }
    #[test]
    fn test_decode_legacy() {
        let body = utf8_percent_encode(
            &STANDARD.encode("aes-256-cfb:UYL1EvkfI0cT6NOY@a.co:34187"),
            NON_ALPHANUMERIC,
        )
        .to_string();
        let node = ShadowsocksProxy::decode_share_link(&body).unwrap();
        assert_eq!(
            node,
            Node::new("a.co", 34187, ss("aes-256-cfb", "UYL1EvkfI0cT6NOY", None))
        );
    }
    #[test]
    fn test_decode_legacy_no_padding() {
        let node = ShadowsocksProxy::decode_share_link(
            "YWVzLTI1Ni1jZmI6VVlMMUV2a2ZJMGNUNk5PWUAzLjE4Ny4yMjUuNzozNDE4Nw#x",
        )
        .unwrap();
        assert_eq!(node.server, "3.187.225.7");
        assert_eq!(node.port, 34187);
        assert_eq!(node.name, "x");
    }
    #[test]
    fn test_decode_legacy_invalid() {
        let cases: [(&[u8], DecodeError); 6] = [
            (b"rc4:a@", DecodeError::MissingInfo("port")),
            (b"rc4:a@a", DecodeError::MissingInfo("port")),
            (b"rc4:a@:114", DecodeError::MissingInfo("server")),
            (b"rc4:a@a.co:cc", DecodeError::UnknownValue("port")),
            (b"rc4@a.co:114", DecodeError::InvalidEncoding),
            (b"a.co:114", DecodeError::MissingInfo("server")),
        ];
        for (raw_value, expected) in cases {
            let res = ShadowsocksProxy::decode_share_link(&STANDARD.encode(raw_value));
            assert_eq!(res.unwrap_err(), expected, "{:?}", raw_value);
        }
    }
    #[test]
    fn test_decode_invalid_base64() {
        for body in ["%ff%ff", "あ"] {
            assert!(ShadowsocksProxy::decode_share_link(body).is_err(), "{body}");
        }
    }
    #[test]
    fn test_decode_empty_password() {
        let res = ShadowsocksProxy::decode_share_link("aes-128-gcm:@a.co:8388");
        assert_eq!(res.unwrap_err(), DecodeError::MissingInfo("password"));
    }

    #[test]
    fn test_encode_share_link() {
        let mut node = Node::new(
            "a.co",
            8388,
            ss(
                "aes-256-gcm",
                "pass",
                Some(ShadowsocksPlugin {
                    name: "obfs-local".into(),
                    opts: "obfs=http".into(),
                }),
            ),
        );
        node.name = "MyNode".into();
        assert_eq!(
            crate::share_link::encode_share_link(&node).unwrap(),
            "ss://YWVzLTI1Ni1nY206cGFzcw@a.co:8388?plugin=obfs-local%3Bobfs%3Dhttp#MyNode"
        );
    }
    #[test]
    fn test_encode_share_link_missing_method() {
        let node = Node::new("a.co", 8388, ss("", "pass", None));
        assert_eq!(
            crate::share_link::encode_share_link(&node),
            Err(EncodeError::MissingInfo("method"))
        );
    }
}
