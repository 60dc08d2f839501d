use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use super::decode::{decode_base64_text, DecodeError, DecodeResult};
use super::encode::{EncodeError, EncodeResult};
use crate::node::protocol::ShadowsocksRProxy;
use crate::node::{Node, NodeProtocol, Scalar};

/// Parameters whose decoded value is written back under the same key.
const PARAM_KEYS: &[&str] = &["obfsparam", "protoparam", "group", "udpport", "uot"];

impl ShadowsocksRProxy {
    /// `ssr://base64(server:port:protocol:method:obfs:base64(password)/?k=base64(v)&...)`
    pub(super) fn decode_share_link(body: &str) -> DecodeResult<Node> {
        let text = decode_base64_text(body.trim())?;
        let (main, params) = text
            .split_once("/?")
            .or_else(|| text.split_once('?'))
            .unwrap_or((&text, ""));

        let mut fields = main.trim().rsplitn(6, ':');
        let mut next_field = |name| {
            fields
                .next()
                .filter(|s| !s.is_empty())
                .ok_or(DecodeError::MissingInfo(name))
        };
        let password_b64 = next_field("password")?;
        let obfs = next_field("obfs")?;
        let method = next_field("method")?;
        let protocol = next_field("protocol")?;
        let port = next_field("port")?;
        let server = next_field("server")?;
        let server = server
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(server);
        let port = port
            .parse::<u16>()
            .ok()
            .filter(|&p| p != 0)
            .ok_or(DecodeError::UnknownValue("port"))?;
        let password = decode_base64_text(password_b64)?;

        let mut node = Node::new(
            server,
            port,
            NodeProtocol::ShadowsocksR(ShadowsocksRProxy {
                method: method.into(),
                password,
            }),
        );
        node.extension.insert("protocol".into(), protocol.into());
        node.extension.insert("obfs".into(), obfs.into());

        for (key, value) in params
            .split('&')
            .filter_map(|kv| kv.split_once('='))
            .filter(|(_, v)| !v.is_empty())
        {
            let Ok(value) = decode_base64_text(value) else {
                continue;
            };
            match key {
                "remarks" if !value.trim().is_empty() => node.name = value.trim().to_string(),
                "remarks" => {}
                key if !value.is_empty() => {
                    node.extension.insert(key.to_string(), Scalar::Str(value));
                }
                _ => {}
            }
        }
        Ok(node)
    }

    pub(super) fn encode_share_link(&self, node: &Node) -> EncodeResult<String> {
        if self.method.is_empty() {
            return Err(EncodeError::MissingInfo("method"));
        }
        if self.password.is_empty() {
            return Err(EncodeError::MissingInfo("password"));
        }
        let server = if node.server.contains(':') {
            format!("[{}]", node.server)
        } else {
            node.server.clone()
        };
        let mut text = format!(
            "{}:{}:{}:{}:{}:{}/?",
            server,
            node.port,
            node.extension_str("protocol").unwrap_or("origin"),
            self.method,
            node.extension_str("obfs").unwrap_or("plain"),
            URL_SAFE_NO_PAD.encode(&self.password),
        );
        for key in PARAM_KEYS {
            if let Some(value) = node.extension_str(key) {
                text.push_str(&format!("{}={}&", key, URL_SAFE_NO_PAD.encode(value)));
            }
        }
        text.push_str("remarks=");
        text.push_str(&URL_SAFE_NO_PAD.encode(&node.name));
        Ok(format!("ssr://{}", URL_SAFE_NO_PAD.encode(text)))
    }
}
