//! Rendering node collections as whole subscription documents.

mod clash;
mod json;
mod links;

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::node::Node;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error(r#"unsupported output format "{0}""#)]
    UnsupportedFormat(String),
    #[error("cannot serialize nodes: {0}")]
    Serialize(String),
}

pub type EncodeResult<T> = Result<T, EncodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Share links, one per line, Base64-wrapped as a whole.
    Base64,
    Clash,
    Json,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Base64 => "text/plain;charset=utf-8",
            Self::Clash => "text/yaml;charset=utf-8",
            Self::Json => "application/json;charset=utf-8",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = EncodeError;

    /// An empty name selects Base64.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match &*s.trim().to_ascii_lowercase() {
            "" | "base64" => Self::Base64,
            "clash" => Self::Clash,
            "json" => Self::Json,
            _ => return Err(EncodeError::UnsupportedFormat(s.into())),
        })
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Base64 => "base64",
            Self::Clash => "clash",
            Self::Json => "json",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedSubscription {
    pub content: String,
    pub content_type: &'static str,
}

/// Renders `nodes` in the format named by `format`. Nothing is rendered when
/// the name is not supported.
pub fn encode_subscription(nodes: &[Node], format: &str) -> EncodeResult<EncodedSubscription> {
    encode_subscription_as(nodes, format.parse()?)
}

pub fn encode_subscription_as(
    nodes: &[Node],
    format: ExportFormat,
) -> EncodeResult<EncodedSubscription> {
    let content = match format {
        ExportFormat::Base64 => links::encode_base64_links(nodes),
        ExportFormat::Clash => clash::encode_clash(nodes),
        ExportFormat::Json => json::encode_json(nodes)?,
    };
    Ok(EncodedSubscription {
        content,
        content_type: format.content_type(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::protocol::TrojanProxy;
    use crate::node::NodeProtocol;

    #[test]
    fn test_export_format_from_str() {
        let cases = [
            ("", Ok(ExportFormat::Base64)),
            ("Base64", Ok(ExportFormat::Base64)),
            (" clash ", Ok(ExportFormat::Clash)),
            ("json", Ok(ExportFormat::Json)),
            (
                "surge",
                Err(EncodeError::UnsupportedFormat("surge".into())),
            ),
        ];
        for (name, expected) in cases {
            assert_eq!(name.parse::<ExportFormat>(), expected, "{name}");
        }
    }
    #[test]
    fn test_encode_subscription_content_types() {
        let nodes = [Node::new(
            "a.co",
            443,
            NodeProtocol::Trojan(TrojanProxy {
                password: "p".into(),
            }),
        )];
        let cases = [
            ("", "text/plain;charset=utf-8"),
            ("clash", "text/yaml;charset=utf-8"),
            ("json", "application/json;charset=utf-8"),
        ];
        for (format, content_type) in cases {
            let encoded = encode_subscription(&nodes, format).unwrap();
            assert_eq!(encoded.content_type, content_type, "{format}");
            assert!(!encoded.content.is_empty(), "{format}");
        }
    }
    #[test]
    fn test_encode_subscription_unsupported() {
        assert_eq!(
            encode_subscription(&[], "quantumult"),
            Err(EncodeError::UnsupportedFormat("quantumult".into()))
        );
    }
}
