mod clash;
mod decode;
mod detect;
mod json;
mod quantumult;
mod sip008;
mod surge_proxy_list;
mod uri_list;

use std::fmt;

pub use decode::{decode_subscription, decode_subscription_with_format, DecodeError, DecodeResult};
pub use detect::{detect_format, probe_base64};

use crate::node::{Node, NodeKind};

/// The dialect a subscription document is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionFormat {
    /// One share link per line. `Some(kind)` keeps only links of that kind.
    UriList(Option<NodeKind>),
    Sip008,
    Clash,
    Surge,
    Quantumult,
    /// SIP008 server records and generic node objects, element by element.
    Json,
}

impl SubscriptionFormat {
    /// Maps a declared subscription type. `None` means the type is empty,
    /// `auto` or unknown, and the content has to be inspected.
    pub fn from_declared_type(declared: &str) -> Option<Self> {
        Some(match &*declared.trim().to_ascii_lowercase() {
            "v2ray" => Self::UriList(Some(NodeKind::VMess)),
            "ss" | "sip002" => Self::UriList(Some(NodeKind::Shadowsocks)),
            "trojan" => Self::UriList(Some(NodeKind::Trojan)),
            "mixed" => Self::UriList(None),
            "sip008" => Self::Sip008,
            "clash" => Self::Clash,
            "surge" => Self::Surge,
            "quantumult" => Self::Quantumult,
            "json" => Self::Json,
            _ => return None,
        })
    }
}

impl fmt::Display for SubscriptionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UriList(None) => f.write_str("uri-list"),
            Self::UriList(Some(kind)) => write!(f, "uri-list({kind})"),
            Self::Sip008 => f.write_str("sip008"),
            Self::Clash => f.write_str("clash"),
            Self::Surge => f.write_str("surge"),
            Self::Quantumult => f.write_str("quantumult"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// One unit of the document that did not yield a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedUnit {
    /// 1-based line number, or 1-based element index for JSON arrays.
    pub position: usize,
    pub reason: String,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub nodes: Vec<Node>,
    pub skipped: Vec<SkippedUnit>,
}

impl Subscription {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.skipped.is_empty()
    }
}
