use std::fmt::Display;

use log::debug;
use thiserror::Error;

use super::clash::decode_clash;
use super::detect::{detect_format, probe_base64};
use super::json::decode_json;
use super::quantumult::decode_quantumult;
use super::sip008::decode_sip008;
use super::surge_proxy_list::decode_surge_proxy_list;
use super::uri_list::decode_uri_list;
use super::{SkippedUnit, Subscription, SubscriptionFormat};
use crate::node::Node;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid JSON document: {0}")]
    InvalidJson(String),
    #[error("document matches no known subscription shape")]
    UnknownShape,
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Accumulates decoded nodes and the units that failed, in document order.
#[derive(Debug, Default)]
pub(super) struct NodeCollector {
    sub: Subscription,
}

impl NodeCollector {
    pub fn push(&mut self, position: usize, node: Node) {
        if node.is_valid() {
            self.sub.nodes.push(node);
        } else {
            self.skip(
                position,
                format!("{} node lacks required fields", node.kind()),
            );
        }
    }

    pub fn push_result<E: Display>(&mut self, position: usize, res: Result<Node, E>) {
        match res {
            Ok(node) => self.push(position, node),
            Err(e) => self.skip(position, e),
        }
    }

    pub fn skip(&mut self, position: usize, reason: impl Display) {
        let reason = reason.to_string();
        debug!("Skipping unit at {}: {}", position, reason);
        self.sub.skipped.push(SkippedUnit { position, reason });
    }

    pub fn finish(self) -> Subscription {
        self.sub
    }
}

pub fn decode_subscription(content: &str, declared_type: &str) -> DecodeResult<Subscription> {
    let text = probe_base64(content);
    let format = detect_format(&text, declared_type);
    decode_probed(&text, format)
}

/// Decodes with a known dialect, skipping detection. The outer Base64 layer
/// is still unwrapped.
pub fn decode_subscription_with_format(
    content: &str,
    format: SubscriptionFormat,
) -> DecodeResult<Subscription> {
    decode_probed(&probe_base64(content), format)
}

fn decode_probed(text: &str, format: SubscriptionFormat) -> DecodeResult<Subscription> {
    debug!("Decoding subscription as {}", format);
    if text.trim().is_empty() {
        return Ok(Subscription::default());
    }
    let sub = match format {
        SubscriptionFormat::UriList(filter) => decode_uri_list(text, filter),
        SubscriptionFormat::Sip008 => decode_sip008(text)?,
        SubscriptionFormat::Clash => decode_clash(text),
        SubscriptionFormat::Surge => decode_surge_proxy_list(text),
        SubscriptionFormat::Quantumult => decode_quantumult(text),
        SubscriptionFormat::Json => decode_json(text)?,
    };
    debug!(
        "Decoded {} nodes, skipped {} units",
        sub.nodes.len(),
        sub.skipped.len()
    );
    Ok(sub)
}
