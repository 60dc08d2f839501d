use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::warn;

use crate::node::Node;
use crate::share_link::encode_share_link;

/// Newline-terminated share links of every node that can be rendered.
pub(super) fn encode_links(nodes: &[Node]) -> String {
    let mut text = String::new();
    for node in nodes {
        match encode_share_link(node) {
            Ok(link) => {
                text.push_str(&link);
                text.push('\n');
            }
            Err(e) => warn!("Skipping {} node {}: {}", node.kind(), node.name, e),
        }
    }
    text
}

pub(super) fn encode_base64_links(nodes: &[Node]) -> String {
    STANDARD.encode(encode_links(nodes))
}
