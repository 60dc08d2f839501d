use super::decode::NodeCollector;
use super::Subscription;
use crate::node::NodeKind;
use crate::share_link::{decode_base64_text, decode_share_link, link_kind, DecodeError};

fn decode_line(line: &str, position: usize, filter: Option<NodeKind>, out: &mut NodeCollector) {
    let Some(kind) = link_kind(line) else {
        return;
    };
    if filter.is_some_and(|f| f != kind) {
        return;
    }
    match decode_share_link(line) {
        Err(DecodeError::UnknownScheme) => {}
        res => out.push_result(position, res),
    }
}

/// One share link per line. Lines that are themselves Base64 blobs of links
/// are unwrapped in place and report the position of the outer line.
pub fn decode_uri_list(text: &str, filter: Option<NodeKind>) -> Subscription {
    let mut out = NodeCollector::default();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.contains("://") {
            decode_line(line, idx + 1, filter, &mut out);
            continue;
        }
        let Ok(inner) = decode_base64_text(line) else {
            continue;
        };
        for inner in inner.lines().map(str::trim).filter(|l| l.contains("://")) {
            decode_line(inner, idx + 1, filter, &mut out);
        }
    }
    out.finish()
}
