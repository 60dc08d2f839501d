use super::{EncodeError, EncodeResult};
use crate::node::{Node, NodeRecord};

/// A pretty-printed array of wire records.
pub(super) fn encode_json(nodes: &[Node]) -> EncodeResult<String> {
    let records: Vec<NodeRecord> = nodes.iter().map(NodeRecord::from).collect();
    serde_json::to_string_pretty(&records).map_err(|e| EncodeError::Serialize(e.to_string()))
}
