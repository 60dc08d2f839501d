mod v2rayn;

use super::decode::DecodeResult;
use super::encode::EncodeResult;
use crate::node::protocol::VMessProxy;
use crate::node::Node;

impl VMessProxy {
    pub(super) fn decode_share_link(body: &str) -> DecodeResult<Node> {
        v2rayn::decode_v2rayn(body)
    }
    pub(super) fn encode_share_link(&self, node: &Node) -> EncodeResult<String> {
        v2rayn::encode_v2rayn(self, node)
    }
}
