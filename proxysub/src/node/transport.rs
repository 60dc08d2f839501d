use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTransport {
    /// Transport name such as `tcp` or `ws`.
    pub network: Option<String>,
    pub path: Option<String>,
    /// HTTP `Host` header sent by the transport.
    pub host: Option<String>,
}

impl NodeTransport {
    pub fn is_ws(&self) -> bool {
        self.network.as_deref() == Some("ws")
    }
}
