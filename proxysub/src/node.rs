pub mod draft;
pub mod extension;
pub mod protocol;
pub mod record;
pub mod tls;
pub mod transport;

pub use extension::{Extension, Scalar};
pub use protocol::{NodeKind, NodeProtocol};
pub use record::{NodeRecord, NodeRecordError};
pub use tls::NodeTlsLayer;
pub use transport::NodeTransport;

/// A proxy node decoded from one unit of a subscription document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub server: String,
    pub port: u16,
    pub protocol: NodeProtocol,
    pub transport: NodeTransport,
    pub tls: NodeTlsLayer,
    /// Dialect leftovers that have no canonical slot.
    pub extension: Extension,
}

impl Node {
    pub fn new(server: impl Into<String>, port: u16, protocol: NodeProtocol) -> Self {
        let server = server.into();
        Self {
            name: server.clone(),
            server,
            port,
            protocol,
            transport: NodeTransport::default(),
            tls: NodeTlsLayer::default(),
            extension: Extension::new(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.protocol.kind()
    }

    /// Whether the node carries everything its kind needs to be usable.
    pub fn is_valid(&self) -> bool {
        if self.server.is_empty() || self.port == 0 {
            return false;
        }
        match &self.protocol {
            NodeProtocol::Shadowsocks(ss) => !ss.method.is_empty() && !ss.password.is_empty(),
            NodeProtocol::ShadowsocksR(ssr) => !ssr.method.is_empty() && !ssr.password.is_empty(),
            NodeProtocol::VMess(vmess) => !vmess.uuid.is_empty(),
            NodeProtocol::Trojan(trojan) => !trojan.password.is_empty(),
            NodeProtocol::Http(_) | NodeProtocol::Socks(_) => true,
        }
    }

    /// The password of kinds that have one, `None` for vmess.
    pub fn password(&self) -> Option<&str> {
        match &self.protocol {
            NodeProtocol::Shadowsocks(p) => Some(&p.password),
            NodeProtocol::ShadowsocksR(p) => Some(&p.password),
            NodeProtocol::Trojan(p) => Some(&p.password),
            NodeProtocol::Http(p) => Some(&p.password),
            NodeProtocol::Socks(p) => Some(&p.password),
            NodeProtocol::VMess(_) => None,
        }
    }

    pub(crate) fn extension_str(&self, key: &str) -> Option<&str> {
        match self.extension.get(key) {
            Some(Scalar::Str(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}
