use std::fmt;

use serde::{Deserialize, Serialize};

mod http;
mod shadowsocks;
mod shadowsocksr;
mod socks;
mod trojan;
mod vmess;

pub use http::HttpProxy;
pub use shadowsocks::{ShadowsocksPlugin, ShadowsocksProxy};
pub use shadowsocksr::ShadowsocksRProxy;
pub use socks::SocksProxy;
pub use trojan::TrojanProxy;
pub use vmess::VMessProxy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeProtocol {
    Shadowsocks(ShadowsocksProxy),
    VMess(VMessProxy),
    Trojan(TrojanProxy),
    ShadowsocksR(ShadowsocksRProxy),
    Http(HttpProxy),
    Socks(SocksProxy),
}

impl NodeProtocol {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeProtocol::Shadowsocks(_) => NodeKind::Shadowsocks,
            NodeProtocol::VMess(_) => NodeKind::VMess,
            NodeProtocol::Trojan(_) => NodeKind::Trojan,
            NodeProtocol::ShadowsocksR(_) => NodeKind::ShadowsocksR,
            NodeProtocol::Http(_) => NodeKind::Http,
            NodeProtocol::Socks(_) => NodeKind::Socks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Shadowsocks,
    VMess,
    Trojan,
    ShadowsocksR,
    Http,
    Socks,
}

impl NodeKind {
    pub const ALL: [NodeKind; 6] = [
        NodeKind::Shadowsocks,
        NodeKind::VMess,
        NodeKind::Trojan,
        NodeKind::ShadowsocksR,
        NodeKind::Http,
        NodeKind::Socks,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Shadowsocks => "ss",
            NodeKind::VMess => "vmess",
            NodeKind::Trojan => "trojan",
            NodeKind::ShadowsocksR => "ssr",
            NodeKind::Http => "http",
            NodeKind::Socks => "socks",
        }
    }

    /// Maps a type name used by any dialect to a kind. `https` and `socks5-tls`
    /// map to their plain kinds; callers decide whether TLS is implied.
    pub fn from_type_name(name: &str) -> Option<Self> {
        Some(match &*name.trim().to_ascii_lowercase() {
            "ss" | "shadowsocks" => NodeKind::Shadowsocks,
            "vmess" => NodeKind::VMess,
            "trojan" => NodeKind::Trojan,
            "ssr" | "shadowsocksr" => NodeKind::ShadowsocksR,
            "http" | "https" => NodeKind::Http,
            "socks" | "socks5" | "socks5-tls" => NodeKind::Socks,
            _ => return None,
        })
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
