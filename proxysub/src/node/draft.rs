use super::protocol::*;
use super::{Extension, Node, NodeKind, NodeRecordError, NodeTlsLayer, NodeTransport, Scalar};

/// Flat, all-optional view of a node used while a dialect is still
/// collecting fields. Empty strings mean "not given".
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct NodeDraft {
    pub type_name: String,
    pub name: String,
    pub server: String,
    pub port: u16,
    pub uuid: String,
    pub username: String,
    pub password: String,
    pub method: String,
    pub network: String,
    pub path: String,
    pub host: String,
    pub tls: bool,
    pub sni: String,
    pub alpn: Vec<String>,
    pub plugin: String,
    pub plugin_opts: String,
    pub allow_insecure: bool,
    pub extension: Extension,
}

fn non_empty(s: String) -> Option<String> {
    (!s.is_empty()).then_some(s)
}

impl NodeDraft {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn set_ext(&mut self, key: &str, value: impl Into<Scalar>) {
        self.extension.insert(key.into(), value.into());
    }

    pub fn into_node(self) -> Result<Node, NodeRecordError> {
        let kind = NodeKind::from_type_name(&self.type_name)
            .ok_or_else(|| NodeRecordError::UnknownType(self.type_name.clone()))?;
        let implies_tls = matches!(
            &*self.type_name.trim().to_ascii_lowercase(),
            "https" | "socks5-tls"
        ) || kind == NodeKind::Trojan;
        let mut extension = self.extension;
        if !self.username.is_empty() {
            extension.insert("username".into(), Scalar::Str(self.username));
        }
        let protocol = match kind {
            NodeKind::Shadowsocks => NodeProtocol::Shadowsocks(ShadowsocksProxy {
                method: self.method,
                password: self.password,
                plugin: non_empty(self.plugin).map(|name| ShadowsocksPlugin {
                    name,
                    opts: self.plugin_opts,
                }),
            }),
            NodeKind::VMess => NodeProtocol::VMess(VMessProxy { uuid: self.uuid }),
            NodeKind::Trojan => NodeProtocol::Trojan(TrojanProxy {
                password: self.password,
            }),
            NodeKind::ShadowsocksR => NodeProtocol::ShadowsocksR(ShadowsocksRProxy {
                method: self.method,
                password: self.password,
            }),
            NodeKind::Http => NodeProtocol::Http(HttpProxy {
                password: self.password,
            }),
            NodeKind::Socks => NodeProtocol::Socks(SocksProxy {
                password: self.password,
            }),
        };
        let name = if self.name.is_empty() {
            self.server.clone()
        } else {
            self.name
        };
        Ok(Node {
            name,
            server: self.server,
            port: self.port,
            protocol,
            transport: NodeTransport {
                network: non_empty(self.network),
                path: non_empty(self.path),
                host: non_empty(self.host),
            },
            tls: NodeTlsLayer {
                enabled: self.tls || implies_tls,
                sni: non_empty(self.sni),
                alpn: self.alpn,
                skip_cert_check: self.allow_insecure,
            },
            extension,
        })
    }
}

impl From<&Node> for NodeDraft {
    fn from(node: &Node) -> Self {
        let mut draft = NodeDraft {
            type_name: node.kind().as_str().into(),
            name: node.name.clone(),
            server: node.server.clone(),
            port: node.port,
            network: node.transport.network.clone().unwrap_or_default(),
            path: node.transport.path.clone().unwrap_or_default(),
            host: node.transport.host.clone().unwrap_or_default(),
            tls: node.tls.enabled,
            sni: node.tls.sni.clone().unwrap_or_default(),
            alpn: node.tls.alpn.clone(),
            allow_insecure: node.tls.skip_cert_check,
            extension: node.extension.clone(),
            ..Default::default()
        };
        match &node.protocol {
            NodeProtocol::Shadowsocks(ss) => {
                draft.method = ss.method.clone();
                draft.password = ss.password.clone();
                if let Some(plugin) = &ss.plugin {
                    draft.plugin = plugin.name.clone();
                    draft.plugin_opts = plugin.opts.clone();
                }
            }
            NodeProtocol::ShadowsocksR(ssr) => {
                draft.method = ssr.method.clone();
                draft.password = ssr.password.clone();
            }
            NodeProtocol::VMess(vmess) => draft.uuid = vmess.uuid.clone(),
            NodeProtocol::Trojan(trojan) => draft.password = trojan.password.clone(),
            NodeProtocol::Http(http) => draft.password = http.password.clone(),
            NodeProtocol::Socks(socks) => draft.password = socks.password.clone(),
        }
        draft
    }
}
