use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeTlsLayer {
    pub enabled: bool,
    pub sni: Option<String>,
    pub alpn: Vec<String>,
    pub skip_cert_check: bool,
}

impl NodeTlsLayer {
    /// Splits a comma-joined ALPN list, dropping blanks.
    pub fn parse_alpn(alpn: &str) -> Vec<String> {
        alpn.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}
