use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksProxy {
    pub method: String,
    pub password: String,
    pub plugin: Option<ShadowsocksPlugin>,
}

/// SIP003 plugin, e.g. `obfs-local` with `obfs=http;obfs-host=a.co`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksPlugin {
    pub name: String,
    pub opts: String,
}

impl ShadowsocksPlugin {
    /// Parses `name;opts` as carried in the `plugin` query parameter.
    pub fn parse(param: &str) -> Option<Self> {
        let (name, opts) = param.split_once(';').unwrap_or((param, ""));
        let name = name.trim();
        (!name.is_empty()).then(|| ShadowsocksPlugin {
            name: name.into(),
            opts: opts.trim().into(),
        })
    }

    pub fn to_param(&self) -> String {
        if self.opts.is_empty() {
            self.name.clone()
        } else {
            format!("{};{}", self.name, self.opts)
        }
    }

    /// Iterates `key=value` pairs of the plugin options.
    pub fn opts_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.opts
            .split(';')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.trim(), v.trim()))
    }
}
