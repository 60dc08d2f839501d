//! Single-node share links: `vmess://`, `ss://`, `ssr://`, `trojan://`,
//! `http(s)://` and `socks(5)://`.

mod decode;
mod encode;
mod http;
mod shadowsocks;
mod shadowsocksr;
mod socks5;
mod trojan;
mod vmess;

pub use decode::{decode_share_link, link_kind, DecodeError, DecodeResult};
pub use encode::{encode_share_link, EncodeError, EncodeResult};

pub(crate) use decode::{decode_base64_text, decode_name, is_ip_literal, BASE64_ENGINE};
