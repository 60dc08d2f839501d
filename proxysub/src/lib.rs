//! Decoding and encoding of proxy subscription documents.
//!
//! A subscription is fetched elsewhere and handed over as text. It is decoded
//! into [`Node`]s by [`decode_subscription`], and node collections are
//! rendered back by [`encode_subscription`].

pub mod coerce;
pub mod export;
pub mod node;
pub mod share_link;
pub mod subscription;

pub use export::{encode_subscription, encode_subscription_as, EncodedSubscription, ExportFormat};
pub use node::{Node, NodeKind, NodeRecord};
pub use subscription::{
    decode_subscription, decode_subscription_with_format, detect_format, Subscription,
    SubscriptionFormat,
};
