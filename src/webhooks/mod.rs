//! Synchronous webhooks: payload rendering, delivery records, transport and
//! the plugin that ties them to payment operations.

pub mod payload;
pub mod plugin;
pub mod recorder;
pub mod subscription;
pub mod transport;

pub use plugin::WebhookPlugin;
pub use recorder::record_delivery;
pub use transport::{HttpDispatcher, SyncDispatcher};
