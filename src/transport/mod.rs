//! Message transports
//!
//! ## Responsibilities
//!
//! - `Publisher`: outbound status and enriched events
//! - `ImageUploader`: snapshot upload returning a public URL
//! - MQTT client (rumqttc) carrying commands, the V2X feed and publications
//! - HTTP multipart uploader (reqwest)

mod mqtt;
mod types;
mod uploader;

#[cfg(test)]
pub(crate) mod mock;

pub use mqtt::{parse_broker_addr, MqttTransport};
pub use types::*;
pub use uploader::HttpImageUploader;

use crate::error::Result;
use crate::v2x_feed::EventBatch;
use futures::future::BoxFuture;

/// Outbound publication channel
pub trait Publisher: Send + Sync {
    fn publish_status(&self, status: CameraStatus) -> BoxFuture<'_, Result<()>>;

    fn publish_event(&self, batch: EventBatch) -> BoxFuture<'_, Result<()>>;
}

/// Stores an image and returns where it can be fetched
pub trait ImageUploader: Send + Sync {
    fn upload(&self, image: Vec<u8>) -> BoxFuture<'_, Result<String>>;
}
