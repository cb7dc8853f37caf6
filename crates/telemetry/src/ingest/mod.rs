//! Message-broker ingestion.
//!
//! [`payload`] decodes broker payloads into readings and is always built;
//! the rumqttc subscriber in [`mqtt`] sits behind the `mqtt` feature.

pub mod payload;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use payload::parse_payload;

#[cfg(feature = "mqtt")]
pub use mqtt::{MqttIngestor, MqttSettings};
