//! MQTT subscriber feeding readings into the telemetry service.

use crate::error::{TelemetryError, TelemetryResult};
use crate::ingest::payload::parse_payload;
use crate::service::{IngestSource, TelemetryService};
use crate::types::ReadingKind;
use chrono::Utc;
use config::MqttConfig;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, Publish, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection and topic settings for [`MqttIngestor`].
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub temperature_topic: String,
    pub humidity_topic: String,
    pub keep_alive: Duration,
    pub reconnect_delay: Duration,
    pub qos: QoS,
}

impl MqttSettings {
    pub fn from_config(config: &MqttConfig) -> TelemetryResult<Self> {
        let qos = match config.qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            other => {
                return Err(TelemetryError::ConfigError(format!(
                    "mqtt qos must be 0, 1 or 2, got {}",
                    other
                )))
            }
        };

        Ok(Self {
            host: config.broker_host.clone(),
            port: config.broker_port,
            client_id: config.client_id.clone(),
            temperature_topic: config.temperature_topic.clone(),
            humidity_topic: config.humidity_topic.clone(),
            keep_alive: Duration::from_secs(config.keep_alive_seconds.max(1)),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_seconds),
            qos,
        })
    }

    /// Reading kind carried by `topic`, if it is one of ours.
    pub fn kind_for_topic(&self, topic: &str) -> Option<ReadingKind> {
        if topic == self.temperature_topic {
            Some(ReadingKind::Temperature)
        } else if topic == self.humidity_topic {
            Some(ReadingKind::Humidity)
        } else {
            None
        }
    }

    fn topics(&self) -> [&str; 2] {
        [&self.temperature_topic, &self.humidity_topic]
    }
}

/// Subscribes to the temperature and humidity topics and ingests every
/// decodable payload.
pub struct MqttIngestor {
    service: Arc<TelemetryService>,
    settings: MqttSettings,
}

impl MqttIngestor {
    pub fn new(service: Arc<TelemetryService>, settings: MqttSettings) -> Self {
        Self { service, settings }
    }

    fn connect(&self) -> (AsyncClient, EventLoop) {
        let mut options = MqttOptions::new(
            self.settings.client_id.clone(),
            self.settings.host.clone(),
            self.settings.port,
        );
        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(true);
        AsyncClient::new(options, 16)
    }

    /// Poll the broker until `shutdown` is cancelled.
    ///
    /// The event loop reconnects on the next poll after an error; topics are
    /// re-subscribed on every ConnAck since sessions are clean.
    pub async fn run(&self, shutdown: CancellationToken) {
        let (client, mut eventloop) = self.connect();
        info!(
            host = %self.settings.host,
            port = self.settings.port,
            temperature_topic = %self.settings.temperature_topic,
            humidity_topic = %self.settings.humidity_topic,
            "Starting MQTT ingestor"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("MQTT ingestor shutting down");
                    if let Err(e) = client.try_disconnect() {
                        debug!(error = %e, "MQTT disconnect failed");
                    }
                    return;
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Connected to MQTT broker");
                        self.subscribe(&client);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        self.handle_publish(&publish).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "MQTT connection error");
                        tokio::select! {
                            _ = shutdown.cancelled() => {}
                            _ = tokio::time::sleep(self.settings.reconnect_delay) => {}
                        }
                    }
                }
            }
        }
    }

    fn subscribe(&self, client: &AsyncClient) {
        for topic in self.settings.topics() {
            match client.try_subscribe(topic, self.settings.qos) {
                Ok(()) => info!(topic, "Subscribed"),
                Err(e) => error!(topic, error = %e, "Subscribe failed"),
            }
        }
    }

    async fn handle_publish(&self, publish: &Publish) {
        let Some(kind) = self.settings.kind_for_topic(&publish.topic) else {
            debug!(topic = %publish.topic, "Ignoring message on unknown topic");
            return;
        };

        let reading = match parse_payload(&publish.topic, kind, &publish.payload, Utc::now()) {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = %e, "Dropping MQTT payload");
                self.service.record_rejection(&e);
                return;
            }
        };

        if let Err(e) = self.service.ingest(reading, IngestSource::Mqtt).await {
            error!(topic = %publish.topic, error = %e, "Failed to store MQTT reading");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryReadingStore;

    fn settings() -> MqttSettings {
        MqttSettings::from_config(&MqttConfig::default()).unwrap()
    }

    #[test]
    fn test_settings_from_config() {
        let settings = settings();
        assert_eq!(settings.port, 1883);
        assert_eq!(settings.qos, QoS::AtMostOnce);
        assert_eq!(
            settings.kind_for_topic("weatherhub/humidity"),
            Some(ReadingKind::Humidity)
        );
        assert_eq!(settings.kind_for_topic("weatherhub/pressure"), None);

        let config = MqttConfig {
            qos: 3,
            ..MqttConfig::default()
        };
        assert!(MqttSettings::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_handle_publish_ingests_and_drops() {
        let service = Arc::new(TelemetryService::new(Arc::new(InMemoryReadingStore::new())));
        let ingestor = MqttIngestor::new(service.clone(), settings());

        let good = Publish::new("weatherhub/temperature", QoS::AtMostOnce, "19.5");
        let bad = Publish::new("weatherhub/humidity", QoS::AtMostOnce, "humid");
        let other = Publish::new("elsewhere", QoS::AtMostOnce, "1");

        ingestor.handle_publish(&good).await;
        ingestor.handle_publish(&bad).await;
        ingestor.handle_publish(&other).await;

        assert_eq!(service.counts().await.unwrap().raw_readings, 1);
        assert_eq!(service.latest().temperature.map(|v| v.value), Some(19.5));
    }
}
