//! MQTT transport (rumqttc)

use super::{CameraStatus, Inbound, Publisher, TopicMap, EVENT_TOPIC_PREFIX};
use crate::config_store::ConnectionConfig;
use crate::error::{Error, Result};
use crate::v2x_feed::EventBatch;
use futures::future::BoxFuture;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;

const KEEP_ALIVE: Duration = Duration::from_secs(10);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const BROKER_USERNAME: &str = "admin";
const BROKER_PASSWORD: &str = "public";

/// Split `tcp://host:port` (scheme and port optional) into host and port
pub fn parse_broker_addr(addr: &str) -> Result<(String, u16)> {
    let rest = addr
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(addr)
        .trim_end_matches('/');

    match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse()
                .map_err(|_| Error::Config(format!("invalid MQTT port in '{}'", addr)))?;
            if host.is_empty() {
                return Err(Error::Config(format!("missing MQTT host in '{}'", addr)));
            }
            Ok((host.to_string(), port))
        }
        None if !rest.is_empty() => Ok((rest.to_string(), 1883)),
        None => Err(Error::Config("empty MQTT address".to_string())),
    }
}

/// MQTT session shared by every camera of this process
pub struct MqttTransport {
    client: AsyncClient,
    event_topic: String,
}

impl MqttTransport {
    /// Create the client; nothing is sent until the event loop is polled
    pub fn connect(conn: &ConnectionConfig) -> Result<(Self, EventLoop)> {
        let (host, port) = parse_broker_addr(conn.mqtt_addr())?;
        let device_sn = conn.device_sn();
        let client_id = format!("ptz-{}-{:08x}", device_sn, rand::random::<u32>());

        let mut options = MqttOptions::new(client_id.clone(), host.clone(), port);
        options.set_keep_alive(KEEP_ALIVE);
        options.set_clean_session(true);
        options.set_credentials(BROKER_USERNAME, BROKER_PASSWORD);

        let (client, eventloop) = AsyncClient::new(options, 64);

        tracing::info!(
            host = %host,
            port,
            client_id = %client_id,
            "MQTT client created"
        );

        Ok((
            Self {
                client,
                event_topic: format!("{}{}", EVENT_TOPIC_PREFIX, device_sn),
            },
            eventloop,
        ))
    }

    pub fn event_topic(&self) -> &str {
        &self.event_topic
    }

    /// Drive the connection, forwarding decoded messages to `sink`
    ///
    /// Subscriptions are renewed on every ConnAck since the session is clean.
    /// Returns when `sink` is closed.
    pub async fn run(&self, mut eventloop: EventLoop, topics: TopicMap, sink: mpsc::Sender<Inbound>) {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    tracing::info!("MQTT connected");
                    for topic in topics.subscriptions() {
                        if let Err(e) = self.client.subscribe(topic.as_str(), QoS::AtMostOnce).await {
                            tracing::warn!(topic = %topic, error = %e, "MQTT subscribe failed");
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    match topics.decode(&publish.topic, &publish.payload) {
                        Ok(Some(inbound)) => {
                            if sink.send(inbound).await.is_err() {
                                tracing::info!("Inbound sink closed, stopping MQTT loop");
                                return;
                            }
                        }
                        Ok(None) => {
                            tracing::trace!(topic = %publish.topic, "Ignoring message on foreign topic");
                        }
                        Err(e) => {
                            tracing::warn!(topic = %publish.topic, error = %e, "Dropping undecodable message");
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "MQTT connection error, reconnecting");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    async fn publish_json(&self, topic: String, payload: Vec<u8>, qos: QoS) -> Result<()> {
        self.client
            .publish(topic, qos, false, payload)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

impl Publisher for MqttTransport {
    fn publish_status(&self, status: CameraStatus) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let payload = serde_json::to_vec(&status)?;
            tracing::trace!(camera = %status.device_serial, "Publishing status");
            self.publish_json(status.topic(), payload, QoS::AtMostOnce).await
        })
    }

    fn publish_event(&self, batch: EventBatch) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let payload = serde_json::to_vec(&batch)?;
            tracing::info!(topic = %self.event_topic, "Publishing traffic event");
            self.publish_json(self.event_topic.clone(), payload, QoS::AtLeastOnce)
                .await
        })
    }
}
