/// Cloud dashboard bridge: telemetry out, manual-override commands in
use std::time::Duration;

use log::{error, info, warn};
use rumqttc::{AsyncClient, Event, LastWill, MqttOptions, Packet, QoS};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;

const KEEP_ALIVE: Duration = Duration::from_secs(30);
const ERROR_BACKOFF: Duration = Duration::from_secs(2);
const EVENT_QUEUE_CAPACITY: usize = 16;
const DISCONNECT_GRACE: Duration = Duration::from_millis(250);

/// Telemetry surface of the cloud dashboard as seen by the control loop.
/// Publish failures are logged, never fatal: telemetry is best-effort.
pub trait Dashboard {
    /// Publish the latest moisture percentage.
    async fn publish_moisture(&self, percent: f64);
    /// Publish the URL of the latest pump snapshot.
    async fn publish_pump_image(&self, url: &str);
}

/// MQTT-backed dashboard publisher. Cheap to clone; all clones share one
/// underlying client.
#[derive(Clone)]
pub struct MqttDashboard {
    client: AsyncClient,
    moisture_topic: String,
    image_topic: String,
    status_topic: String,
}

impl MqttDashboard {
    /// Best-effort retained offline announcement followed by a disconnect,
    /// for the orderly shutdown path.
    ///
    /// Publish and disconnect only enqueue requests; the shared event loop
    /// does the actual network writes. The grace period here lets it drain
    /// the queue before the caller tears the task down.
    pub async fn announce_offline(&self) {
        let _ = self
            .client
            .publish(self.status_topic.as_str(), QoS::AtLeastOnce, true, b"offline".to_vec())
            .await;
        let _ = self.client.disconnect().await;
        tokio::time::sleep(DISCONNECT_GRACE).await;
    }
}

impl Dashboard for MqttDashboard {
    async fn publish_moisture(&self, percent: f64) {
        let payload = format!("{:.2}", percent);
        if let Err(e) = self
            .client
            .publish(self.moisture_topic.as_str(), QoS::AtLeastOnce, false, payload.into_bytes())
            .await
        {
            warn!("Failed to publish moisture reading: {}", e);
        }
    }

    async fn publish_pump_image(&self, url: &str) {
        if let Err(e) = self
            .client
            .publish(self.image_topic.as_str(), QoS::AtLeastOnce, false, url.as_bytes().to_vec())
            .await
        {
            warn!("Failed to publish pump image URL: {}", e);
        }
    }
}

/// Handle to the connected dashboard: the telemetry publisher, the
/// single-slot override command receiver, and the background event-loop
/// task.
pub struct DashboardLink {
    pub dashboard: MqttDashboard,
    pub overrides: watch::Receiver<Option<bool>>,
    pub task: JoinHandle<()>,
}

fn topic(device_id: &str, leaf: &str) -> String {
    format!("plant/{}/{}", device_id, leaf)
}

/// Parse the dashboard's integer 0/1 manual-override command.
fn parse_override(payload: &[u8]) -> Option<bool> {
    let text = std::str::from_utf8(payload).ok()?;
    match text.trim().parse::<i64>().ok()? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

/// Connect to the broker and spawn the event-loop task.
///
/// Inbound override commands land in a watch channel: a single slot with
/// last-write-wins semantics, so the control loop only ever sees the latest
/// unprocessed command. Connection errors back off and retry forever; the
/// rig keeps watering without the dashboard.
pub fn connect(config: &Config) -> DashboardLink {
    let status_topic = topic(&config.device_id, "status");
    let override_topic = topic(&config.device_id, "pump/override");

    let mut options = MqttOptions::new(
        config.device_id.clone(),
        config.mqtt_host.clone(),
        config.mqtt_port,
    );
    options.set_keep_alive(KEEP_ALIVE);
    options.set_credentials(config.device_id.clone(), config.device_token.clone());
    options.set_last_will(LastWill::new(
        status_topic.as_str(),
        b"offline".to_vec(),
        QoS::AtLeastOnce,
        true,
    ));

    let (client, mut eventloop) = AsyncClient::new(options, EVENT_QUEUE_CAPACITY);
    let (tx, rx) = watch::channel(None);

    let dashboard = MqttDashboard {
        client: client.clone(),
        moisture_topic: topic(&config.device_id, "moisture"),
        image_topic: topic(&config.device_id, "pump/image"),
        status_topic: status_topic.clone(),
    };

    let task = tokio::spawn(async move {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Dashboard connected");

                    // Re-subscribe on every (re)connect; the broker may have
                    // dropped the session in between.
                    if let Err(e) = client.subscribe(override_topic.as_str(), QoS::AtLeastOnce).await {
                        error!("Failed to subscribe to {}: {}", override_topic, e);
                    }
                    let _ = client
                        .publish(status_topic.as_str(), QoS::AtLeastOnce, true, b"online".to_vec())
                        .await;
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if publish.topic != override_topic {
                        warn!("Unhandled topic {}", publish.topic);
                        continue;
                    }
                    match parse_override(&publish.payload) {
                        Some(on) => {
                            info!("Manual pump control: {}", if on { "On" } else { "Off" });
                            if tx.send(Some(on)).is_err() {
                                // Control loop is gone; nothing left to drive
                                break;
                            }
                        }
                        None => warn!("Ignoring malformed override payload"),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Dashboard connection error: {}", e);
                    tokio::time::sleep(ERROR_BACKOFF).await;
                }
            }
        }
    });

    DashboardLink {
        dashboard,
        overrides: rx,
        task,
    }
}
