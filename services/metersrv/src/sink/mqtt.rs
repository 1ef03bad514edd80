//! MQTT sink following the Wirenboard device conventions.
//!
//! Values land on `/devices/<id>/controls/<key>`; schema declaration
//! publishes the retained `meta/type` and `meta/readonly` topics per
//! control plus the device `meta/name`; errors go to the device
//! `meta/error` topic.

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use tracing::{debug, info, warn};

use ce102m::{MeterError, ParamKind, Result, Sink};

const DEVICE_NAME: &str = "Energomera CE102M";

/// Publishing client for one Wirenboard-style device subtree.
pub struct MqttSink {
    client: AsyncClient,
    device: String,
}

impl MqttSink {
    /// Connect to the broker and spawn the event loop driver.
    pub async fn connect(host: &str, port: u16, device: &str) -> anyhow::Result<Self> {
        let client_id = format!("metersrv-{device}");
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));

        let (client, mut eventloop) = AsyncClient::new(options, 64);
        tokio::spawn(async move {
            loop {
                if let Err(e) = eventloop.poll().await {
                    warn!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });

        info!(host, port, device, "MQTT sink connected");
        Ok(Self {
            client,
            device: device.to_string(),
        })
    }

    async fn publish_retained(&self, topic: String, payload: &str) -> Result<()> {
        self.client
            .publish(topic, QoS::AtLeastOnce, true, payload)
            .await
            .map_err(|e| MeterError::Sink(e.to_string()))
    }
}

#[async_trait]
impl Sink for MqttSink {
    async fn declare_schema(&mut self, schema: &[(&'static str, ParamKind)]) -> Result<()> {
        debug!(device = %self.device, controls = schema.len(), "declaring schema");
        self.publish_retained(format!("/devices/{}/meta/name", self.device), DEVICE_NAME)
            .await?;
        for (key, kind) in schema {
            let base = format!("/devices/{}/controls/{}", self.device, key);
            self.publish_retained(format!("{base}/meta/type"), kind.as_str())
                .await?;
            self.publish_retained(format!("{base}/meta/readonly"), "1")
                .await?;
        }
        Ok(())
    }

    async fn publish(&mut self, key: &str, value: &str) -> Result<()> {
        self.publish_retained(format!("/devices/{}/controls/{}", self.device, key), value)
            .await
    }

    async fn report_error(&mut self, message: &str) -> Result<()> {
        self.publish_retained(format!("/devices/{}/meta/error", self.device), message)
            .await
    }
}
