use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iotgw_core::{Connector, ConnectorError, Kind, Message, Params, Payload, RxCallback};
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS, TlsConfiguration, Transport};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;

fn qos_from_u8(qos: u8) -> QoS {
    match qos {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

fn qos_to_u8(qos: QoS) -> u8 {
    match qos {
        QoS::AtMostOnce => 0,
        QoS::AtLeastOnce => 1,
        QoS::ExactlyOnce => 2,
    }
}

fn mqtt_options(cfg: &Config) -> Result<MqttOptions, ConnectorError> {
    let endpoint = cfg
        .endpoint()
        .map_err(ConnectorError::DeviceConfig)?;

    let mut options = MqttOptions::new(cfg.client_id.clone(), endpoint.host, endpoint.port);
    options.set_keep_alive(Duration::from_secs(cfg.keepalive_secs));

    if let (Some(username), Some(password)) = (&cfg.username, &cfg.password) {
        options.set_credentials(username, password);
    }

    if endpoint.tls {
        let tls = cfg.tls.clone().unwrap_or_default();
        if tls.insecure_skip_verify {
            warn!(
                client_id = %cfg.client_id,
                "insecure_skip_verify is set but this build only wires rumqttc's \
                 Simple TLS transport (server-CA verification always on); bypassing \
                 certificate verification is not implemented, connect as usual"
            );
        }
        let ca = match &tls.ca_file {
            Some(path) => std::fs::read(path).map_err(|err| {
                ConnectorError::DeviceConfig(format!("failed to read ca_file {path:?}: {err}"))
            })?,
            None => Vec::new(),
        };
        let client_auth = match (&tls.cert_file, &tls.key_file) {
            (Some(cert), Some(key)) => {
                let cert = std::fs::read(cert).map_err(|err| {
                    ConnectorError::DeviceConfig(format!("failed to read cert_file: {err}"))
                })?;
                let key = std::fs::read(key).map_err(|err| {
                    ConnectorError::DeviceConfig(format!("failed to read key_file: {err}"))
                })?;
                Some((cert, key))
            }
            _ => None,
        };
        options.set_transport(Transport::Tls(TlsConfiguration::Simple {
            ca,
            alpn: None,
            client_auth,
        }));
    }

    Ok(options)
}

/// An MQTT client connection: connects and (if configured) subscribes
/// during `open`, then runs a background task that keeps polling the
/// client's event loop for the life of the connector — required even for a
/// publish-only destination, since rumqttc needs its event loop driven to
/// process pings and publish acknowledgements.
pub struct MqttConnector {
    client: AsyncClient,
    callback: Arc<Mutex<Option<RxCallback>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl MqttConnector {
    pub async fn open(params: serde_json::Value) -> Result<Arc<dyn Connector>, ConnectorError> {
        let cfg: Config = serde_json::from_value(params)
            .map_err(|err| ConnectorError::DeviceConfig(err.to_string()))?;

        let options = mqtt_options(&cfg)?;
        let (client, mut event_loop) = AsyncClient::new(options, cfg.queue_capacity);

        info!(client_id = %cfg.client_id, "connecting to MQTT broker");
        loop {
            match event_loop
                .poll()
                .await
                .map_err(|err| ConnectorError::Connect(err.to_string()))?
            {
                Event::Incoming(Incoming::ConnAck(_)) => {
                    if cfg.subscriptions.is_empty() {
                        break;
                    }
                    for sub in &cfg.subscriptions {
                        let qos = qos_from_u8(sub.qos.unwrap_or(cfg.default_qos));
                        client
                            .subscribe(sub.topic.clone(), qos)
                            .await
                            .map_err(|err| ConnectorError::Connect(err.to_string()))?;
                    }
                }
                Event::Incoming(Incoming::SubAck(_)) => break,
                _ => {}
            }
        }
        info!(client_id = %cfg.client_id, "MQTT connection established");

        let callback: Arc<Mutex<Option<RxCallback>>> = Arc::new(Mutex::new(None));
        let task_callback = callback.clone();
        let handle = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        let Some(callback) = task_callback.lock().await.clone() else {
                            debug!(topic = %publish.topic, "dropping publish, no receiver wired");
                            continue;
                        };
                        let message = Message::new(
                            Kind::Mqtt,
                            Payload::new(publish.payload.to_vec()),
                        )
                        .with_params(Params::Mqtt {
                            topic: publish.topic,
                            qos: qos_to_u8(publish.qos),
                            retain: publish.retain,
                        });
                        callback(message).await;
                    }
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "MQTT event loop error, retrying");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                }
            }
        });

        Ok(Arc::new(MqttConnector {
            client,
            callback,
            task: Mutex::new(Some(handle)),
        }))
    }
}

#[async_trait]
impl Connector for MqttConnector {
    fn kind(&self) -> Kind {
        Kind::Mqtt
    }

    async fn start_receiving(&self, callback: RxCallback) -> Result<(), ConnectorError> {
        *self.callback.lock().await = Some(callback);
        Ok(())
    }

    async fn send(&self, message: &Message) -> Result<(), ConnectorError> {
        if message.kind != Kind::Mqtt {
            return Err(ConnectorError::KindMismatch {
                expected: Kind::Mqtt,
                actual: message.kind,
            });
        }
        let Params::Mqtt { topic, qos, retain } = &message.params else {
            return Err(ConnectorError::Send("MQTT message missing topic params".into()));
        };
        self.client
            .publish(topic, qos_from_u8(*qos), *retain, message.payload.data().to_vec())
            .await
            .map_err(|err| ConnectorError::Send(err.to_string()))
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        let _ = self.client.disconnect().await;
        Ok(())
    }
}
