use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::error::TransformError;
use crate::kind::Kind;
use crate::message::{Message, Params};
use crate::payload::Payload;

/// The bridge-level context a transform needs besides the inbound message:
/// which protocol it is rendering for, and the `topic_prefix` configured on
/// the bridge rule (if any).
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub destination_kind: Kind,
    pub topic_prefix: Option<String>,
}

/// Rewrites a source-kind message into a destination-kind one.
///
/// A transform decides both the payload shape and the destination
/// [`Params`] (topic, path, ...): the two are not independently meaningful,
/// since e.g. an MQTT topic is derived from the same `topic_prefix` that
/// shapes what the payload looks like for `http_to_mqtt`.
pub type TransformFn =
    Arc<dyn Fn(&Message, &TransformContext) -> Result<Message, TransformError> + Send + Sync>;

/// Passes the payload through unchanged, tagging it with the destination
/// kind but no addressing params. Used when `from.kind == to.kind` and no
/// other transform applies.
pub fn identity(message: &Message, ctx: &TransformContext) -> Result<Message, TransformError> {
    Ok(Message::new(ctx.destination_kind, message.payload.clone()))
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

const DEFAULT_SPI_TOPIC: &str = "ingest/spi/read";

/// Copies a raw SPI transaction's RX bytes through unchanged, addressed at
/// `topic_prefix` (fallback `"ingest/spi/read"`), QoS 1, no retain. The
/// original driver logged transaction payloads as hex to stderr for
/// tracing, but what it actually published was the binary buffer as-is
/// (`content_type = "application/octet-stream"`) — the hex rendering never
/// left the trace log.
pub fn spi_to_mqtt(message: &Message, ctx: &TransformContext) -> Result<Message, TransformError> {
    let payload = message.payload.clone().with_content_type("application/octet-stream");
    let topic = ctx
        .topic_prefix
        .clone()
        .unwrap_or_else(|| DEFAULT_SPI_TOPIC.to_string());
    Ok(Message::new(Kind::Mqtt, payload).with_params(Params::Mqtt {
        topic,
        qos: 1,
        retain: false,
    }))
}

/// Passes an HTTP request body through as MQTT payload, topic
/// `<topic_prefix>/<path>` with the request path's leading slash stripped.
pub fn http_to_mqtt(message: &Message, ctx: &TransformContext) -> Result<Message, TransformError> {
    let path = match &message.params {
        Params::HttpServer { path } => path.trim_start_matches('/'),
        _ => {
            return Err(TransformError::Failed(
                "http_to_mqtt requires an HTTP server params record".into(),
            ))
        }
    };
    let prefix = ctx.topic_prefix.as_deref().unwrap_or("ingest");
    let topic = format!("{prefix}/{path}");

    let mut payload = message.payload.clone();
    payload.is_text = true;
    Ok(Message::new(Kind::Mqtt, payload).with_params(Params::Mqtt {
        topic,
        qos: 0,
        retain: false,
    }))
}

/// Passes a UART line through as MQTT payload text under `topic_prefix`
/// (fallback `"ingest/uart"`).
pub fn uart_to_mqtt(message: &Message, ctx: &TransformContext) -> Result<Message, TransformError> {
    let topic = ctx
        .topic_prefix
        .clone()
        .unwrap_or_else(|| "ingest/uart".to_string());
    let payload = Payload::text(message.payload.data().to_vec()).with_content_type("text/plain");
    Ok(Message::new(Kind::Mqtt, payload).with_params(Params::Mqtt {
        topic,
        qos: 0,
        retain: false,
    }))
}

/// Renders a Modbus register read as a small JSON document carrying the
/// address, register count, and hex-encoded raw bytes, under `topic_prefix`
/// (fallback `"ingest/modbus"`).
pub fn modbus_to_mqtt(message: &Message, ctx: &TransformContext) -> Result<Message, TransformError> {
    let (address, count) = match &message.params {
        Params::ModbusRtu { address, count } | Params::ModbusTcp { address, count } => {
            (*address, *count)
        }
        _ => {
            return Err(TransformError::Failed(
                "modbus_to_mqtt requires modbus addressing params".into(),
            ))
        }
    };
    let body = serde_json::json!({
        "address": address,
        "count": count,
        "data_hex": to_hex(message.payload.data()),
    });
    let topic = ctx
        .topic_prefix
        .clone()
        .unwrap_or_else(|| "ingest/modbus".to_string());
    let payload = Payload::text(body.to_string()).with_content_type("application/json");
    Ok(Message::new(Kind::Mqtt, payload).with_params(Params::Mqtt {
        topic,
        qos: 0,
        retain: false,
    }))
}

/// The transform a bridge rule gets when its `transform` field is left
/// unset, chosen from the `(source, destination)` kind pair: use the
/// registered default for the pair unless the document names one. Falls
/// back to `identity` when `source == destination` and no more specific
/// default exists for the pair.
pub fn default_transform_for(source: Kind, destination: Kind) -> &'static str {
    match (source, destination) {
        (Kind::Spi, Kind::Mqtt) => "spi_to_mqtt",
        (Kind::HttpServer, Kind::Mqtt) => "http_to_mqtt",
        (Kind::Uart, Kind::Mqtt) => "uart_to_mqtt",
        (Kind::ModbusRtu, Kind::Mqtt) | (Kind::ModbusTcp, Kind::Mqtt) => "modbus_to_mqtt",
        _ => "identity",
    }
}

/// The set of transform names a bridge rule's `transform` field may name.
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl Default for TransformRegistry {
    fn default() -> Self {
        let mut registry = TransformRegistry {
            transforms: HashMap::new(),
        };
        registry.register("identity", Arc::new(identity));
        registry.register("spi_to_mqtt", Arc::new(spi_to_mqtt));
        registry.register("http_to_mqtt", Arc::new(http_to_mqtt));
        registry.register("uart_to_mqtt", Arc::new(uart_to_mqtt));
        registry.register("modbus_to_mqtt", Arc::new(modbus_to_mqtt));
        registry
    }
}

impl TransformRegistry {
    pub fn register(&mut self, name: impl Into<String>, transform: TransformFn) {
        self.transforms.insert(name.into(), transform);
    }

    /// Whether `name` names a registered transform.
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    pub fn apply(
        &self,
        name: &str,
        message: &Message,
        ctx: &TransformContext,
    ) -> Result<Message, TransformError> {
        let transform = self
            .transforms
            .get(name)
            .ok_or_else(|| TransformError::UnknownTransform(name.to_string()))?;
        transform(message, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind;

    fn mqtt_ctx(topic_prefix: Option<&str>) -> TransformContext {
        TransformContext {
            destination_kind: Kind::Mqtt,
            topic_prefix: topic_prefix.map(str::to_string),
        }
    }

    #[test]
    fn spi_to_mqtt_copies_raw_bytes_and_falls_back_to_default_topic() {
        let message = Message::new(Kind::Spi, Payload::new(vec![0xde, 0xad, 0xbe, 0xef]));
        let out = spi_to_mqtt(&message, &mqtt_ctx(None)).unwrap();
        assert_eq!(out.payload.data(), &[0xde, 0xad, 0xbe, 0xef]);
        assert!(!out.payload.is_text);
        assert_eq!(out.payload.content_type.as_deref(), Some("application/octet-stream"));
        assert_eq!(out.mqtt_topic(), Some(DEFAULT_SPI_TOPIC));
    }

    #[test]
    fn http_to_mqtt_joins_prefix_and_strips_leading_slash() {
        let message = Message::new(Kind::HttpServer, Payload::new(b"23.5".to_vec()))
            .with_params(Params::HttpServer {
                path: "/temperature".into(),
            });
        let out = http_to_mqtt(&message, &mqtt_ctx(Some("ingest"))).unwrap();
        assert_eq!(out.mqtt_topic(), Some("ingest/temperature"));
        assert_eq!(out.payload.data(), b"23.5");
    }

    #[test]
    fn modbus_to_mqtt_requires_modbus_params() {
        let message = Message::new(Kind::ModbusRtu, Payload::new(vec![0x00, 0x10]));
        assert!(modbus_to_mqtt(&message, &mqtt_ctx(None)).is_err());

        let message = message.with_params(Params::ModbusRtu {
            address: 40001,
            count: 1,
        });
        let out = modbus_to_mqtt(&message, &mqtt_ctx(None)).unwrap();
        let body: serde_json::Value = serde_json::from_slice(out.payload.data()).unwrap();
        assert_eq!(body["address"], 40001);
        assert_eq!(body["data_hex"], "0010");
    }

    #[test]
    fn unknown_transform_name_errors() {
        let registry = TransformRegistry::default();
        let message = Message::new(Kind::Uart, Payload::new(vec![1]));
        let err = registry
            .apply("does-not-exist", &message, &mqtt_ctx(None))
            .unwrap_err();
        assert!(matches!(err, TransformError::UnknownTransform(_)));
    }

    #[test]
    fn identity_round_trips_payload() {
        let registry = TransformRegistry::default();
        let message = Message::new(Kind::Uart, Payload::new(vec![1, 2, 3]));
        let out = registry.apply("identity", &message, &mqtt_ctx(None)).unwrap();
        assert_eq!(out.payload.data(), &[1, 2, 3]);
    }

    #[test]
    fn default_transform_picks_the_registered_pair() {
        assert_eq!(default_transform_for(Kind::Spi, Kind::Mqtt), "spi_to_mqtt");
        assert_eq!(default_transform_for(Kind::HttpServer, Kind::Mqtt), "http_to_mqtt");
        assert_eq!(default_transform_for(Kind::Uart, Kind::Mqtt), "uart_to_mqtt");
        assert_eq!(default_transform_for(Kind::ModbusRtu, Kind::Mqtt), "modbus_to_mqtt");
        assert_eq!(default_transform_for(Kind::ModbusTcp, Kind::Mqtt), "modbus_to_mqtt");
    }

    #[test]
    fn default_transform_falls_back_to_identity_for_an_unregistered_pair() {
        assert_eq!(default_transform_for(Kind::Mqtt, Kind::Mqtt), "identity");
        assert_eq!(default_transform_for(Kind::I2c, Kind::Ble), "identity");
    }
}
