use crate::kind::Kind;
use crate::payload::Payload;

/// Per-kind addressing metadata attached to a [`Message`].
///
/// This is the Rust rendering of the "per-kind parameters record" from the
/// data model: rather than a union plus a discriminant the caller has to
/// check by hand, it's one enum whose variant the compiler keeps in lock
/// step with [`Message::kind`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Params {
    Mqtt {
        topic: String,
        qos: u8,
        retain: bool,
    },
    HttpServer {
        path: String,
    },
    ModbusRtu {
        address: u16,
        count: u16,
    },
    ModbusTcp {
        address: u16,
        count: u16,
    },
    /// Which configured transaction produced this reading, by position in
    /// the connector's transaction list — the normalized form of the RX
    /// callback's `transaction_ref` argument.
    Spi {
        transaction_index: usize,
    },
    #[default]
    None,
}

/// A normalized message: a payload plus the protocol tag and addressing
/// metadata that describe where it came from or where it is headed.
#[derive(Debug, Clone)]
pub struct Message {
    pub kind: Kind,
    pub payload: Payload,
    pub params: Params,
}

impl Message {
    pub fn new(kind: Kind, payload: Payload) -> Self {
        Message {
            kind,
            payload,
            params: Params::None,
        }
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    /// The MQTT topic this message is published to or was received on, if any.
    pub fn mqtt_topic(&self) -> Option<&str> {
        match &self.params {
            Params::Mqtt { topic, .. } => Some(topic),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mqtt_topic_is_only_set_for_mqtt_params() {
        let msg = Message::new(Kind::Spi, Payload::new(vec![1])).with_params(Params::None);
        assert_eq!(msg.mqtt_topic(), None);

        let msg = Message::new(Kind::Mqtt, Payload::new(vec![1])).with_params(Params::Mqtt {
            topic: "ingest/x".into(),
            qos: 1,
            retain: false,
        });
        assert_eq!(msg.mqtt_topic(), Some("ingest/x"));
    }
}
