use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::ConnectorError;
use crate::kind::Kind;
use crate::message::Message;

/// A callback a connector invokes for every message it receives.
///
/// Driver crates hold onto one of these (via [`Connector::start_receiving`])
/// and call it from whatever receive loop is native to their transport: a
/// `rumqttc` event loop, a background poll thread parked with
/// `spawn_blocking`, an axum handler, and so on. The bridge orchestrator is
/// the only thing that ever constructs one.
///
/// The returned `bool` reports whether the message was accepted and
/// successfully dispatched (transform applied, destination write
/// succeeded, or queued because of a rate limit) as opposed to rejected
/// outright. The HTTP server driver is the one caller that uses it — its
/// response status tracks the full dispatch outcome, not just receipt.
pub type RxCallback = Arc<dyn Fn(Message) -> BoxFuture<'static, bool> + Send + Sync>;

/// A single protocol endpoint, opened and driven by one of the extension
/// crates.
///
/// All methods are async so a driver can do real I/O (device ioctls via
/// `spawn_blocking`, network round trips, ...) without blocking the runtime,
/// and all take `&self` so a connector can be shared behind an `Arc` between
/// the bridge that reads from it and the bridge that writes to it.
#[async_trait]
pub trait Connector: Send + Sync {
    /// The protocol this connector speaks.
    fn kind(&self) -> Kind;

    /// Wire up the callback the connector should invoke for inbound
    /// messages, and start whatever background activity is needed to feed
    /// it (a poll loop, a subscription, a listener).
    ///
    /// A connector that is never used as a bridge source may leave this a
    /// no-op; the default implementation does nothing, which is correct for
    /// write-only destinations.
    async fn start_receiving(&self, _callback: RxCallback) -> Result<(), ConnectorError> {
        Ok(())
    }

    /// Send a single message out over this connector.
    async fn send(&self, message: &Message) -> Result<(), ConnectorError>;

    /// Release any held resources (sockets, file descriptors, background
    /// tasks). Called exactly once, during bridge teardown.
    async fn close(&self) -> Result<(), ConnectorError>;
}

/// Opens a connector from its config-time `type` string and its opaque
/// `params` document.
///
/// `params` stays `serde_json::Value` here rather than a per-driver struct:
/// `iotgw_core` has no business knowing the shape of an MQTT broker config
/// or an SPI device path, and giving it one would mean depending on every
/// driver crate it ought to be independent of. Each driver parses its own
/// `Config` out of the value as the first thing its `OpenFn` does.
pub type OpenFn = Arc<
    dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<Arc<dyn Connector>, ConnectorError>>
        + Send
        + Sync,
>;

/// One registered connector type: its protocol tag, and — for kinds that
/// actually have a transport implementation linked into this build — the
/// factory that opens it.
#[derive(Clone)]
struct DriverEntry {
    kind: Kind,
    open: Option<OpenFn>,
}

/// Maps connector `type` strings to protocol tags and, where available,
/// open factories.
///
/// Populated once at startup by the `iotgwd` binary, which is the only
/// place in the workspace that depends on every extension crate at once.
/// `iotgw_core` and the driver crates never need to know about each other.
#[derive(Clone, Default)]
pub struct DriverRegistry {
    entries: HashMap<String, DriverEntry>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        DriverRegistry {
            entries: HashMap::new(),
        }
    }

    /// Register a connector type with a working driver behind it.
    pub fn register_driver(&mut self, type_name: impl Into<String>, kind: Kind, open: OpenFn) {
        self.entries.insert(
            type_name.into(),
            DriverEntry {
                kind,
                open: Some(open),
            },
        );
    }

    /// Register a connector type that is recognised (so config validation
    /// and `Kind` lookups succeed) but has no transport in this build.
    ///
    /// Used for config-time-only kinds with no transport in this build:
    /// i2c, ble, coap, lorawan, onewire, opcua, socketcan, zigbee.
    pub fn register_kind_only(&mut self, type_name: impl Into<String>, kind: Kind) {
        self.entries
            .insert(type_name.into(), DriverEntry { kind, open: None });
    }

    pub fn kind_of(&self, type_name: &str) -> Option<Kind> {
        self.entries.get(type_name).map(|e| e.kind)
    }

    /// Whether `type_name` has a working transport in this build.
    pub fn has_transport(&self, type_name: &str) -> bool {
        self.entries
            .get(type_name)
            .is_some_and(|e| e.open.is_some())
    }

    /// Open a connector of the given type with the given opaque params.
    pub async fn open(
        &self,
        type_name: &str,
        params: serde_json::Value,
    ) -> Result<Arc<dyn Connector>, ConnectorError> {
        let entry = self
            .entries
            .get(type_name)
            .ok_or_else(|| ConnectorError::NoDriver(type_name.to_string()))?;
        let open = entry
            .open
            .as_ref()
            .ok_or_else(|| ConnectorError::NoDriver(type_name.to_string()))?;
        open(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullConnector;

    #[async_trait]
    impl Connector for NullConnector {
        fn kind(&self) -> Kind {
            Kind::Mqtt
        }

        async fn send(&self, _message: &Message) -> Result<(), ConnectorError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), ConnectorError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn kind_only_registration_has_no_transport() {
        let mut registry = DriverRegistry::new();
        registry.register_kind_only("socketcan", Kind::SocketCan);

        assert_eq!(registry.kind_of("socketcan"), Some(Kind::SocketCan));
        assert!(!registry.has_transport("socketcan"));

        let err = registry
            .open("socketcan", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::NoDriver(_)));
    }

    #[tokio::test]
    async fn registered_driver_opens() {
        let mut registry = DriverRegistry::new();
        registry.register_driver(
            "mqtt",
            Kind::Mqtt,
            Arc::new(|_params| Box::pin(async { Ok(Arc::new(NullConnector) as Arc<dyn Connector>) })),
        );

        assert!(registry.has_transport("mqtt"));
        let connector = registry.open("mqtt", serde_json::json!({})).await.unwrap();
        assert_eq!(connector.kind(), Kind::Mqtt);
    }

    #[tokio::test]
    async fn unknown_type_has_no_kind() {
        let registry = DriverRegistry::new();
        assert_eq!(registry.kind_of("made-up"), None);
    }
}
