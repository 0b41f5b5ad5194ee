use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::config::{BridgeConfig, BufferPolicy, Config, ConnectorConfig, RateLimit};
use crate::connector::{Connector, DriverRegistry};
use crate::error::BridgeError;
use crate::kind::Kind;
use crate::message::Message;
use crate::transform::{TransformContext, TransformRegistry};

/// Where a [`BridgeRuntime`] sits in its two-phase lifecycle.
///
/// `prepare()` only ever produces `Prepared`; `start()` moves it to
/// `Running` or leaves it `Prepared` on failure; `stop()` always ends in
/// `Stopped`, even if one of the two connectors failed to close cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Prepared,
    Running,
    Stopped,
}

/// A simple token bucket: at most `max_per_second` acquisitions succeed in
/// any rolling one-second window.
struct RateLimiter {
    capacity: f64,
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    fn new(max_per_second: u32) -> Self {
        RateLimiter {
            capacity: max_per_second.max(1) as f64,
            tokens: max_per_second.max(1) as f64,
            last_refill: Instant::now(),
        }
    }

    fn try_acquire(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.capacity).min(self.capacity);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

struct PendingSlot {
    message: Option<Message>,
}

/// A prepared (and, once started, live) wiring of one source connector to
/// one destination connector.
///
/// Construction is split into [`BridgeRuntime::prepare`] (pure, validates
/// the rule against the document, never touches I/O) and
/// [`BridgeRuntime::start`] (opens both connectors and wires the receive
/// callback). Keeping them separate means a whole gateway document can be
/// validated — and rejected, with every misconfigured bridge reported —
/// before a single socket is opened.
pub struct BridgeRuntime {
    pub name: String,
    source_config: ConnectorConfig,
    destination_config: ConnectorConfig,
    source_kind: Kind,
    destination_kind: Kind,
    transform_name: String,
    topic_prefix: Option<String>,
    rate_limit: Option<RateLimit>,
    buffer_policy: BufferPolicy,
    state: BridgeState,
    source: Option<Arc<dyn Connector>>,
    destination: Option<Arc<dyn Connector>>,
    limiter: Option<Arc<Mutex<RateLimiter>>>,
    pending: Arc<Mutex<PendingSlot>>,
    transforms: Arc<TransformRegistry>,
}

impl BridgeRuntime {
    /// Validate one bridge rule against the document and build its
    /// (not-yet-connected) runtime record.
    ///
    /// Fails if the rule names a connector the document doesn't define, or
    /// pairs a source/destination kind that has no transport registered —
    /// both conditions a reader can check without opening anything.
    pub fn prepare(
        rule: &BridgeConfig,
        config: &Config,
        registry: &DriverRegistry,
        transforms: Arc<TransformRegistry>,
    ) -> Result<Self, BridgeError> {
        let source_config = config
            .connector(&rule.source)
            .ok_or_else(|| BridgeError::UnknownConnector {
                bridge: rule.name.clone(),
                connector: rule.source.clone(),
            })?
            .clone();
        let destination_config = config
            .connector(&rule.destination)
            .ok_or_else(|| BridgeError::UnknownConnector {
                bridge: rule.name.clone(),
                connector: rule.destination.clone(),
            })?
            .clone();

        if !registry.has_transport(&source_config.type_name)
            || !registry.has_transport(&destination_config.type_name)
        {
            return Err(BridgeError::UnsupportedPair {
                bridge: rule.name.clone(),
                source: registry
                    .kind_of(&source_config.type_name)
                    .unwrap_or(Kind::Unknown),
                destination: registry
                    .kind_of(&destination_config.type_name)
                    .unwrap_or(Kind::Unknown),
            });
        }

        let source_kind = registry.kind_of(&source_config.type_name).unwrap_or(Kind::Unknown);
        let destination_kind = registry
            .kind_of(&destination_config.type_name)
            .unwrap_or(Kind::Unknown);

        let transform_name = rule
            .transform
            .clone()
            .unwrap_or_else(|| crate::transform::default_transform_for(source_kind, destination_kind).to_string());

        if !transforms.contains(&transform_name) {
            return Err(BridgeError::UnknownTransform {
                bridge: rule.name.clone(),
                transform: transform_name,
            });
        }

        Ok(BridgeRuntime {
            name: rule.name.clone(),
            source_config,
            destination_config,
            source_kind,
            destination_kind,
            transform_name,
            topic_prefix: rule.topic_prefix.clone(),
            rate_limit: rule.rate_limit,
            buffer_policy: rule.buffer_policy,
            state: BridgeState::Prepared,
            source: None,
            destination: None,
            limiter: rule.rate_limit.map(|rl| Arc::new(Mutex::new(RateLimiter::new(rl.max_per_second)))),
            pending: Arc::new(Mutex::new(PendingSlot { message: None })),
            transforms,
        })
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    /// Open both connectors and start feeding the destination from the
    /// source. Destination opens first: if the source then fails to open,
    /// the destination is rolled back so no partially-wired bridge is left
    /// holding a connector open.
    pub async fn start(&mut self, registry: &DriverRegistry) -> Result<(), BridgeError> {
        let destination = registry
            .open(
                &self.destination_config.type_name,
                self.destination_config.params.clone(),
            )
            .await?;

        let source = match registry
            .open(&self.source_config.type_name, self.source_config.params.clone())
            .await
        {
            Ok(source) => source,
            Err(err) => {
                let _ = destination.close().await;
                return Err(err.into());
            }
        };

        let callback = self.build_dispatch_callback(destination.clone());
        if let Err(err) = source.start_receiving(callback).await {
            let _ = source.close().await;
            let _ = destination.close().await;
            return Err(err.into());
        }

        self.source = Some(source);
        self.destination = Some(destination);
        self.state = BridgeState::Running;
        debug!(bridge = %self.name, "bridge started");
        Ok(())
    }

    fn transform_ctx(&self) -> TransformContext {
        TransformContext {
            destination_kind: self.destination_kind,
            topic_prefix: self.topic_prefix.clone(),
        }
    }

    fn build_dispatch_callback(
        &self,
        destination: Arc<dyn Connector>,
    ) -> crate::connector::RxCallback {
        let name = self.name.clone();
        let transform_name = self.transform_name.clone();
        let ctx = self.transform_ctx();
        let limiter = self.limiter.clone();
        let pending = self.pending.clone();
        let transforms = self.transforms.clone();
        let policy = self.buffer_policy;

        Arc::new(move |message: Message| {
            let name = name.clone();
            let transform_name = transform_name.clone();
            let ctx = ctx.clone();
            let limiter = limiter.clone();
            let pending = pending.clone();
            let transforms = transforms.clone();
            let destination = destination.clone();

            Box::pin(async move {
                let allowed = match &limiter {
                    Some(limiter) => limiter.lock().await.try_acquire(),
                    None => true,
                };

                if allowed {
                    return match forward(&transforms, &transform_name, &message, &ctx, destination.as_ref())
                        .await
                    {
                        Ok(()) => true,
                        Err(err) => {
                            error!(bridge = %name, error = %err, "failed to forward message");
                            false
                        }
                    };
                }

                let mut slot = pending.lock().await;
                match (policy, &slot.message) {
                    (BufferPolicy::DropNew, Some(_)) => {
                        warn!(bridge = %name, "rate limited, dropping newly arrived message");
                    }
                    _ => {
                        if slot.message.is_some() {
                            warn!(bridge = %name, "rate limited, dropping previously buffered message");
                        }
                        slot.message = Some(message);
                    }
                }
                true
            }) as futures::future::BoxFuture<'static, bool>
        })
    }

    /// Drain the single-slot pending buffer if the rate limiter now has
    /// room. Intended to be called on a regular cadence by the supervisor,
    /// so a message that arrived too fast to pass through immediately still
    /// gets sent once the bucket refills, instead of being lost forever.
    pub async fn tick(&self) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        let Some(destination) = &self.destination else {
            return;
        };

        let mut slot = self.pending.lock().await;
        let Some(message) = slot.message.take() else {
            return;
        };

        if !limiter.lock().await.try_acquire() {
            slot.message = Some(message);
            return;
        }
        drop(slot);

        let ctx = self.transform_ctx();
        if let Err(err) =
            forward(&self.transforms, &self.transform_name, &message, &ctx, destination.as_ref())
                .await
        {
            error!(bridge = %self.name, error = %err, "failed to forward buffered message");
        }
    }

    /// Close the source first, then the destination — mirroring the order
    /// `start` wires them up in reverse, so the destination keeps accepting
    /// writes for as long as the source might still be delivering one.
    pub async fn stop(&mut self) -> Result<(), BridgeError> {
        let mut first_err = None;

        if let Some(source) = self.source.take() {
            if let Err(err) = source.close().await {
                first_err.get_or_insert(BridgeError::from(err));
            }
        }
        if let Some(destination) = self.destination.take() {
            if let Err(err) = destination.close().await {
                first_err.get_or_insert(BridgeError::from(err));
            }
        }

        self.state = BridgeState::Stopped;
        debug!(bridge = %self.name, "bridge stopped");
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

async fn forward(
    transforms: &TransformRegistry,
    transform_name: &str,
    message: &Message,
    ctx: &TransformContext,
    destination: &dyn Connector,
) -> Result<(), BridgeError> {
    let outgoing = transforms.apply(transform_name, message, ctx)?;
    destination.send(&outgoing).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use crate::payload::Payload;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct FakeConnector {
        kind: Kind,
        sent: mpsc::UnboundedSender<Message>,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        fn kind(&self) -> Kind {
            self.kind
        }

        async fn send(&self, message: &Message) -> Result<(), ConnectorError> {
            let _ = self.sent.send(message.clone());
            Ok(())
        }

        async fn close(&self) -> Result<(), ConnectorError> {
            Ok(())
        }
    }

    fn test_registry(mqtt_tap: mpsc::UnboundedSender<Message>) -> DriverRegistry {
        let mut registry = DriverRegistry::new();
        registry.register_driver(
            "uart",
            Kind::Uart,
            Arc::new(|_params| {
                Box::pin(async {
                    let (tx, _rx) = mpsc::unbounded_channel();
                    Ok(Arc::new(FakeConnector {
                        kind: Kind::Uart,
                        sent: tx,
                    }) as Arc<dyn Connector>)
                })
            }),
        );
        registry.register_driver("mqtt", Kind::Mqtt, {
            let mqtt_tap = mqtt_tap.clone();
            Arc::new(move |_params| {
                let mqtt_tap = mqtt_tap.clone();
                Box::pin(async move {
                    Ok(Arc::new(FakeConnector {
                        kind: Kind::Mqtt,
                        sent: mqtt_tap,
                    }) as Arc<dyn Connector>)
                })
            })
        });
        registry.register_kind_only("socketcan", Kind::SocketCan);
        registry
    }

    fn test_config() -> Config {
        Config {
            gateway: Default::default(),
            connectors: vec![
                ConnectorConfig {
                    name: "u0".into(),
                    type_name: "uart".into(),
                    params: serde_json::json!({}),
                    tags: vec![],
                },
                ConnectorConfig {
                    name: "m0".into(),
                    type_name: "mqtt".into(),
                    params: serde_json::json!({}),
                    tags: vec![],
                },
                ConnectorConfig {
                    name: "can0".into(),
                    type_name: "socketcan".into(),
                    params: serde_json::json!({}),
                    tags: vec![],
                },
            ],
            bridges: vec![],
            ..Default::default()
        }
    }

    #[test]
    fn prepare_is_pure_and_rejects_unknown_connector() {
        let (tap, _rx) = mpsc::unbounded_channel();
        let registry = test_registry(tap);
        let config = test_config();
        let rule = BridgeConfig {
            name: "b1".into(),
            source: "does-not-exist".into(),
            destination: "m0".into(),
            transform: Some("identity".into()),
            topic_prefix: None,
            rate_limit: None,
            buffer_policy: BufferPolicy::DropOldest,
        };
        let err = BridgeRuntime::prepare(&rule, &config, &registry, Arc::new(TransformRegistry::default()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownConnector { .. }));
    }

    #[test]
    fn prepare_rejects_kind_with_no_transport() {
        let (tap, _rx) = mpsc::unbounded_channel();
        let registry = test_registry(tap);
        let config = test_config();
        let rule = BridgeConfig {
            name: "b1".into(),
            source: "can0".into(),
            destination: "m0".into(),
            transform: Some("identity".into()),
            topic_prefix: None,
            rate_limit: None,
            buffer_policy: BufferPolicy::DropOldest,
        };
        let err = BridgeRuntime::prepare(&rule, &config, &registry, Arc::new(TransformRegistry::default()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnsupportedPair { .. }));
    }

    #[tokio::test]
    async fn start_and_dispatch_forwards_through_transform() {
        let (tap, mut rx) = mpsc::unbounded_channel();
        let registry = test_registry(tap);
        let config = test_config();
        let rule = BridgeConfig {
            name: "b1".into(),
            source: "u0".into(),
            destination: "m0".into(),
            transform: Some("uart_to_mqtt".into()),
            topic_prefix: Some("ingest/uart".into()),
            rate_limit: None,
            buffer_policy: BufferPolicy::DropOldest,
        };
        let mut bridge = BridgeRuntime::prepare(&rule, &config, &registry, Arc::new(TransformRegistry::default()))
            .unwrap();
        bridge.start(&registry).await.unwrap();
        assert_eq!(bridge.state(), BridgeState::Running);

        let destination = bridge.destination.clone().unwrap();
        let callback = bridge.build_dispatch_callback(destination.clone());
        callback(Message::new(Kind::Uart, Payload::new(b"hello".to_vec()))).await;

        let forwarded = rx.recv().await.expect("message forwarded to destination");
        assert_eq!(forwarded.payload.data(), b"hello");
        assert_eq!(forwarded.mqtt_topic(), Some("ingest/uart"));

        bridge.stop().await.unwrap();
        assert_eq!(bridge.state(), BridgeState::Stopped);
    }

    #[tokio::test]
    async fn rate_limited_message_is_buffered_and_drained_on_tick() {
        let (tap, mut rx) = mpsc::unbounded_channel();
        let registry = test_registry(tap);
        let config = test_config();
        let rule = BridgeConfig {
            name: "b1".into(),
            source: "u0".into(),
            destination: "m0".into(),
            transform: Some("identity".into()),
            topic_prefix: None,
            rate_limit: Some(RateLimit { max_per_second: 1 }),
            buffer_policy: BufferPolicy::DropOldest,
        };
        let mut bridge = BridgeRuntime::prepare(&rule, &config, &registry, Arc::new(TransformRegistry::default()))
            .unwrap();
        bridge.start(&registry).await.unwrap();

        let destination = bridge.destination.clone().unwrap();
        let callback = bridge.build_dispatch_callback(destination.clone());
        callback(Message::new(Kind::Uart, Payload::new(b"1".to_vec()))).await;
        callback(Message::new(Kind::Uart, Payload::new(b"2".to_vec()))).await;

        let first = rx.recv().await.expect("first message passes immediately");
        assert_eq!(first.payload.data(), b"1");

        {
            let slot = bridge.pending.lock().await;
            assert!(slot.message.is_some(), "second message held in pending slot");
        }

        tokio::time::sleep(Duration::from_millis(1100)).await;
        bridge.tick().await;

        let second = rx.recv().await.expect("buffered message drained on tick");
        assert_eq!(second.payload.data(), b"2");
    }
}
