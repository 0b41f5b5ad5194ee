//! Exercises the full prepare -> start -> dispatch -> stop path through
//! real connectors rather than the fake ones `iotgw_core`'s own unit tests
//! use: an HTTP POST lands on a real `iotgw_http` listener, gets forwarded
//! through `http_to_mqtt`, and is observed on a real (if in-process) broker.

mod test_broker;

use std::sync::Arc;
use std::time::Duration;

use iotgw_core::{BridgeConfig, BridgeRuntime, Config, ConnectorConfig, GatewayConfig, TransformRegistry};
use iotgw_mqtt::MqttConnector;
use iotgwd::registry;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

async fn post(addr: &str, path: &str, body: &str) -> u16 {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream.shutdown().await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
        .lines()
        .next()
        .unwrap()
        .split_whitespace()
        .nth(1)
        .unwrap()
        .parse()
        .unwrap()
}

/// E2E-1: an HTTP POST on one bridge's source connector is routed, via
/// `http_to_mqtt`, onto the configured topic on its MQTT destination.
#[tokio::test]
async fn http_post_is_routed_to_mqtt_topic() {
    test_broker::spawn_broker(55_701);

    let config = Config {
        version: Some(1),
        includes: vec![],
        gateway: GatewayConfig::default(),
        connectors: vec![
            ConnectorConfig {
                name: "ingest".into(),
                type_name: "http_server".into(),
                params: serde_json::json!({ "bind": "127.0.0.1:18199" }),
                tags: vec![],
            },
            ConnectorConfig {
                name: "broker".into(),
                type_name: "mqtt".into(),
                params: serde_json::json!({
                    "host": "127.0.0.1",
                    "port": 55_701,
                    "client_id": "iotgwd-e2e-destination",
                }),
                tags: vec![],
            },
        ],
        bridges: vec![BridgeConfig {
            name: "http-to-mqtt".into(),
            source: "ingest".into(),
            destination: "broker".into(),
            transform: Some("http_to_mqtt".into()),
            topic_prefix: Some("ingest".into()),
            rate_limit: None,
            buffer_policy: Default::default(),
        }],
    };

    let registry = registry::build();
    let transforms = Arc::new(TransformRegistry::default());
    let mut bridge = BridgeRuntime::prepare(&config.bridges[0], &config, &registry, transforms).unwrap();
    bridge.start(&registry).await.unwrap();

    // A second client, independent of the bridge, observes the topic the
    // transform actually publishes to.
    let observer = MqttConnector::open(serde_json::json!({
        "host": "127.0.0.1",
        "port": 55_701,
        "client_id": "iotgwd-e2e-observer",
        "subscriptions": [{"topic": "ingest/#"}],
    }))
    .await
    .unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    observer
        .start_receiving(Arc::new(move |message| {
            let tx = tx.clone();
            Box::pin(async move {
                let _ = tx.send(message);
                true
            })
        }))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let status = post("127.0.0.1:18199", "/telemetry", "23.5").await;
    assert_eq!(status, 200);

    let received = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("observer received the bridged message before the test timeout")
        .unwrap();
    assert_eq!(received.mqtt_topic(), Some("ingest/telemetry"));
    assert_eq!(received.payload.data(), b"23.5");

    observer.close().await.unwrap();
    bridge.stop().await.unwrap();
}

/// E2E-4: a bridge pairing a destination-only kind (MQTT) with another
/// destination-only role is still fine, but pairing two connectors where
/// one side has no transport at all is rejected at `prepare` time, before
/// any socket is touched.
#[tokio::test]
async fn unsupported_pair_is_rejected_at_prepare() {
    let config = Config {
        version: Some(1),
        includes: vec![],
        gateway: GatewayConfig::default(),
        connectors: vec![
            ConnectorConfig {
                name: "can0".into(),
                type_name: "socketcan".into(),
                params: serde_json::json!({}),
                tags: vec![],
            },
            ConnectorConfig {
                name: "broker".into(),
                type_name: "mqtt".into(),
                params: serde_json::json!({ "client_id": "unused" }),
                tags: vec![],
            },
        ],
        bridges: vec![BridgeConfig {
            name: "can-to-mqtt".into(),
            source: "can0".into(),
            destination: "broker".into(),
            transform: Some("identity".into()),
            topic_prefix: None,
            rate_limit: None,
            buffer_policy: Default::default(),
        }],
    };

    let registry = registry::build();
    let transforms = Arc::new(TransformRegistry::default());
    let err = BridgeRuntime::prepare(&config.bridges[0], &config, &registry, transforms).unwrap_err();
    assert!(matches!(err, iotgw_core::BridgeError::UnsupportedPair { .. }));
}
