//! A minimal in-process MQTT broker for exercising [`iotgw_mqtt::MqttConnector`]
//! against something real instead of a mock client.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use rumqttd::{
    Broker, Config, ConnectionSettings, ConsoleSettings, RouterConfig, ServerSettings,
};

/// Spawns a standalone rumqttd broker on `port` on a dedicated OS thread and
/// returns once it has started listening.
pub fn spawn_broker(port: u16) {
    let config = broker_config(port);
    let mut broker = Broker::new(config);

    std::thread::spawn(move || {
        if let Err(err) = broker.start() {
            eprintln!("test broker on port {port} exited: {err:?}");
        }
    });

    // rumqttd's accept loop takes a moment to bind; give it a head start so
    // the first connection attempt from a test doesn't race the listener.
    std::thread::sleep(std::time::Duration::from_millis(200));
}

fn broker_config(port: u16) -> Config {
    let router = RouterConfig {
        instant_ack: false,
        max_segment_size: 104_857_600,
        max_segment_count: 100,
        max_read_len: 10_240,
        max_connections: 100,
        initialized_filters: None,
    };

    let connections = ConnectionSettings {
        connection_timeout_ms: 60_000,
        throttle_delay_ms: 0,
        max_payload_size: 268_435_455,
        max_inflight_count: 200,
        max_inflight_size: 1024,
        dynamic_filters: true,
    };

    let server = ServerSettings {
        listen: SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), port)),
        next_connection_delay_ms: 1,
        connections,
        name: "iotgw_test_broker".to_string(),
        tls: None,
    };

    let mut v4 = HashMap::new();
    v4.insert("iotgw-test".to_string(), server);

    Config {
        id: 0,
        router,
        v4,
        v5: HashMap::new(),
        ws: HashMap::new(),
        cluster: None,
        console: ConsoleSettings::default(),
        bridge: None,
        prometheus: None,
    }
}
