//! Wires every extension crate's driver into one [`DriverRegistry`].
//!
//! This is the one module in the workspace allowed to depend on every
//! protocol crate at once; `iotgw_core` and the drivers themselves stay
//! mutually unaware of each other.

use iotgw_core::{DriverRegistry, Kind};

pub fn build() -> DriverRegistry {
    let mut registry = DriverRegistry::new();

    registry.register_driver("mqtt", Kind::Mqtt, iotgw_mqtt::open_fn());
    registry.register_driver("http_server", Kind::HttpServer, iotgw_http::open_fn());
    registry.register_driver("spi", Kind::Spi, iotgw_spi::open_fn());
    registry.register_driver("uart", Kind::Uart, iotgw_uart::open_fn());
    registry.register_driver("modbus_rtu", Kind::ModbusRtu, iotgw_modbus::rtu_open_fn());
    registry.register_driver("modbus_tcp", Kind::ModbusTcp, iotgw_modbus::tcp_open_fn());

    // Recognised at config time — so validation and `Kind` lookups succeed —
    // but with no transport linked into this build.
    registry.register_kind_only("i2c", Kind::I2c);
    registry.register_kind_only("ble", Kind::Ble);
    registry.register_kind_only("coap", Kind::Coap);
    registry.register_kind_only("lorawan", Kind::LoRaWan);
    registry.register_kind_only("onewire", Kind::OneWire);
    registry.register_kind_only("opcua", Kind::OpcUa);
    registry.register_kind_only("socketcan", Kind::SocketCan);
    registry.register_kind_only("zigbee", Kind::Zigbee);

    registry
}
