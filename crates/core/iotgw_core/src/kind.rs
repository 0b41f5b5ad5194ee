use std::fmt;

/// The protocol tag carried by every connector and every message.
///
/// The set is closed: adding a bus means adding a variant here, which in turn
/// makes every `match` over `Kind` in this workspace fail to compile until
/// it's handled, so nothing can silently "forget" a new protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Mqtt,
    HttpServer,
    ModbusRtu,
    ModbusTcp,
    Uart,
    Spi,
    I2c,
    Ble,
    Coap,
    LoRaWan,
    OneWire,
    OpcUa,
    SocketCan,
    Zigbee,
    /// A connector `type` string the registry has no parser for.
    Unknown,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Mqtt => "mqtt",
            Kind::HttpServer => "http_server",
            Kind::ModbusRtu => "modbus_rtu",
            Kind::ModbusTcp => "modbus_tcp",
            Kind::Uart => "uart",
            Kind::Spi => "spi",
            Kind::I2c => "i2c",
            Kind::Ble => "ble",
            Kind::Coap => "coap",
            Kind::LoRaWan => "lorawan",
            Kind::OneWire => "onewire",
            Kind::OpcUa => "opcua",
            Kind::SocketCan => "socketcan",
            Kind::Zigbee => "zigbee",
            Kind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Maps a connector's configured `type` string to its protocol tag.
///
/// This is the config-time half of the registry described in the connector
/// registry design: it never touches I/O and never needs the driver crates,
/// so it can run while loading a config even if a given driver isn't wired
/// into this build. Resolving which `type` strings actually have a working
/// driver behind them is a separate, later step (`DriverRegistry`).
pub fn kind_for_type(type_name: &str) -> Kind {
    match type_name {
        "mqtt" => Kind::Mqtt,
        "http_server" => Kind::HttpServer,
        "modbus_rtu" => Kind::ModbusRtu,
        "modbus_tcp" => Kind::ModbusTcp,
        "uart" => Kind::Uart,
        "spi" => Kind::Spi,
        "i2c" => Kind::I2c,
        "ble" => Kind::Ble,
        "coap" => Kind::Coap,
        "lorawan" => Kind::LoRaWan,
        "onewire" => Kind::OneWire,
        "opcua" => Kind::OpcUa,
        "socketcan" => Kind::SocketCan,
        "zigbee" => Kind::Zigbee,
        _ => Kind::Unknown,
    }
}
