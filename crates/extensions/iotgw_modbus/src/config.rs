use serde::{Deserialize, Serialize};

fn default_poll_period_ms() -> u64 {
    1_000
}

fn default_slave() -> u8 {
    1
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterType {
    Holding,
    Input,
}

/// One block of contiguous registers to read every poll round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBlock {
    pub register_type: RegisterType,
    pub address: u16,
    pub count: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// The typed shape of a `modbus_rtu` connector's opaque `params` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RtuConfig {
    pub device: String,
    pub baud_rate: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    #[serde(default)]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    #[serde(default = "default_slave")]
    pub slave: u8,
    #[serde(default)]
    pub blocks: Vec<RegisterBlock>,
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
}

/// The typed shape of a `modbus_tcp` connector's opaque `params` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    pub host: String,
    pub port: u16,
    #[serde(default = "default_slave")]
    pub slave: u8,
    #[serde(default)]
    pub blocks: Vec<RegisterBlock>,
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rtu_poll_period_defaults_to_one_second() {
        let cfg: RtuConfig = serde_json::from_value(serde_json::json!({
            "device": "/dev/ttyUSB0",
            "baud_rate": 9600,
        }))
        .unwrap();
        assert_eq!(cfg.poll_period_ms, 1_000);
        assert_eq!(cfg.slave, 1);
    }

    #[test]
    fn tcp_config_parses_blocks() {
        let cfg: TcpConfig = serde_json::from_value(serde_json::json!({
            "host": "10.0.0.5",
            "port": 502,
            "blocks": [{"register_type": "holding", "address": 40001, "count": 2}],
        }))
        .unwrap();
        assert_eq!(cfg.blocks.len(), 1);
        assert_eq!(cfg.blocks[0].count, 2);
    }
}
