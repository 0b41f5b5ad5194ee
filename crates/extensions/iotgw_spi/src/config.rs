use serde::{Deserialize, Serialize};

fn default_mode() -> u8 {
    0
}

fn default_bits_per_word() -> u8 {
    8
}

fn default_speed_hz() -> u32 {
    1_000_000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpiOp {
    Write,
    Read,
    Transfer,
}

/// One configured transaction. `len` bounds the TX phase (`[1,4096]`); `tx`
/// is a hex string parsed by [`crate::hex::parse_hex_bytes`] and padded or
/// truncated to `len`, zero-filled if absent. `rx_len` (also `[1,4096]`)
/// defaults to `len` when the op reads anything back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub op: SpiOp,
    pub len: usize,
    #[serde(default)]
    pub tx: Option<String>,
    #[serde(default)]
    pub rx_len: Option<usize>,
}

/// The typed shape of an SPI connector's opaque `params` document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub device: String,
    #[serde(default = "default_mode")]
    pub mode: u8,
    #[serde(default = "default_bits_per_word")]
    pub bits_per_word: u8,
    #[serde(default = "default_speed_hz")]
    pub speed_hz: u32,
    #[serde(default)]
    pub lsb_first: bool,
    #[serde(default)]
    pub cs_change: bool,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    /// Polling period in milliseconds; if unset the configured transactions
    /// are only run on an explicit `send`, not on a background schedule.
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}
