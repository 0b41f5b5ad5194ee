use std::os::unix::io::RawFd;

use iotgw_core::ConnectorError;

use crate::config::{SpiOp, Transaction};
use crate::hex::parse_hex_bytes;
use crate::ioctl::{message_1, message_2, SpiIocTransfer};

const MIN_LEN: usize = 1;
const MAX_LEN: usize = 4096;

/// Builds the TX buffer for one transaction: zero-filled for a pure read,
/// otherwise the hex-parsed `tx` field padded or truncated to `len` (the
/// rest of the buffer stays zero if the string supplies fewer bytes).
fn tx_buffer(t: &Transaction) -> Result<Vec<u8>, ConnectorError> {
    let mut buf = vec![0u8; t.len];
    if t.op == SpiOp::Read {
        return Ok(buf);
    }
    if let Some(tx) = &t.tx {
        let parsed = parse_hex_bytes(tx)
            .ok_or_else(|| ConnectorError::DeviceConfig(format!("malformed SPI tx hex: {tx:?}")))?;
        let n = parsed.len().min(t.len);
        buf[..n].copy_from_slice(&parsed[..n]);
    }
    Ok(buf)
}

fn expected_rx_len(t: &Transaction) -> usize {
    match t.op {
        SpiOp::Write => 0,
        SpiOp::Read | SpiOp::Transfer => t.rx_len.unwrap_or(t.len),
    }
}

fn base_transfer(speed_hz: u32, bits_per_word: u8) -> SpiIocTransfer {
    SpiIocTransfer {
        speed_hz,
        bits_per_word,
        ..Default::default()
    }
}

/// Executes one configured transaction against an already-opened spidev fd,
/// returning the bytes read back (empty for a pure write).
pub fn execute(
    fd: RawFd,
    t: &Transaction,
    speed_hz: u32,
    bits_per_word: u8,
    cs_change: bool,
) -> Result<Vec<u8>, ConnectorError> {
    if !(MIN_LEN..=MAX_LEN).contains(&t.len) {
        return Err(ConnectorError::DeviceConfig(format!(
            "SPI transaction len {} out of bounds [{MIN_LEN},{MAX_LEN}]",
            t.len
        )));
    }
    if let Some(rx_len) = t.rx_len {
        if !(MIN_LEN..=MAX_LEN).contains(&rx_len) {
            return Err(ConnectorError::DeviceConfig(format!(
                "SPI transaction rx_len {rx_len} out of bounds [{MIN_LEN},{MAX_LEN}]"
            )));
        }
    }

    let tx = tx_buffer(t)?;
    let rx_len = expected_rx_len(t);

    if rx_len == 0 {
        let transfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            len: tx.len() as u32,
            cs_change: cs_change as u8,
            ..base_transfer(speed_hz, bits_per_word)
        };
        message_1(fd, &transfer)
            .map_err(|err| ConnectorError::Send(format!("SPI transfer failed: {err}")))?;
        return Ok(Vec::new());
    }

    if rx_len == tx.len() {
        let mut rx = vec![0u8; rx_len];
        let transfer = SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            rx_buf: rx.as_mut_ptr() as u64,
            len: tx.len() as u32,
            cs_change: 0,
            ..base_transfer(speed_hz, bits_per_word)
        };
        message_1(fd, &transfer)
            .map_err(|err| ConnectorError::Send(format!("SPI transfer failed: {err}")))?;
        return Ok(rx);
    }

    let dummy = vec![0u8; rx_len];
    let mut rx = vec![0u8; rx_len];
    let transfers = [
        SpiIocTransfer {
            tx_buf: tx.as_ptr() as u64,
            len: tx.len() as u32,
            cs_change: 1,
            ..base_transfer(speed_hz, bits_per_word)
        },
        SpiIocTransfer {
            tx_buf: dummy.as_ptr() as u64,
            rx_buf: rx.as_mut_ptr() as u64,
            len: rx_len as u32,
            cs_change: cs_change as u8,
            ..base_transfer(speed_hz, bits_per_word)
        },
    ];
    message_2(fd, &transfers)
        .map_err(|err| ConnectorError::Send(format!("SPI transfer failed: {err}")))?;
    Ok(rx)
}
