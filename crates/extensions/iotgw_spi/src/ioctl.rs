use std::mem::size_of;
use std::os::unix::io::RawFd;

use nix::{ioctl_read, ioctl_write_ptr, ioctl_write_ptr_bad, request_code_write};

/// Mirrors `struct spi_ioc_transfer` from `linux/spi/spidev.h`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct SpiIocTransfer {
    pub tx_buf: u64,
    pub rx_buf: u64,
    pub len: u32,
    pub speed_hz: u32,
    pub delay_usecs: u16,
    pub bits_per_word: u8,
    pub cs_change: u8,
    pub tx_nbits: u8,
    pub rx_nbits: u8,
    pub word_delay_usecs: u8,
    pub pad: u8,
}

const SPI_IOC_MAGIC: u8 = b'k';

ioctl_read!(spi_ioc_rd_mode, SPI_IOC_MAGIC, 1, u8);
ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, 1, u8);
ioctl_read!(spi_ioc_rd_lsb_first, SPI_IOC_MAGIC, 2, u8);
ioctl_write_ptr!(spi_ioc_wr_lsb_first, SPI_IOC_MAGIC, 2, u8);
ioctl_read!(spi_ioc_rd_bits_per_word, SPI_IOC_MAGIC, 3, u8);
ioctl_write_ptr!(spi_ioc_wr_bits_per_word, SPI_IOC_MAGIC, 3, u8);
ioctl_read!(spi_ioc_rd_max_speed_hz, SPI_IOC_MAGIC, 4, u32);
ioctl_write_ptr!(spi_ioc_wr_max_speed_hz, SPI_IOC_MAGIC, 4, u32);

// `SPI_IOC_MESSAGE(N)` encodes the transfer array length into the request
// number itself, so unlike the fixed-size ioctls above it can't use the
// size-inferring macros. We only ever submit one or two segments (§4.4), so
// two `_bad` wrappers with the request number computed for each size cover
// every transaction shape this driver builds.
ioctl_write_ptr_bad!(
    spi_ioc_message_1,
    request_code_write!(SPI_IOC_MAGIC, 0, size_of::<SpiIocTransfer>()),
    SpiIocTransfer
);
ioctl_write_ptr_bad!(
    spi_ioc_message_2,
    request_code_write!(SPI_IOC_MAGIC, 0, 2 * size_of::<SpiIocTransfer>()),
    [SpiIocTransfer; 2]
);

/// Sets a mode/bpw/speed field via its `WR` ioctl, then reads it back via the
/// matching `RD` ioctl — the Rust rendering of the original's `SPI_TRY_SET`.
pub fn set_mode(fd: RawFd, mode: u8) -> nix::Result<()> {
    unsafe { spi_ioc_wr_mode(fd, &mode)? };
    let mut readback: u8 = 0;
    unsafe { spi_ioc_rd_mode(fd, &mut readback)? };
    Ok(())
}

pub fn set_bits_per_word(fd: RawFd, bits: u8) -> nix::Result<()> {
    unsafe { spi_ioc_wr_bits_per_word(fd, &bits)? };
    let mut readback: u8 = 0;
    unsafe { spi_ioc_rd_bits_per_word(fd, &mut readback)? };
    Ok(())
}

pub fn set_max_speed_hz(fd: RawFd, hz: u32) -> nix::Result<()> {
    unsafe { spi_ioc_wr_max_speed_hz(fd, &hz)? };
    let mut readback: u32 = 0;
    unsafe { spi_ioc_rd_max_speed_hz(fd, &mut readback)? };
    Ok(())
}

pub fn set_lsb_first(fd: RawFd, lsb_first: bool) -> nix::Result<()> {
    let value: u8 = lsb_first as u8;
    unsafe { spi_ioc_wr_lsb_first(fd, &value)? };
    let mut readback: u8 = 0;
    unsafe { spi_ioc_rd_lsb_first(fd, &mut readback)? };
    Ok(())
}

pub fn message_1(fd: RawFd, transfer: &SpiIocTransfer) -> nix::Result<()> {
    unsafe { spi_ioc_message_1(fd, transfer)? };
    Ok(())
}

pub fn message_2(fd: RawFd, transfers: &[SpiIocTransfer; 2]) -> nix::Result<()> {
    unsafe { spi_ioc_message_2(fd, transfers)? };
    Ok(())
}
