use std::fs::OpenOptions;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iotgw_core::{Connector, ConnectorError, Kind, Message, Params, Payload, RxCallback};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::{Config, SpiOp, Transaction};
use crate::ioctl;
use crate::transaction;

fn apply_parameters(fd: std::os::unix::io::RawFd, cfg: &Config) -> Result<(), ConnectorError> {
    ioctl::set_mode(fd, cfg.mode)
        .map_err(|err| ConnectorError::DeviceConfig(format!("SPI_IOC_WR_MODE: {err}")))?;
    ioctl::set_bits_per_word(fd, cfg.bits_per_word)
        .map_err(|err| ConnectorError::DeviceConfig(format!("SPI_IOC_WR_BITS_PER_WORD: {err}")))?;
    ioctl::set_max_speed_hz(fd, cfg.speed_hz)
        .map_err(|err| ConnectorError::DeviceConfig(format!("SPI_IOC_WR_MAX_SPEED_HZ: {err}")))?;

    // LSB-first isn't implemented by every spidev controller driver; unlike
    // mode/bpw/speed this one is best-effort, mirroring the original's
    // `#ifdef SPI_IOC_WR_LSB_FIRST` compile-time guard with a runtime one.
    if let Err(err) = ioctl::set_lsb_first(fd, cfg.lsb_first) {
        warn!(error = %err, "SPI_IOC_WR_LSB_FIRST not supported by this controller, ignoring");
    }

    Ok(())
}

/// A spidev device: an open file descriptor with applied mode/bpw/speed, an
/// optional list of transactions run on a fixed period, and the RX callback
/// that period invokes for whichever transaction yields bytes back.
pub struct SpiConnector {
    file: Arc<std::fs::File>,
    callback: Arc<Mutex<Option<RxCallback>>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
    config: Arc<Config>,
}

impl SpiConnector {
    pub async fn open(params: serde_json::Value) -> Result<Arc<dyn Connector>, ConnectorError> {
        let cfg: Config = serde_json::from_value(params)
            .map_err(|err| ConnectorError::DeviceConfig(err.to_string()))?;
        let config = Arc::new(cfg);

        let config_for_open = config.clone();
        let file = tokio::task::spawn_blocking(move || -> Result<std::fs::File, ConnectorError> {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .open(&config_for_open.device)
                .map_err(|err| {
                    ConnectorError::DeviceConfig(format!(
                        "open {}: {err}",
                        config_for_open.device
                    ))
                })?;
            apply_parameters(file.as_raw_fd(), &config_for_open)?;
            Ok(file)
        })
        .await
        .map_err(|err| ConnectorError::DeviceConfig(format!("spawn_blocking join: {err}")))??;

        debug!(device = %config.device, "SPI device opened");

        let connector = Arc::new(SpiConnector {
            file: Arc::new(file),
            callback: Arc::new(Mutex::new(None)),
            poll_task: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            config,
        });

        Ok(connector as Arc<dyn Connector>)
    }

    async fn start_polling(&self, poll_interval_ms: u64) {
        let file = self.file.clone();
        let config = self.config.clone();
        let callback = self.callback.clone();
        let stop = self.stop.clone();

        let handle = tokio::spawn(async move {
            let period = Duration::from_millis(poll_interval_ms);
            while !stop.load(Ordering::Relaxed) {
                let round_start = tokio::time::Instant::now();
                run_round(&file, &config, &callback).await;
                let elapsed = round_start.elapsed();
                if elapsed < period {
                    tokio::time::sleep(period - elapsed).await;
                }
            }
        });

        // start_polling is only ever called once, right after open, so the
        // slot is always empty here.
        *self.poll_task.lock().await = Some(handle);
    }
}

async fn run_round(
    file: &Arc<std::fs::File>,
    config: &Arc<Config>,
    callback: &Arc<Mutex<Option<RxCallback>>>,
) {
    for (index, t) in config.transactions.iter().enumerate() {
        let file = file.clone();
        let t = t.clone();
        let speed_hz = config.speed_hz;
        let bits_per_word = config.bits_per_word;
        let cs_change = config.cs_change;

        let result = tokio::task::spawn_blocking(move || {
            transaction::execute(file.as_raw_fd(), &t, speed_hz, bits_per_word, cs_change)
        })
        .await;

        let rx = match result {
            Ok(Ok(rx)) => rx,
            Ok(Err(err)) => {
                error!(error = %err, "SPI transaction failed");
                continue;
            }
            Err(err) => {
                error!(error = %err, "SPI transaction task panicked");
                continue;
            }
        };

        if rx.is_empty() {
            continue;
        }

        let Some(callback) = callback.lock().await.clone() else {
            continue;
        };
        let message = Message::new(Kind::Spi, Payload::new(rx))
            .with_params(Params::Spi { transaction_index: index });
        callback(message).await;
    }
}

#[async_trait]
impl Connector for SpiConnector {
    fn kind(&self) -> Kind {
        Kind::Spi
    }

    async fn start_receiving(&self, callback: RxCallback) -> Result<(), ConnectorError> {
        *self.callback.lock().await = Some(callback);
        if let Some(poll_interval_ms) = self.config.poll_interval_ms {
            self.start_polling(poll_interval_ms).await;
        }
        Ok(())
    }

    async fn send(&self, message: &Message) -> Result<(), ConnectorError> {
        if message.kind != Kind::Spi {
            return Err(ConnectorError::KindMismatch {
                expected: Kind::Spi,
                actual: message.kind,
            });
        }
        let payload = message.payload.data().to_vec();
        if payload.is_empty() || payload.len() > 4096 {
            return Err(ConnectorError::Send(format!(
                "SPI write payload length {} out of bounds [1,4096]",
                payload.len()
            )));
        }

        let t = Transaction {
            op: SpiOp::Write,
            len: payload.len(),
            tx: Some(hex_encode(&payload)),
            rx_len: None,
        };
        let file = self.file.clone();
        let speed_hz = self.config.speed_hz;
        let bits_per_word = self.config.bits_per_word;
        let cs_change = self.config.cs_change;

        tokio::task::spawn_blocking(move || {
            transaction::execute(file.as_raw_fd(), &t, speed_hz, bits_per_word, cs_change)
        })
        .await
        .map_err(|err| ConnectorError::Send(format!("spawn_blocking join: {err}")))?
        .map(|_| ())
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.poll_task.lock().await.take() {
            let _ = handle.await;
        }
        Ok(())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
