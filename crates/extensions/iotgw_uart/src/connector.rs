use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iotgw_core::{Connector, ConnectorError, Kind, Message, Payload, RxCallback};
use tokio::io::{self, AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_serial::SerialStream;
use tracing::{debug, error, warn};

use crate::config::{self, Config};

fn data_bits(bits: u8) -> tokio_serial::DataBits {
    match bits {
        5 => tokio_serial::DataBits::Five,
        6 => tokio_serial::DataBits::Six,
        7 => tokio_serial::DataBits::Seven,
        _ => tokio_serial::DataBits::Eight,
    }
}

fn parity(parity: config::Parity) -> tokio_serial::Parity {
    match parity {
        config::Parity::None => tokio_serial::Parity::None,
        config::Parity::Even => tokio_serial::Parity::Even,
        config::Parity::Odd => tokio_serial::Parity::Odd,
    }
}

fn stop_bits(bits: u8) -> tokio_serial::StopBits {
    match bits {
        2 => tokio_serial::StopBits::Two,
        _ => tokio_serial::StopBits::One,
    }
}

fn open_port(cfg: &Config) -> Result<SerialStream, ConnectorError> {
    let builder = tokio_serial::new(&cfg.device, cfg.baud_rate)
        .data_bits(data_bits(cfg.data_bits))
        .parity(parity(cfg.parity))
        .stop_bits(stop_bits(cfg.stop_bits))
        .timeout(Duration::from_millis(cfg.read_timeout_ms));
    SerialStream::open(&builder)
        .map_err(|err| ConnectorError::DeviceConfig(format!("open {}: {err}", cfg.device)))
}

/// A serial port connector: a bounded read loop on a background task that
/// invokes the RX callback once per non-empty read, with no framing imposed
/// on the bytes — the framework stays agnostic of whatever protocol rides
/// on top of the wire.
pub struct UartConnector {
    write_half: Arc<Mutex<WriteHalf<SerialStream>>>,
    callback: Arc<Mutex<Option<RxCallback>>>,
    read_task: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
}

impl UartConnector {
    pub async fn open(params: serde_json::Value) -> Result<Arc<dyn Connector>, ConnectorError> {
        let cfg: Config = serde_json::from_value(params)
            .map_err(|err| ConnectorError::DeviceConfig(err.to_string()))?;

        let device = cfg.device.clone();
        let chunk_size = cfg.chunk_size;
        let port = tokio::task::spawn_blocking(move || open_port(&cfg))
            .await
            .map_err(|err| ConnectorError::DeviceConfig(format!("spawn_blocking join: {err}")))??;
        debug!(device = %device, "UART port opened");

        let (read_half, write_half) = io::split(port);
        let stop = Arc::new(AtomicBool::new(false));
        let callback: Arc<Mutex<Option<RxCallback>>> = Arc::new(Mutex::new(None));
        let read_task = Self::spawn_read_loop(read_half, chunk_size, stop.clone(), callback.clone());

        Ok(Arc::new(UartConnector {
            write_half: Arc::new(Mutex::new(write_half)),
            callback,
            read_task: Mutex::new(Some(read_task)),
            stop,
        }))
    }

    fn spawn_read_loop(
        mut read_half: ReadHalf<SerialStream>,
        chunk_size: usize,
        stop: Arc<AtomicBool>,
        callback: Arc<Mutex<Option<RxCallback>>>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut buf = vec![0u8; chunk_size];
            while !stop.load(Ordering::Relaxed) {
                match read_half.read(&mut buf).await {
                    Ok(0) => continue,
                    Ok(n) => {
                        let Some(callback) = callback.lock().await.clone() else {
                            continue;
                        };
                        callback(Message::new(Kind::Uart, Payload::new(buf[..n].to_vec()))).await;
                    }
                    Err(err) if err.kind() == io::ErrorKind::TimedOut => continue,
                    Err(err) => {
                        error!(error = %err, "UART read failed, stopping read loop");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl Connector for UartConnector {
    fn kind(&self) -> Kind {
        Kind::Uart
    }

    async fn start_receiving(&self, callback: RxCallback) -> Result<(), ConnectorError> {
        *self.callback.lock().await = Some(callback);
        Ok(())
    }

    async fn send(&self, message: &Message) -> Result<(), ConnectorError> {
        if message.kind != Kind::Uart {
            return Err(ConnectorError::KindMismatch {
                expected: Kind::Uart,
                actual: message.kind,
            });
        }
        self.write_half
            .lock()
            .await
            .write_all(message.payload.data())
            .await
            .map_err(|err| ConnectorError::Send(err.to_string()))
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.read_task.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                warn!("UART read task did not join within the shutdown deadline");
            }
        }
        Ok(())
    }
}
