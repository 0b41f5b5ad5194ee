use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iotgw_core::{Connector, ConnectorError, Kind, Message, Params, Payload, RxCallback};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_modbus::client::{rtu, tcp, Context};
use tokio_modbus::prelude::*;
use tracing::{debug, error, warn};

use crate::config::{self, RegisterBlock, RegisterType};

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

async fn connect_rtu(cfg: &config::RtuConfig) -> Result<Context, ConnectorError> {
    let builder = tokio_serial::new(&cfg.device, cfg.baud_rate)
        .data_bits(data_bits(cfg.data_bits))
        .parity(parity(cfg.parity))
        .stop_bits(stop_bits(cfg.stop_bits));
    let port = tokio_serial::SerialStream::open(&builder)
        .map_err(|err| ConnectorError::Connect(format!("open {}: {err}", cfg.device)))?;
    let mut ctx = rtu::attach_slave(port, Slave(cfg.slave));
    // attach_slave is infallible; set_slave just to be explicit about which
    // unit id subsequent reads address.
    ctx.set_slave(Slave(cfg.slave));
    Ok(ctx)
}

async fn connect_tcp(cfg: &config::TcpConfig) -> Result<Context, ConnectorError> {
    let addr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .map_err(|err| ConnectorError::Connect(format!("invalid address: {err}")))?;
    let mut ctx = tcp::connect(addr)
        .await
        .map_err(|err| ConnectorError::Connect(err.to_string()))?;
    ctx.set_slave(Slave(cfg.slave));
    Ok(ctx)
}

/// Reads one block, returning its registers serialised as 2-byte
/// big-endian values. A read failure is reported to the caller, which logs
/// it and moves on to the next block rather than aborting the round.
async fn read_block(ctx: &mut Context, block: &RegisterBlock) -> Result<Vec<u8>, ConnectorError> {
    let registers = match block.register_type {
        RegisterType::Holding => ctx.read_holding_registers(block.address, block.count).await,
        RegisterType::Input => ctx.read_input_registers(block.address, block.count).await,
    };
    let registers = registers
        .map_err(|err| ConnectorError::Send(format!("modbus I/O error: {err}")))?
        .map_err(|exc| ConnectorError::Send(format!("modbus exception: {exc}")))?;

    let mut bytes = Vec::with_capacity(registers.len() * 2);
    for reg in registers {
        bytes.extend_from_slice(&reg.to_be_bytes());
    }
    Ok(bytes)
}

async fn poll_round(ctx: &Arc<Mutex<Context>>, blocks: &[RegisterBlock], kind: Kind, callback: &Arc<Mutex<Option<RxCallback>>>) {
    if blocks.is_empty() {
        return;
    }

    let mut payload = Vec::new();
    let first_address = blocks[0].address;
    let mut total_count: u16 = 0;

    let mut ctx = ctx.lock().await;
    for block in blocks {
        match read_block(&mut ctx, block).await {
            Ok(bytes) => {
                payload.extend(bytes);
                total_count = total_count.saturating_add(block.count);
            }
            Err(err) => {
                warn!(error = %err, address = block.address, "modbus register block read failed, continuing round");
            }
        }
    }
    drop(ctx);

    if payload.is_empty() {
        return;
    }

    let Some(callback) = callback.lock().await.clone() else {
        return;
    };
    let params = match kind {
        Kind::ModbusRtu => Params::ModbusRtu {
            address: first_address,
            count: total_count,
        },
        _ => Params::ModbusTcp {
            address: first_address,
            count: total_count,
        },
    };
    let message = Message::new(kind, Payload::new(payload)).with_params(params);
    callback(message).await;
}

/// A connected Modbus context (RTU over a serial port, or TCP) with a
/// background task that polls the configured register blocks on a fixed
/// period, same shape as the SPI driver's polling worker.
pub struct ModbusConnector {
    kind: Kind,
    ctx: Arc<Mutex<Context>>,
    callback: Arc<Mutex<Option<RxCallback>>>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    stop: Arc<AtomicBool>,
    blocks: Arc<Vec<RegisterBlock>>,
    poll_period_ms: u64,
}

impl ModbusConnector {
    pub async fn open_rtu(params: serde_json::Value) -> Result<Arc<dyn Connector>, ConnectorError> {
        let cfg: config::RtuConfig = serde_json::from_value(params)
            .map_err(|err| ConnectorError::DeviceConfig(err.to_string()))?;
        let ctx = connect_rtu(&cfg).await?;
        debug!(device = %cfg.device, "Modbus RTU connected");
        Ok(Self::build(Kind::ModbusRtu, ctx, cfg.blocks, cfg.poll_period_ms))
    }

    pub async fn open_tcp(params: serde_json::Value) -> Result<Arc<dyn Connector>, ConnectorError> {
        let cfg: config::TcpConfig = serde_json::from_value(params)
            .map_err(|err| ConnectorError::DeviceConfig(err.to_string()))?;
        let ctx = connect_tcp(&cfg).await?;
        debug!(host = %cfg.host, port = cfg.port, "Modbus TCP connected");
        Ok(Self::build(Kind::ModbusTcp, ctx, cfg.blocks, cfg.poll_period_ms))
    }

    fn build(
        kind: Kind,
        ctx: Context,
        blocks: Vec<RegisterBlock>,
        poll_period_ms: u64,
    ) -> Arc<dyn Connector> {
        Arc::new(ModbusConnector {
            kind,
            ctx: Arc::new(Mutex::new(ctx)),
            callback: Arc::new(Mutex::new(None)),
            poll_task: Mutex::new(None),
            stop: Arc::new(AtomicBool::new(false)),
            blocks: Arc::new(blocks),
            poll_period_ms,
        })
    }

    async fn start_polling(&self) {
        let ctx = self.ctx.clone();
        let blocks = self.blocks.clone();
        let kind = self.kind;
        let callback = self.callback.clone();
        let stop = self.stop.clone();
        let period = Duration::from_millis(self.poll_period_ms);

        let handle = tokio::spawn(async move {
            while !stop.load(Ordering::Relaxed) {
                let round_start = tokio::time::Instant::now();
                poll_round(&ctx, &blocks, kind, &callback).await;
                let elapsed = round_start.elapsed();
                if elapsed < period {
                    tokio::time::sleep(period - elapsed).await;
                }
            }
        });

        *self.poll_task.lock().await = Some(handle);
    }
}

#[async_trait]
impl Connector for ModbusConnector {
    fn kind(&self) -> Kind {
        self.kind
    }

    async fn start_receiving(&self, callback: RxCallback) -> Result<(), ConnectorError> {
        *self.callback.lock().await = Some(callback);
        if !self.blocks.is_empty() {
            self.start_polling().await;
        }
        Ok(())
    }

    async fn send(&self, message: &Message) -> Result<(), ConnectorError> {
        Err(ConnectorError::Send(format!(
            "the Modbus connector is read-only in this build (got a send of kind {:?})",
            message.kind
        )))
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.poll_task.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .is_err()
            {
                error!("Modbus poll task did not join within the shutdown deadline");
            }
        }
        Ok(())
    }
}
