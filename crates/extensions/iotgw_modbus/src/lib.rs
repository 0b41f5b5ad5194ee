mod config;
mod connector;

pub use config::{Parity, RegisterBlock, RegisterType, RtuConfig, TcpConfig};
pub use connector::ModbusConnector;

use iotgw_core::OpenFn;
use std::sync::Arc;

/// The `OpenFn` registered under the `"modbus_rtu"` connector type.
pub fn rtu_open_fn() -> OpenFn {
    Arc::new(|params| Box::pin(ModbusConnector::open_rtu(params)))
}

/// The `OpenFn` registered under the `"modbus_tcp"` connector type.
pub fn tcp_open_fn() -> OpenFn {
    Arc::new(|params| Box::pin(ModbusConnector::open_tcp(params)))
}
