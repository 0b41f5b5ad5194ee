mod config;
mod connector;
mod hex;
mod ioctl;
mod transaction;

pub use config::{Config, SpiOp, Transaction};
pub use connector::SpiConnector;

use iotgw_core::OpenFn;
use std::sync::Arc;

/// The `OpenFn` registered under the `"spi"` connector type.
pub fn open_fn() -> OpenFn {
    Arc::new(|params| Box::pin(SpiConnector::open(params)))
}
