mod config;
mod connector;

pub use config::{Config, Parity};
pub use connector::UartConnector;

use iotgw_core::OpenFn;
use std::sync::Arc;

/// The `OpenFn` registered under the `"uart"` connector type.
pub fn open_fn() -> OpenFn {
    Arc::new(|params| Box::pin(UartConnector::open(params)))
}
