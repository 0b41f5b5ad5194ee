mod config;
mod connector;

pub use config::Config;
pub use connector::HttpServerConnector;

use iotgw_core::OpenFn;
use std::sync::Arc;

/// The `OpenFn` registered under the `"http_server"` connector type.
pub fn open_fn() -> OpenFn {
    Arc::new(|params| Box::pin(HttpServerConnector::open(params)))
}
