mod config;
mod connector;

pub use config::{Config, Endpoint, Subscription, TlsConfig};
pub use connector::MqttConnector;

use iotgw_core::OpenFn;
use std::sync::Arc;

/// The `OpenFn` registered under the `"mqtt"` connector type.
pub fn open_fn() -> OpenFn {
    Arc::new(|params| Box::pin(MqttConnector::open(params)))
}
