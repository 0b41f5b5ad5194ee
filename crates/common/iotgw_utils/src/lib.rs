pub mod signals;

pub use signals::{GatewaySignal, GatewaySignals};
