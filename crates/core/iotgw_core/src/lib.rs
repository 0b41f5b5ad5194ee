//! Shared types for the iotgw gateway: the message model, the connector
//! trait and driver registry, transform functions, bridge configuration,
//! and the bridge orchestrator itself.
//!
//! Nothing in this crate depends on a protocol-specific driver crate; the
//! `iotgwd` binary is the one place those are wired together.

pub mod bridge;
pub mod config;
pub mod connector;
pub mod error;
pub mod kind;
pub mod message;
pub mod payload;
pub mod transform;

pub use bridge::{BridgeRuntime, BridgeState};
pub use config::{BridgeConfig, BufferPolicy, Config, ConnectorConfig, GatewayConfig, RateLimit};
pub use connector::{Connector, DriverRegistry, OpenFn, RxCallback};
pub use error::{BridgeError, ConnectorError, TransformError};
pub use kind::{kind_for_type, Kind};
pub use message::{Message, Params};
pub use payload::Payload;
pub use transform::{TransformContext, TransformFn, TransformRegistry};
