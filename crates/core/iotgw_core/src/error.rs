use thiserror::Error;

/// Failures a [`crate::connector::Connector`] driver can raise while opening,
/// connecting, or sending.
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("invalid device configuration: {0}")]
    DeviceConfig(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("failed to send message: {0}")]
    Send(String),

    #[error("connector kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        expected: crate::kind::Kind,
        actual: crate::kind::Kind,
    },

    #[error("no driver registered for connector type {0:?}")]
    NoDriver(String),
}

/// Failures raised while transforming a message between bridge endpoints.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("message failed transform: {0}")]
    Failed(String),

    #[error("no transform registered named {0:?}")]
    UnknownTransform(String),
}

/// Failures raised by the bridge orchestrator itself, as opposed to a
/// specific connector or transform.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bridge {bridge:?} references unknown connector {connector:?}")]
    UnknownConnector { bridge: String, connector: String },

    #[error("bridge {bridge:?} pairs {source:?} with {destination:?}, which has no transport")]
    UnsupportedPair {
        bridge: String,
        source: crate::kind::Kind,
        destination: crate::kind::Kind,
    },

    #[error("bridge {bridge:?} names unknown transform {transform:?}")]
    UnknownTransform { bridge: String, transform: String },

    #[error(transparent)]
    Connector(#[from] ConnectorError),

    #[error(transparent)]
    Transform(#[from] TransformError),
}
