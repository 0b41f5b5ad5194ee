//! The init-system notification channel the supervisor drives: `READY`,
//! `WATCHDOG`, and `STOPPING` verbs, plus a query for the configured
//! watchdog period.
//!
//! Treated by the core as a pure trait so the supervisor loop never cares
//! whether it's actually talking to an init system or a test double.

use std::env;
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::net::UnixDatagram;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to create notify socket: {0}")]
    Socket(#[source] io::Error),

    #[error("failed to send notification: {0}")]
    Send(#[source] io::Error),
}

/// The three verbs the gateway sends to its init system, plus the watchdog
/// period query, abstracted behind a trait so the supervisor can run
/// without one (`NullNotifier`) or against the real protocol
/// (`SystemdNotifier`).
pub trait Notifier: Send + Sync {
    /// Tell the init system the daemon finished its initial bridge startup
    /// and is ready to serve.
    fn ready(&self) -> Result<(), NotifyError>;

    /// Send a liveness ping. Must be called more often than the watchdog
    /// period the init system configured, or it will consider the daemon
    /// hung and restart it.
    fn watchdog(&self) -> Result<(), NotifyError>;

    /// Tell the init system the daemon is shutting down.
    fn stopping(&self) -> Result<(), NotifyError>;

    /// The watchdog period in microseconds, if the init system configured
    /// one. The supervisor ticks at some fraction of this.
    fn watchdog_usec(&self) -> Option<u64>;
}

/// Speaks the systemd `sd_notify` datagram protocol: a `\n`-joined list of
/// `KEY=VALUE` pairs sent to the abstract or filesystem socket path in
/// `$NOTIFY_SOCKET`.
pub struct SystemdNotifier {
    socket: UnixDatagram,
    watchdog_usec: Option<u64>,
}

impl SystemdNotifier {
    /// Builds a notifier from the current process environment. Returns
    /// `None` when `$NOTIFY_SOCKET` is unset — i.e. the daemon was not
    /// started by an init system that wants notifications.
    pub fn from_env() -> Result<Option<Self>, NotifyError> {
        let Some(socket_path) = env::var_os("NOTIFY_SOCKET") else {
            return Ok(None);
        };
        let path = PathBuf::from(socket_path);
        // Abstract sockets are denoted by a leading '@' in the env var but
        // a leading NUL byte on the wire.
        let connect_path = if path.as_os_str().as_bytes().starts_with(b"@") {
            let mut bytes = path.as_os_str().as_bytes().to_vec();
            bytes[0] = 0;
            PathBuf::from(std::ffi::OsString::from_vec(bytes))
        } else {
            path.clone()
        };

        let socket = UnixDatagram::unbound().map_err(NotifyError::Socket)?;
        socket
            .connect(&connect_path)
            .map_err(NotifyError::Socket)?;

        let watchdog_usec = env::var("WATCHDOG_USEC")
            .ok()
            .and_then(|s| s.parse::<u64>().ok());

        debug!(socket = %path.display(), watchdog_usec = ?watchdog_usec, "connected to init-system notify socket");
        Ok(Some(SystemdNotifier {
            socket,
            watchdog_usec,
        }))
    }

    fn send(&self, state: &str) -> Result<(), NotifyError> {
        self.socket
            .send(state.as_bytes())
            .map_err(NotifyError::Send)?;
        Ok(())
    }
}

impl Notifier for SystemdNotifier {
    fn ready(&self) -> Result<(), NotifyError> {
        self.send("READY=1")
    }

    fn watchdog(&self) -> Result<(), NotifyError> {
        self.send("WATCHDOG=1")
    }

    fn stopping(&self) -> Result<(), NotifyError> {
        self.send("STOPPING=1")
    }

    fn watchdog_usec(&self) -> Option<u64> {
        self.watchdog_usec
    }
}

/// A notifier that does nothing, for when `$NOTIFY_SOCKET` is unset or the
/// init-system integration is disabled in config.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn ready(&self) -> Result<(), NotifyError> {
        Ok(())
    }

    fn watchdog(&self) -> Result<(), NotifyError> {
        Ok(())
    }

    fn stopping(&self) -> Result<(), NotifyError> {
        Ok(())
    }

    fn watchdog_usec(&self) -> Option<u64> {
        None
    }
}

/// Builds the right notifier for the current environment: `SystemdNotifier`
/// when `$NOTIFY_SOCKET` is set and reachable, `NullNotifier` otherwise.
pub fn notifier_from_env() -> Result<Box<dyn Notifier>, NotifyError> {
    match SystemdNotifier::from_env()? {
        Some(notifier) => Ok(Box::new(notifier)),
        None => {
            warn!("NOTIFY_SOCKET not set, running without init-system notifications");
            Ok(Box::new(NullNotifier))
        }
    }
}
