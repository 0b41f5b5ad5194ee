use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing::error;

/// What the supervisor loop should do in response to the next signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewaySignal {
    /// `SIGHUP`: reload the configuration.
    Reload,
    /// `SIGINT`/`SIGTERM`/`SIGQUIT`: drain and exit.
    Stop,
}

struct OptionalSignal(Option<Signal>);

impl OptionalSignal {
    fn install(kind: SignalKind, name: &str) -> Self {
        match signal(kind) {
            Ok(signal) => OptionalSignal(Some(signal)),
            Err(err) => {
                error!(signal = name, error = %err, "failed to install signal handler");
                OptionalSignal(None)
            }
        }
    }

    /// Waits forever if the handler failed to install, rather than firing
    /// spuriously — `tokio::select!` just never picks this branch.
    async fn recv(&mut self) {
        match &mut self.0 {
            Some(signal) => {
                signal.recv().await;
            }
            None => std::future::pending().await,
        }
    }
}

/// Listens for the four signals the gateway supervisor reacts to and
/// collapses them into [`GatewaySignal::Stop`] or [`GatewaySignal::Reload`].
pub struct GatewaySignals {
    sigint: OptionalSignal,
    sigterm: OptionalSignal,
    sigquit: OptionalSignal,
    sighup: OptionalSignal,
}

impl GatewaySignals {
    pub fn install() -> Self {
        GatewaySignals {
            sigint: OptionalSignal::install(SignalKind::interrupt(), "SIGINT"),
            sigterm: OptionalSignal::install(SignalKind::terminate(), "SIGTERM"),
            sigquit: OptionalSignal::install(SignalKind::quit(), "SIGQUIT"),
            sighup: OptionalSignal::install(SignalKind::hangup(), "SIGHUP"),
        }
    }

    /// Waits for the next signal of interest.
    pub async fn recv(&mut self) -> GatewaySignal {
        tokio::select! {
            _ = self.sigint.recv() => GatewaySignal::Stop,
            _ = self.sigterm.recv() => GatewaySignal::Stop,
            _ = self.sigquit.recv() => GatewaySignal::Stop,
            _ = self.sighup.recv() => GatewaySignal::Reload,
        }
    }
}
