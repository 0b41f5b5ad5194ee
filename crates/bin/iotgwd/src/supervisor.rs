//! The supervisor loop: loads the configuration, starts every bridge it
//! names, then runs until asked to stop or reload.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use iotgw_config::load_all;
use iotgw_core::{BridgeRuntime, Config, DriverRegistry, TransformRegistry};
use iotgw_utils::{GatewaySignal, GatewaySignals};
use iotgw_watchdog::Notifier;
use tracing::{debug, error, info, warn};

/// Where the supervisor reads its configuration from. `confdir` is scanned
/// for `*.yaml` fragments after the main file and any of its `includes`.
pub struct Ctx {
    pub config_path: PathBuf,
    pub confdir: PathBuf,
}

/// How often the cooperative loop wakes up to drive bridge bookkeeping,
/// regardless of the watchdog period — matches the 100ms floor the
/// supervisor loop is specified to never tick faster than.
const MIN_TICK: Duration = Duration::from_millis(100);

fn tick_interval(watchdog_usec: Option<u64>) -> Duration {
    match watchdog_usec {
        Some(usec) if usec > 0 => {
            let sixty_percent = Duration::from_micros(usec * 60 / 100);
            sixty_percent.max(MIN_TICK)
        }
        _ => MIN_TICK,
    }
}

async fn start_bridges(config: &Config, registry: &DriverRegistry) -> Vec<BridgeRuntime> {
    let transforms = Arc::new(TransformRegistry::default());
    let mut running = Vec::new();

    for rule in &config.bridges {
        let mut bridge = match BridgeRuntime::prepare(rule, config, registry, transforms.clone()) {
            Ok(bridge) => bridge,
            Err(err) => {
                error!(bridge = %rule.name, error = %err, "failed to prepare bridge, skipping");
                continue;
            }
        };

        if let Err(err) = bridge.start(registry).await {
            error!(bridge = %rule.name, error = %err, "failed to start bridge, skipping");
            continue;
        }

        info!(bridge = %rule.name, "bridge running");
        running.push(bridge);
    }

    running
}

/// Stop every running bridge in reverse start order, logging (not
/// propagating) any failure so one stuck connector never stops the rest
/// from being asked to close.
async fn stop_bridges(bridges: &mut Vec<BridgeRuntime>) {
    while let Some(mut bridge) = bridges.pop() {
        if let Err(err) = bridge.stop().await {
            warn!(bridge = %bridge.name, error = %err, "bridge did not stop cleanly");
        }
    }
}

/// Attempts a reload: loads and validates a fresh configuration, and only
/// if that succeeds, stops the current bridge set and starts the new one.
/// A bad new configuration leaves the running gateway untouched.
async fn reload(ctx: &Ctx, registry: &DriverRegistry, bridges: &mut Vec<BridgeRuntime>) {
    match load_all(&ctx.config_path, &ctx.confdir) {
        Ok(config) => {
            info!("configuration reloaded, restarting bridges");
            stop_bridges(bridges).await;
            *bridges = start_bridges(&config, registry).await;
        }
        Err(err) => {
            error!(error = %err, "reload failed, keeping current configuration running");
        }
    }
}

/// Runs the gateway until it is told to stop.
///
/// `initial_config` is the already-loaded, already-validated document used
/// for the daemon's first bridge set — loaded by the caller so the gateway
/// log level it names can drive the tracing subscriber before this function
/// ever starts logging. Every later `SIGHUP` reload reads the files named
/// by `ctx` fresh.
pub async fn run(
    ctx: Ctx,
    initial_config: Config,
    registry: DriverRegistry,
    notifier: Box<dyn Notifier>,
) {
    let mut signals = GatewaySignals::install();

    let mut bridges = start_bridges(&initial_config, &registry).await;

    if let Err(err) = notifier.ready() {
        warn!(error = %err, "failed to notify init system of readiness");
    }

    let watchdog_usec = notifier.watchdog_usec();
    let watchdog_ping_interval = tick_interval(watchdog_usec);
    debug!(?watchdog_ping_interval, ?watchdog_usec, "supervisor watchdog cadence computed");

    // The cooperative loop itself always wakes at the 100ms floor; only the
    // watchdog ping follows the (usually coarser) computed cadence.
    let mut ticker = tokio::time::interval(MIN_TICK);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut since_watchdog = Duration::ZERO;

    loop {
        tokio::select! {
            signal = signals.recv() => {
                match signal {
                    GatewaySignal::Stop => {
                        info!("received stop signal, draining");
                        break;
                    }
                    GatewaySignal::Reload => {
                        info!("received reload signal");
                        reload(&ctx, &registry, &mut bridges).await;
                    }
                }
            }
            _ = ticker.tick() => {
                for bridge in &bridges {
                    bridge.tick().await;
                }

                since_watchdog += MIN_TICK;
                if since_watchdog >= watchdog_ping_interval {
                    since_watchdog = Duration::ZERO;
                    if let Err(err) = notifier.watchdog() {
                        warn!(error = %err, "failed to send watchdog ping");
                    }
                }
            }
        }
    }

    if let Err(err) = notifier.stopping() {
        warn!(error = %err, "failed to notify init system of shutdown");
    }
    stop_bridges(&mut bridges).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_interval_is_sixty_percent_of_watchdog_period() {
        assert_eq!(tick_interval(Some(1_000_000)), Duration::from_millis(600));
    }

    #[test]
    fn tick_interval_never_goes_below_the_cooperative_floor() {
        assert_eq!(tick_interval(Some(100_000)), MIN_TICK);
    }

    #[test]
    fn tick_interval_defaults_to_the_floor_with_no_watchdog() {
        assert_eq!(tick_interval(None), MIN_TICK);
    }
}
