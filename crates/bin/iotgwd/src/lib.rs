//! The iotgw gateway daemon: CLI parsing, driver registration, and the
//! supervisor loop that ties a loaded configuration to running bridges.
//!
//! Split out of `main.rs` so both the binary and its integration tests can
//! reach the same pieces.

pub mod cli;
pub mod logging;
pub mod registry;
pub mod supervisor;

use anyhow::Context;
use cli::GatewayOpt;
use iotgw_core::Config;

/// Loads the initial configuration, the one failure this binary treats as
/// fatal; everything past this point is either infallible or, per the
/// supervisor loop's own design, logged and skipped rather than propagated.
pub async fn load_initial_config(opt: &GatewayOpt) -> anyhow::Result<Config> {
    iotgw_config::load_all(&opt.config, &opt.confdir)
        .with_context(|| format!("failed to load {}", opt.config.display()))
}
