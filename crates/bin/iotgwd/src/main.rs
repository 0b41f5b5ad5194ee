use iotgwd::cli::GatewayOpt;
use iotgwd::{load_initial_config, logging, registry, supervisor};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let opt = GatewayOpt::parse_args();

    let config = match load_initial_config(&opt).await {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err:?}");
            return std::process::ExitCode::from(2);
        }
    };

    logging::init(&config.gateway.loglevel);

    let notifier = match iotgw_watchdog::notifier_from_env() {
        Ok(notifier) => notifier,
        Err(err) => {
            tracing::warn!(error = %err, "failed to set up init-system notifier, running without one");
            Box::new(iotgw_watchdog::NullNotifier)
        }
    };

    let registry = registry::build();
    let ctx = supervisor::Ctx {
        config_path: opt.config,
        confdir: opt.confdir,
    };

    supervisor::run(ctx, config, registry, notifier).await;

    std::process::ExitCode::from(0)
}
