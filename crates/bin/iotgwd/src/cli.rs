use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, clap::Parser)]
#[clap(
    name = clap::crate_name!(),
    version = clap::crate_version!(),
    about = clap::crate_description!()
)]
pub struct GatewayOpt {
    /// The main gateway configuration file.
    #[clap(short = 'c', long = "config", default_value = "/etc/iotgw.yaml")]
    pub config: PathBuf,

    /// Directory scanned for `*.yaml` configuration fragments.
    #[clap(long = "confdir", default_value = "/etc/iotgwd")]
    pub confdir: PathBuf,
}

impl GatewayOpt {
    pub fn parse_args() -> Self {
        GatewayOpt::parse()
    }
}
