use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "mds-agent")]
#[command(about = "Metadata-driven guest agent: reconciliation loop, credential rotation, command monitor")]
pub struct Cli {
    /// Distro-default config file (lowest priority).
    #[arg(long, default_value = "/etc/default/instance_configs.cfg")]
    pub distro_config: PathBuf,

    /// User-override config file (highest priority).
    #[arg(long, default_value = "/etc/google-guest-agent/instance_configs.cfg")]
    pub user_config: PathBuf,

    /// Metadata base URL override, for local testing against a fake server.
    #[arg(long)]
    pub metadata_base_url: Option<String>,
}
