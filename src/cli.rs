use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bundler")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Install, activate and roll back versioned software bundles", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Overwrite host files, replace conflicting links, remove edited files
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Install without activating
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Bundle store root [default: /opt/bundler]
    #[arg(short, long, global = true, env = "BUNDLER_ROOT")]
    pub root: Option<PathBuf>,

    /// Prefix for host etc, etc/init.d and bin directories [default: /]
    #[arg(short = 'H', long, global = true, env = "BUNDLER_HOST_ROOT")]
    pub host_root: Option<PathBuf>,

    /// Do not start or stop services
    #[arg(short, long, global = true)]
    pub no_services: bool,

    /// Config file [default: /etc/bundler.toml if present]
    #[arg(short, long, global = true, env = "BUNDLER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install a bundle archive (<name>-<version>.tar.gz) from a file or URL
    Install {
        /// Local path or http(s)/ftp URL
        source: String,
    },

    /// Remove one version, or the whole bundle with --force
    Uninstall {
        bundle: String,
        #[arg(id = "bundle_version", value_name = "VERSION")]
        version: Option<String>,
    },

    /// Make an installed version current and activate it
    Activate {
        bundle: String,
        #[arg(id = "bundle_version", value_name = "VERSION")]
        version: String,
    },

    /// Deactivate the current version of a bundle
    Deactivate { bundle: String },

    /// List bundles, or the versions of one bundle
    List(ListArgs),

    /// Show the activation status of a bundle
    Status { bundle: String },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args)]
pub struct ListArgs {
    /// Show versions of this bundle
    pub bundle: Option<String>,

    /// Machine-readable output
    #[arg(long)]
    pub json: bool,
}
