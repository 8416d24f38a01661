pub mod commands;
pub mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::aggregator::UnregisterPolicy;
use crate::export::DocFormat;

#[derive(Parser)]
#[command(name = "autodoc-proxy")]
#[command(about = "Document the API of ROS nodes by proxying their master calls")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Proxy the master until interrupted, then write documentation
    Run(RunArgs),
    /// Write a config file with the default settings
    Init(InitArgs),
}

#[derive(clap::Args, Debug, Default)]
pub struct RunArgs {
    /// Nodes to document (all observed nodes if empty)
    #[arg(value_name = "NODE")]
    pub nodes: Vec<String>,

    /// URI of the real master
    #[arg(long, env = "AUTODOC_MASTER_URI")]
    pub master_uri: Option<String>,

    /// Port the proxy listens on; point ROS_MASTER_URI at it
    #[arg(long)]
    pub proxy_port: Option<u16>,

    /// Address the proxy binds to
    #[arg(long)]
    pub bind: Option<String>,

    /// Directory where documentation is written (must exist)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Documentation format
    #[arg(long, value_enum)]
    pub doc_format: Option<DocFormat>,

    /// What unregister calls do to the documented interface
    #[arg(long, value_enum)]
    pub unregister: Option<UnregisterPolicy>,

    /// Seconds to wait for the master before failing a forwarded call
    #[arg(long)]
    pub upstream_timeout: Option<u64>,

    /// Config file (defaults to ./.autodoc-proxy.toml, then the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Start even if the master does not answer getPid
    #[arg(long)]
    pub skip_master_check: bool,
}

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// URI of the real master
    #[arg(long)]
    pub master_uri: Option<String>,

    /// Port the proxy listens on
    #[arg(long)]
    pub proxy_port: Option<u16>,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}
