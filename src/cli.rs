use clap::Parser;
use std::path::PathBuf;

use crate::pipeline::ProvisionRequest;

#[derive(Parser, Debug)]
#[command(
    name = "vmagent",
    about = "Set up Buildkite agents using Packer-built Vagrant virtual machines"
)]
pub struct Cli {
    /// Buildkite agent's token
    #[arg(long)]
    pub token: String,

    /// Number of Buildkite agents to set up
    #[arg(long = "vm_number", value_parser = clap::value_parser!(u32).range(1..))]
    pub vm_number: u32,

    /// Path to the service account key for your Google API credentials
    #[arg(long = "google_credential")]
    pub google_credential: String,

    /// Name of the Vagrant box
    #[arg(long, default_value = "buildkite_agent")]
    pub name: String,

    /// Memory of each agent VM (in megabytes)
    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..))]
    pub memory: u32,

    /// Number of CPUs for each agent VM
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub cpus: u32,

    /// Path to tool config file [default: vmagent.toml, if present]
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Show debug logs and keep tool output after each step
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show step spinners
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Config file to load, and whether it may be absent. Only the
    /// implicit default is optional; an explicit `--config` must exist.
    pub fn config_source(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), false),
            None => (PathBuf::from(crate::config::DEFAULT_CONFIG_FILE), true),
        }
    }

    pub fn request(&self) -> ProvisionRequest {
        ProvisionRequest {
            token: self.token.clone(),
            vm_number: self.vm_number,
            google_credential: self.google_credential.clone(),
            name: self.name.clone(),
            memory: self.memory,
            cpus: self.cpus,
        }
    }
}
