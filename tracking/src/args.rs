use std::path::PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tracking", about = "drift-compensated scan sequencer")]
pub struct TrackingArgs {
    #[command(subcommand)]
    pub action:Action,
}

#[derive(Subcommand)]
pub enum Action {
    /// write a default session config to the given path
    NewConfig(NewConfigArgs),
    /// expand the sweep plan from a config and print it
    ShowPlan(ShowPlanArgs),
    /// run a tracking session
    Run(RunArgs),
}

#[derive(Args)]
pub struct NewConfigArgs {
    /// output path, written with a .toml extension
    pub path:PathBuf,
}

#[derive(Args)]
pub struct ShowPlanArgs {
    /// session config (.toml)
    pub config:PathBuf,
}

#[derive(Args)]
pub struct RunArgs {
    /// session config (.toml)
    pub config:PathBuf,
    /// drive the built-in simulated instrument instead of real hardware
    #[arg(long)]
    pub mock:bool,
    /// write a session summary json here when the session ends
    #[arg(long)]
    pub summary:Option<PathBuf>,
}
