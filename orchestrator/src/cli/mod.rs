use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "map-orchestrator",
    about = "Map phase orchestrator - checkpoint resumable alignment, index correction and second alignment",
    long_about = "Runs the three stages of the map phase on a task backend. Every submitted stage is checkpointed, \
    so rerunning with the same execution name reattaches to submitted work instead of starting it again.",
    after_help = "Examples:\n  \
    map-orchestrator run --config pipeline.yaml --iterdata iterdata.json\n  \
    map-orchestrator run --config pipeline.yaml --iterdata iterdata.json --execution-name E2\n  \
    map-orchestrator cleanup --config pipeline.yaml --execution-name E1"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the map phase
    Run {
        #[command(flatten)]
        run_command: RunCmd,
    },
    /// Delete the intermediate artifacts and checkpoints of an execution
    Cleanup {
        #[command(flatten)]
        cleanup_command: CleanupCmd,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Path to the YAML pipeline configuration
    #[arg(long = "config", short = 'c', env = "MAP_ORCHESTRATOR_CONFIG")]
    pub config_file: PathBuf,

    /// Overrides `execution.name` from the config file
    #[arg(long, env = "MAP_ORCHESTRATOR_EXECUTION_NAME")]
    pub execution_name: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct RunCmd {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// JSON array of stage 1 inputs produced by preprocessing
    #[arg(long, env = "MAP_ORCHESTRATOR_ITERDATA")]
    pub iterdata: PathBuf,

    /// Skip the map phase and only reuse existing output
    #[arg(long, env = "MAP_ORCHESTRATOR_SKIP_MAP")]
    pub skip_map: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CleanupCmd {
    #[command(flatten)]
    pub config: ConfigArgs,
}
