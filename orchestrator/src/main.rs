use clap::Parser as _;
use color_eyre::eyre::WrapErr;
use dotenvy::dotenv;
use map_orchestrator::cli::{CleanupCmd, Cli, Commands, ConfigArgs, RunCmd};
use map_orchestrator::config::{ExecutionOverrides, PipelineConfig, PipelineConfigVersioned};
use map_orchestrator::setup::{load_iterdata, setup_pipeline};
use map_orchestrator::utils::logging::init_logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenv().ok();
    init_logging()?;
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { run_command } => {
            info!("Executing run command with args: {:?}", run_command);
            run_map_phase(run_command).await
        }
        Commands::Cleanup { cleanup_command } => {
            info!("Executing cleanup command with args: {:?}", cleanup_command);
            run_cleanup(cleanup_command).await
        }
    }
}

fn load_config(args: &ConfigArgs) -> color_eyre::Result<PipelineConfig> {
    let config = PipelineConfigVersioned::from_yaml_file(&args.config_file)
        .map_err(|e| color_eyre::eyre::eyre!("{:#}", e))?
        .into_canonical();
    Ok(config)
}

async fn run_map_phase(run_cmd: &RunCmd) -> color_eyre::Result<()> {
    let config = load_config(&run_cmd.config)?;
    let overrides =
        ExecutionOverrides { execution_name: run_cmd.config.execution_name.clone(), skip_map: run_cmd.skip_map };
    let iterdata = load_iterdata(&run_cmd.iterdata).map_err(|e| color_eyre::eyre::eyre!("{:#}", e))?;

    let (orchestrator, ctx) = setup_pipeline(&config, &overrides).await.wrap_err("Failed to set up the pipeline")?;
    info!(execution_id = %ctx.execution_id, tasks = iterdata.len(), "Starting map phase");

    match orchestrator.run_pipeline(&ctx, iterdata).await {
        Ok(elapsed) => {
            info!(execution_id = %ctx.execution_id, elapsed_secs = elapsed.as_secs_f64(), "Map phase completed");
            Ok(())
        }
        Err(e) => {
            let stage = e.stage().map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
            error!(execution_id = %ctx.execution_id, stage = %stage, error = %e, error_chain = ?e, "Map phase failed");
            Err(e).wrap_err_with(|| format!("Map phase of execution {} failed", ctx.execution_id))
        }
    }
}

async fn run_cleanup(cleanup_cmd: &CleanupCmd) -> color_eyre::Result<()> {
    let config = load_config(&cleanup_cmd.config)?;
    let overrides = ExecutionOverrides { execution_name: cleanup_cmd.config.execution_name.clone(), skip_map: false };

    let (orchestrator, ctx) = setup_pipeline(&config, &overrides).await.wrap_err("Failed to set up the pipeline")?;
    let report = orchestrator.cleanup(&ctx).await;
    if !report.is_clean() {
        error!(execution_id = %ctx.execution_id, failures = report.failures, "Cleanup left some artifacts behind");
    }
    Ok(())
}
