mod commands;
mod logging;
mod progress;
mod state_file;

use clap::Parser;
use vigil_core::api::{
    load_default, load_from_path, ConfigError, ExecutorError, PipelineError, PlanningError,
    SafetyError,
};

use commands::cli::{Args, Commands};

#[tokio::main]
async fn main() {
    let code = real_main().await.unwrap_or_else(|e| {
        eprintln!("error: {e:#}");
        exit_code_for_error(&e)
    });
    std::process::exit(code);
}

async fn real_main() -> anyhow::Result<i32> {
    let args = Args::parse();
    let cfg = match args.config.as_deref() {
        Some(path) => load_from_path(path)?,
        None => load_default()?,
    };
    logging::init(&cfg.logging)?;

    let format = args.format;
    match args.command {
        Commands::Plan(a) => commands::plan(&cfg, a, format),
        Commands::Run(a) => commands::run(&cfg, a, format).await,
        Commands::Safety(a) => commands::safety(&cfg, a, format).await,
    }
}

/// Stable code of the first known error in the chain, else 1.
fn exit_code_for_error(e: &anyhow::Error) -> i32 {
    let code = e
        .chain()
        .find_map(|cause| {
            if let Some(err) = cause.downcast_ref::<PipelineError>() {
                Some(err.error_code())
            } else if let Some(err) = cause.downcast_ref::<PlanningError>() {
                Some(err.error_code())
            } else if let Some(err) = cause.downcast_ref::<ExecutorError>() {
                Some(err.error_code())
            } else if let Some(err) = cause.downcast_ref::<SafetyError>() {
                Some(err.error_code())
            } else {
                cause.downcast_ref::<ConfigError>().map(ConfigError::error_code)
            }
        });
    code.map_or(1, |c| i32::from(c.as_u16()))
}
