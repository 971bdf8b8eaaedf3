mod load;
mod types;

pub use load::{get_vigil_data_dir, load_default, load_from_path};
pub use types::{
    AppConfig, ExecutorConfig, LoggingConfig, OptimizerConfig, PipelineConfig, PlannerConfig,
    RetryConfig, SafetyConfig,
};
