use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use vigil_core::api::RiskProfile;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileArg {
    Conservative,
    Balanced,
    Aggressive,
}

impl From<ProfileArg> for RiskProfile {
    fn from(p: ProfileArg) -> Self {
        match p {
            ProfileArg::Conservative => RiskProfile::Conservative,
            ProfileArg::Balanced => RiskProfile::Balanced,
            ProfileArg::Aggressive => RiskProfile::Aggressive,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "vigil", version, about = "Research planning and safety-gated decisions")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file; defaults to ~/.vigil/config.toml, then ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanTarget {
    #[arg(long, default_value = "BTC/USDT")]
    pub symbol: String,

    /// Risk profile; the config's planner.default_profile when unset.
    #[arg(long, value_enum)]
    pub profile: Option<ProfileArg>,

    #[arg(long)]
    pub budget_cap: Option<f64>,

    #[arg(long)]
    pub max_parallel: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub no_optional: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub target: PlanTarget,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: PlanTarget,

    /// Safety state file, read before the run and written after it.
    #[arg(long)]
    pub state: Option<PathBuf>,

    /// Realized outcome to feed the safety enforcer before the run.
    /// Can be specified multiple times.
    #[arg(long = "loss", action = clap::ArgAction::Append, allow_hyphen_values = true)]
    pub outcomes: Vec<f64>,

    /// Expected and actual price, as EXPECTED:ACTUAL.
    #[arg(long)]
    pub deviation: Option<String>,

    /// Aggregate sentiment score in [-1, 1].
    #[arg(long, allow_hyphen_values = true)]
    pub sentiment: Option<f64>,

    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct SafetyArgs {
    /// Safety state file
    #[arg(long)]
    pub state: PathBuf,

    /// Resume a paused enforcer with this reason.
    #[arg(long)]
    pub resume: Option<String>,

    /// Resume even with recent violations on record.
    #[arg(long, default_value_t = false, requires = "resume")]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the research plan for a symbol without running it.
    Plan(PlanArgs),
    /// Plan, research, validate, evaluate and decide.
    Run(RunArgs),
    /// Inspect or resume a persisted safety state.
    Safety(SafetyArgs),
}

/// Parse `EXPECTED:ACTUAL`.
pub fn parse_deviation(s: &str) -> anyhow::Result<(f64, f64)> {
    let (expected, actual) = s
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("deviation must be EXPECTED:ACTUAL, got '{s}'"))?;
    Ok((expected.trim().parse()?, actual.trim().parse()?))
}
