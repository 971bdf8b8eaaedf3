use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::types::AppConfig;
use crate::error::ConfigError;
use crate::planner::RiskProfile;

/// Get the default vigil data directory: ~/.vigil
pub fn get_vigil_data_dir() -> Result<PathBuf, ConfigError> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| ConfigError::NoHomeDir)?;
    Ok(PathBuf::from(home).join(".vigil"))
}

pub fn load_default() -> Result<AppConfig, ConfigError> {
    // Priority 1: ~/.vigil/config.toml (highest)
    let vigil_dir = get_vigil_data_dir()?;
    let vigil_config = vigil_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg: AppConfig = if vigil_config.exists() {
        read_config(&vigil_config)?
    } else if local_config.exists() {
        read_config(local_config)?
    } else {
        AppConfig::default()
    };

    if cfg
        .logging
        .directory
        .as_deref()
        .map_or(true, |s| s.trim().is_empty())
    {
        cfg.logging.directory = Some(vigil_dir.join("logs").to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;

    cfg.validate()?;
    Ok(cfg)
}

/// Load an explicit config file. Environment overrides still apply.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<AppConfig, ConfigError> {
    let mut cfg = read_config(path.as_ref())?;
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let s = std::fs::read_to_string(path)?;
    Ok(toml::from_str::<AppConfig>(&s)?)
}

pub(crate) fn apply_env_overrides<F>(cfg: &mut AppConfig, get: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("VIGIL_LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = var("VIGIL_PROFILE") {
        cfg.planner.default_profile =
            RiskProfile::from_str(&v).map_err(|message| ConfigError::Invalid {
                field: "planner.default_profile",
                message,
            })?;
    }
    if let Some(v) = var("VIGIL_BUDGET_CAP") {
        cfg.planner.budget_cap = Some(parse_env("planner.budget_cap", &v)?);
    }
    if let Some(v) = var("VIGIL_MAX_IN_FLIGHT") {
        cfg.executor.max_in_flight = parse_env("executor.max_in_flight", &v)?;
    }
    if let Some(v) = var("VIGIL_MAX_ITERATIONS") {
        cfg.pipeline.max_iterations = parse_env("pipeline.max_iterations", &v)?;
    }
    if let Some(v) = var("VIGIL_MAX_DAILY_LOSS") {
        cfg.safety.max_daily_loss = parse_env("safety.max_daily_loss", &v)?;
    }
    Ok(())
}

fn parse_env<T>(field: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        field,
        message: format!("'{raw}': {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("VIGIL_PROFILE", "aggressive"),
            ("VIGIL_MAX_IN_FLIGHT", "8"),
            ("VIGIL_BUDGET_CAP", "0.5"),
            ("VIGIL_LOG_LEVEL", "   "),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.planner.default_profile, RiskProfile::Aggressive);
        assert_eq!(cfg.executor.max_in_flight, 8);
        assert_eq!(cfg.planner.budget_cap, Some(0.5));
        // blank values are ignored
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_bad_env_value_is_invalid() {
        let mut cfg = AppConfig::default();
        let err = apply_env_overrides(&mut cfg, |k| {
            (k == "VIGIL_MAX_ITERATIONS").then(|| "three".to_string())
        })
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "pipeline.max_iterations",
                ..
            }
        ));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[executor]\nmax_in_flight = 2\n\n[safety]\nmax_consecutive_losses = 5"
        )
        .unwrap();

        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.safety.max_consecutive_losses, 5);
    }

    #[test]
    fn test_load_from_path_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[pipeline]\nmax_iterations = 0").unwrap();
        assert!(matches!(
            load_from_path(file.path()),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_load_from_path_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[executor\nmax_in_flight = 2").unwrap();
        assert!(matches!(
            load_from_path(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }
}
