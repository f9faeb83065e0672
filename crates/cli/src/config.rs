use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use spine_core::config::load_dotenv;
use spine_core::Config;

/// Load configuration from a TOML file when given, otherwise from the
/// environment (after reading `.env`). The result is always validated.
pub fn load(path: Option<&Path>, profile: Option<&str>) -> Result<Config> {
    let mut config = match path {
        Some(path) => {
            debug!(config_path = %path.display(), "Loading config file");
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            from_toml(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => {
            load_dotenv();
            match profile {
                Some(p) => Config::for_profile(p),
                None => Config::from_env(),
            }
        }
    };
    if let (Some(_), Some(p)) = (path, profile) {
        config.profile = p.to_uppercase();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn from_toml(content: &str) -> Result<Config> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spine_core::ConsensusStrategy;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = from_toml(
            r#"
            [clustering]
            consensus = "greedy"
            seed = 9

            [cache]
            capacity = 16
            "#,
        )
        .unwrap();
        assert_eq!(config.clustering.consensus, ConsensusStrategy::Greedy);
        assert_eq!(config.clustering.seed, Some(9));
        assert_eq!(config.clustering.max_iterations, 100);
        assert_eq!(config.cache.capacity, 16);
        assert_eq!(config.forecast.smoothing_alpha, 0.3);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(from_toml("[clustering]\nconsensus = \"vote\"\n").is_err());
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed = from_toml(&toml_str).unwrap();
        assert_eq!(parsed.cache.capacity, config.cache.capacity);
        assert_eq!(parsed.forecast.lstm_window, config.forecast.lstm_window);
    }
}
