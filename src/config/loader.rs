use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::AppConfig;

pub const DEFAULT_CONFIG_PATHS: &[&str] = &["hookmux.toml", "config/hookmux.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// 显式路径优先；否则依次尝试默认路径，全部缺失时返回默认配置。
pub fn load_config(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    let candidate_paths = match path {
        Some(p) => vec![p],
        None => DEFAULT_CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .collect::<Vec<PathBuf>>(),
    };

    for candidate in candidate_paths {
        if let Some(config) = try_load_file(&candidate)? {
            return Ok(config);
        }
    }

    Ok(AppConfig::default())
}

fn try_load_file(path: &Path) -> Result<Option<AppConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: AppConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::LoggingProfile;
    use crate::engine::{Address, FeeCalculationMethod, LifecycleEvent, RegistryMode};

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write config");
        file
    }

    #[test]
    fn missing_explicit_path_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = load_config(Some(dir.path().join("absent.toml"))).expect("load");
        assert_eq!(config.global.logging.level, "info");
        assert_eq!(config.orchestrator.mode, RegistryMode::Permissioned);
        assert_eq!(config.orchestrator.default_fee, 3_000);
        assert!(config.venues.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let ext_a = Address::new_unique();
        let ext_b = Address::new_unique();
        let upstream = Address::new_unique();
        let venue = "7ZrnR8hGsYkVabAhmTDZyNAnwtPPQkU2RkhtF9gdKsLp";
        let file = write_config(&format!(
            r#"
[global.logging]
level = "debug"
profile = "verbose"
timezone_offset_hours = 8

[global.prometheus]
enable = true
listen = "127.0.0.1:9000"

[orchestrator]
mode = "immutable"
upstream = "{upstream}"
default_method = "median"
journal_capacity = 16

[[extensions]]
address = "{ext_a}"
fee = 2500
weight = 3
before_swap = {{ specified = -5, unspecified = 7 }}
fail_on = ["after-donate", "before_initialize"]

[[extensions]]
address = "{ext_b}"
after_swap_unspecified = -12

[[venues]]
id = "{venue}"
extensions = ["{ext_b}", "{ext_a}"]
method = "last_override"
venue_specific_fee = 100

[venues.weights]
"{ext_b}" = 9
"#
        ));

        let config = load_config(Some(file.path().to_path_buf())).expect("load");
        assert_eq!(config.global.logging.level, "debug");
        assert_eq!(config.global.logging.profile, LoggingProfile::Verbose);
        assert_eq!(config.global.logging.timezone_offset_hours, 8);
        assert!(config.global.prometheus.enable);
        assert_eq!(config.orchestrator.mode, RegistryMode::Immutable);
        assert_eq!(config.orchestrator.upstream, Some(upstream));
        assert_eq!(config.orchestrator.governance, None);
        assert_eq!(config.orchestrator.default_method, FeeCalculationMethod::Median);
        assert_eq!(config.orchestrator.journal_capacity, 16);

        let first = &config.extensions[0];
        assert_eq!(first.address, ext_a);
        assert_eq!(first.weight, Some(3));
        assert_eq!((first.before_swap.specified, first.before_swap.unspecified), (-5, 7));
        assert_eq!(
            first.fail_on,
            vec![LifecycleEvent::AfterDonate, LifecycleEvent::BeforeInitialize]
        );
        assert_eq!(config.extensions[1].after_swap_unspecified, -12);

        let venue_cfg = &config.venues[0];
        assert_eq!(venue_cfg.id.to_string(), venue);
        assert_eq!(venue_cfg.extensions, vec![ext_b, ext_a]);
        assert_eq!(venue_cfg.method, Some(FeeCalculationMethod::LastOverride));
        assert_eq!(venue_cfg.venue_specific_fee, Some(100));
        assert_eq!(venue_cfg.weights.get(&ext_b), Some(&9));
    }

    #[test]
    fn malformed_address_is_a_parse_error() {
        let file = write_config("[orchestrator]\nupstream = \"not-base58-0OIl\"\n");
        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn unknown_fee_method_is_a_parse_error() {
        let file = write_config(
            "[[venues]]\nid = \"7ZrnR8hGsYkVabAhmTDZyNAnwtPPQkU2RkhtF9gdKsLp\"\nmethod = \"mode\"\n",
        );
        let err = load_config(Some(file.path().to_path_buf())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
