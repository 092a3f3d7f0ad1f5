pub mod launch;
pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;

use self::types as cfg;

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_timezone_offset_hours() -> i8 {
    0
}

pub(crate) fn default_prometheus_listen() -> String {
    "0.0.0.0:9898".to_string()
}

pub(crate) fn default_fee() -> u32 {
    3_000
}

pub(crate) fn default_journal_capacity() -> usize {
    crate::engine::DEFAULT_JOURNAL_CAPACITY
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
            profile: cfg::LoggingProfile::default(),
            timezone_offset_hours: default_timezone_offset_hours(),
        }
    }
}

impl Default for cfg::PrometheusConfig {
    fn default() -> Self {
        Self {
            enable: false,
            listen: default_prometheus_listen(),
        }
    }
}

impl Default for cfg::OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: Default::default(),
            self_address: None,
            upstream: None,
            governance: None,
            registry_manager: None,
            owner: None,
            default_fee: default_fee(),
            default_method: Default::default(),
            journal_capacity: default_journal_capacity(),
        }
    }
}
