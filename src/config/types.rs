use std::collections::BTreeMap;

use serde::Deserialize;
use serde_with::{DisplayFromStr, serde_as};

use crate::engine::{Address, FeeCalculationMethod, LifecycleEvent, RegistryMode, VenueId};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub extensions: Vec<ExtensionConfig>,
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingProfile {
    #[default]
    Lean,
    Verbose,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub profile: LoggingProfile,
    #[serde(default = "super::default_timezone_offset_hours")]
    pub timezone_offset_hours: i8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrometheusConfig {
    #[serde(default)]
    pub enable: bool,
    #[serde(default = "super::default_prometheus_listen")]
    pub listen: String,
}

/// `[orchestrator]`：部署参数与角色持有者。地址缺省时在装配阶段报错。
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub mode: RegistryMode,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub self_address: Option<Address>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub upstream: Option<Address>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub governance: Option<Address>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub registry_manager: Option<Address>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub owner: Option<Address>,
    #[serde(default = "super::default_fee")]
    pub default_fee: u32,
    #[serde(default)]
    pub default_method: FeeCalculationMethod,
    #[serde(default = "super::default_journal_capacity")]
    pub journal_capacity: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DeltaConfig {
    #[serde(default)]
    pub specified: i64,
    #[serde(default)]
    pub unspecified: i64,
}

/// `[[extensions]]`：返回固定结果的扩展。
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ExtensionConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub address: Address,
    /// before_swap 的建议费率，0 表示无偏好。
    #[serde(default)]
    pub fee: u32,
    /// 挂载到场所后的默认权重；场所的 `weights` 可再覆盖。
    #[serde(default)]
    pub weight: Option<u64>,
    #[serde(default)]
    pub before_swap: DeltaConfig,
    #[serde(default)]
    pub after_swap_unspecified: i64,
    #[serde(default)]
    pub after_add_liquidity: DeltaConfig,
    #[serde(default)]
    pub after_remove_liquidity: DeltaConfig,
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    pub fail_on: Vec<LifecycleEvent>,
}

/// `[[venues]]`：场所注册表与费率配置。
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct VenueConfig {
    #[serde_as(as = "DisplayFromStr")]
    pub id: VenueId,
    /// 按执行顺序排列的扩展地址，须在 `[[extensions]]` 中声明。
    #[serde_as(as = "Vec<DisplayFromStr>")]
    #[serde(default)]
    pub extensions: Vec<Address>,
    #[serde(default)]
    pub method: Option<FeeCalculationMethod>,
    #[serde(default)]
    pub default_fee: Option<u32>,
    #[serde(default)]
    pub governance_fee: Option<u32>,
    #[serde(default)]
    pub venue_specific_fee: Option<u32>,
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    #[serde(default)]
    pub weights: BTreeMap<Address, u64>,
}
