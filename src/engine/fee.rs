//! 费率仲裁：把各扩展的费率投票合并为单一费率。
//!
//! 解析顺序（先命中者胜出）：
//! 1. `GovernanceOnly` 且设置了治理费率 → 治理费率；
//! 2. 设置了场所专属费率 → 场所专属费率；
//! 3. 按所选方法计算，若没有可用投票则落到第 4 步；
//! 4. 默认费率。
//!
//! 费率为 0 的投票表示“无偏好”，所有方法都会忽略它。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::error::{OrchestratorError, OrchestratorResult};
use super::types::Address;

/// 费率上限：1_000_000 = 100%。
pub const MAX_FEE: u32 = 1_000_000;

pub fn validate_fee(fee: u32) -> OrchestratorResult<u32> {
    if fee > MAX_FEE {
        return Err(OrchestratorError::InvalidFee { fee, max: MAX_FEE });
    }
    Ok(fee)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeCalculationMethod {
    #[default]
    WeightedAverage,
    Mean,
    Median,
    FirstOverride,
    LastOverride,
    MinFee,
    MaxFee,
    GovernanceOnly,
}

impl FeeCalculationMethod {
    pub const ALL: [FeeCalculationMethod; 8] = [
        FeeCalculationMethod::WeightedAverage,
        FeeCalculationMethod::Mean,
        FeeCalculationMethod::Median,
        FeeCalculationMethod::FirstOverride,
        FeeCalculationMethod::LastOverride,
        FeeCalculationMethod::MinFee,
        FeeCalculationMethod::MaxFee,
        FeeCalculationMethod::GovernanceOnly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FeeCalculationMethod::WeightedAverage => "weighted_average",
            FeeCalculationMethod::Mean => "mean",
            FeeCalculationMethod::Median => "median",
            FeeCalculationMethod::FirstOverride => "first_override",
            FeeCalculationMethod::LastOverride => "last_override",
            FeeCalculationMethod::MinFee => "min_fee",
            FeeCalculationMethod::MaxFee => "max_fee",
            FeeCalculationMethod::GovernanceOnly => "governance_only",
        }
    }
}

impl fmt::Display for FeeCalculationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeeCalculationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        FeeCalculationMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == normalized)
            .ok_or_else(|| format!("未知费率计算方法: {s}"))
    }
}

/// 单个场所的费率策略。写入时校验，读取时不再校验。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeeConfiguration {
    default_fee: u32,
    governance_fee: Option<u32>,
    venue_specific_fee: Option<u32>,
    method: FeeCalculationMethod,
}

impl FeeConfiguration {
    pub fn new(default_fee: u32, method: FeeCalculationMethod) -> OrchestratorResult<Self> {
        Ok(Self {
            default_fee: validate_fee(default_fee)?,
            governance_fee: None,
            venue_specific_fee: None,
            method,
        })
    }

    pub fn default_fee(&self) -> u32 {
        self.default_fee
    }

    pub fn governance_fee(&self) -> Option<u32> {
        self.governance_fee
    }

    pub fn venue_specific_fee(&self) -> Option<u32> {
        self.venue_specific_fee
    }

    pub fn method(&self) -> FeeCalculationMethod {
        self.method
    }

    pub fn set_default_fee(&mut self, fee: u32) -> OrchestratorResult<()> {
        self.default_fee = validate_fee(fee)?;
        Ok(())
    }

    pub fn set_governance_fee(&mut self, fee: Option<u32>) -> OrchestratorResult<()> {
        self.governance_fee = fee.map(validate_fee).transpose()?;
        Ok(())
    }

    pub fn set_venue_specific_fee(&mut self, fee: Option<u32>) -> OrchestratorResult<()> {
        self.venue_specific_fee = fee.map(validate_fee).transpose()?;
        Ok(())
    }

    pub fn set_method(&mut self, method: FeeCalculationMethod) {
        self.method = method;
    }
}

/// 单个扩展的费率投票。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeVote {
    pub extension: Address,
    pub fee: u32,
    pub weight: u64,
}

impl FeeVote {
    pub fn new(extension: Address, fee: u32, weight: u64) -> OrchestratorResult<Self> {
        Ok(Self {
            extension,
            fee: validate_fee(fee)?,
            weight,
        })
    }

    pub fn abstains(&self) -> bool {
        self.fee == 0
    }
}

/// 费率仲裁结果，附带命中的来源，方便日志与审计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub fee: u32,
    pub source: FeeSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    Governance,
    VenueSpecific,
    Method(FeeCalculationMethod),
    Default,
}

pub fn resolve(votes: &[FeeVote], config: &FeeConfiguration) -> OrchestratorResult<Resolution> {
    if config.method == FeeCalculationMethod::GovernanceOnly {
        if let Some(fee) = config.governance_fee {
            return Ok(Resolution {
                fee,
                source: FeeSource::Governance,
            });
        }
    }

    if let Some(fee) = config.venue_specific_fee {
        return Ok(Resolution {
            fee,
            source: FeeSource::VenueSpecific,
        });
    }

    let active: SmallVec<[&FeeVote; 8]> = votes.iter().filter(|vote| !vote.abstains()).collect();

    let computed = match config.method {
        FeeCalculationMethod::WeightedAverage => weighted_average(&active)?,
        FeeCalculationMethod::Mean => mean(&active)?,
        FeeCalculationMethod::Median => median(&active),
        FeeCalculationMethod::FirstOverride => active.first().map(|vote| vote.fee),
        FeeCalculationMethod::LastOverride => active.last().map(|vote| vote.fee),
        FeeCalculationMethod::MinFee => active.iter().map(|vote| vote.fee).min(),
        FeeCalculationMethod::MaxFee => active.iter().map(|vote| vote.fee).max(),
        FeeCalculationMethod::GovernanceOnly => None,
    };

    let resolution = match computed {
        Some(fee) => Resolution {
            fee: validate_fee(fee)?,
            source: FeeSource::Method(config.method),
        },
        None => Resolution {
            fee: config.default_fee,
            source: FeeSource::Default,
        },
    };
    Ok(resolution)
}

fn weighted_average(votes: &[&FeeVote]) -> OrchestratorResult<Option<u32>> {
    let mut weighted_sum: u128 = 0;
    let mut total_weight: u128 = 0;
    for vote in votes {
        let term = u128::from(vote.fee)
            .checked_mul(u128::from(vote.weight))
            .ok_or(OrchestratorError::ArithmeticOverflow("fee.weighted_term"))?;
        weighted_sum = weighted_sum
            .checked_add(term)
            .ok_or(OrchestratorError::ArithmeticOverflow("fee.weighted_sum"))?;
        total_weight = total_weight
            .checked_add(u128::from(vote.weight))
            .ok_or(OrchestratorError::ArithmeticOverflow("fee.total_weight"))?;
    }
    if total_weight == 0 {
        return Ok(None);
    }
    narrow(weighted_sum / total_weight).map(Some)
}

fn mean(votes: &[&FeeVote]) -> OrchestratorResult<Option<u32>> {
    if votes.is_empty() {
        return Ok(None);
    }
    let sum = votes.iter().try_fold(0u128, |acc, vote| {
        acc.checked_add(u128::from(vote.fee))
            .ok_or(OrchestratorError::ArithmeticOverflow("fee.sum"))
    })?;
    narrow(sum / votes.len() as u128).map(Some)
}

/// 偶数个投票时取两个中位数中较小者。
fn median(votes: &[&FeeVote]) -> Option<u32> {
    if votes.is_empty() {
        return None;
    }
    let mut fees: SmallVec<[u32; 8]> = votes.iter().map(|vote| vote.fee).collect();
    fees.sort_unstable();
    let mid = fees.len() / 2;
    if fees.len() % 2 == 1 {
        Some(fees[mid])
    } else {
        Some(fees[mid - 1])
    }
}

fn narrow(value: u128) -> OrchestratorResult<u32> {
    u32::try_from(value).map_err(|_| OrchestratorError::ArithmeticOverflow("fee.narrow"))
}
