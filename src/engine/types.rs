use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 32 字节身份标识，文本形式为 base58。扩展、角色持有者与上游调用方共用。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; 32]);

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// 测试用的唯一地址，按进程内计数器递增生成。
    #[cfg(test)]
    pub fn new_unique() -> Self {
        Self(unique_bytes())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseIdError {
    #[error("base58 解码失败: {0}")]
    Base58(String),
    #[error("长度非法: 期望 32 字节，实际 {0} 字节")]
    Length(usize),
}

fn decode_32(raw: &str) -> Result<[u8; 32], ParseIdError> {
    let bytes = bs58::decode(raw.trim())
        .into_vec()
        .map_err(|err| ParseIdError::Base58(err.to_string()))?;
    let len = bytes.len();
    bytes.try_into().map_err(|_| ParseIdError::Length(len))
}

#[cfg(test)]
fn unique_bytes() -> [u8; 32] {
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT: AtomicU64 = AtomicU64::new(1);
    let seq = NEXT.fetch_add(1, Ordering::Relaxed);
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&seq.to_be_bytes());
    bytes[31] = 0xA5;
    bytes
}

impl FromStr for Address {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 场所标识（外部创建，不可变）。
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VenueId([u8; 32]);

impl VenueId {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.0
    }

    #[cfg(test)]
    pub fn new_unique() -> Self {
        Self(unique_bytes())
    }
}

impl FromStr for VenueId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_32(s).map(Self)
    }
}

impl fmt::Display for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for VenueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VenueId({self})")
    }
}

impl Serialize for VenueId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// 注册表变更模式。
///
/// - `Immutable`：场所只能整体注册一次，之后注册表不可再改；
/// - `Permissioned`：由注册表管理员从白名单中增删扩展。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryMode {
    Immutable,
    #[default]
    Permissioned,
}

impl fmt::Display for RegistryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryMode::Immutable => f.write_str("immutable"),
            RegistryMode::Permissioned => f.write_str("permissioned"),
        }
    }
}

/// 生命周期事件，before/after 各五类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    BeforeInitialize,
    AfterInitialize,
    BeforeAddLiquidity,
    AfterAddLiquidity,
    BeforeRemoveLiquidity,
    AfterRemoveLiquidity,
    BeforeSwap,
    AfterSwap,
    BeforeDonate,
    AfterDonate,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 10] = [
        LifecycleEvent::BeforeInitialize,
        LifecycleEvent::AfterInitialize,
        LifecycleEvent::BeforeAddLiquidity,
        LifecycleEvent::AfterAddLiquidity,
        LifecycleEvent::BeforeRemoveLiquidity,
        LifecycleEvent::AfterRemoveLiquidity,
        LifecycleEvent::BeforeSwap,
        LifecycleEvent::AfterSwap,
        LifecycleEvent::BeforeDonate,
        LifecycleEvent::AfterDonate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::BeforeInitialize => "before_initialize",
            LifecycleEvent::AfterInitialize => "after_initialize",
            LifecycleEvent::BeforeAddLiquidity => "before_add_liquidity",
            LifecycleEvent::AfterAddLiquidity => "after_add_liquidity",
            LifecycleEvent::BeforeRemoveLiquidity => "before_remove_liquidity",
            LifecycleEvent::AfterRemoveLiquidity => "after_remove_liquidity",
            LifecycleEvent::BeforeSwap => "before_swap",
            LifecycleEvent::AfterSwap => "after_swap",
            LifecycleEvent::BeforeDonate => "before_donate",
            LifecycleEvent::AfterDonate => "after_donate",
        }
    }

    /// 扩展返回值中是否携带 Delta。
    pub fn carries_delta(self) -> bool {
        matches!(
            self,
            LifecycleEvent::AfterAddLiquidity
                | LifecycleEvent::AfterRemoveLiquidity
                | LifecycleEvent::BeforeSwap
                | LifecycleEvent::AfterSwap
        )
    }

    /// 只有 before_swap 会收集费率投票。
    pub fn carries_fee(self) -> bool {
        matches!(self, LifecycleEvent::BeforeSwap)
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        LifecycleEvent::ALL
            .into_iter()
            .find(|event| event.as_str() == normalized)
            .ok_or_else(|| format!("未知生命周期事件: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitializeParams {
    pub sqrt_price_x96: u128,
    pub tick: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModifyLiquidityParams {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity_delta: i128,
    pub salt: [u8; 32],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapParams {
    pub zero_for_one: bool,
    /// 负数为 exact-in，正数为 exact-out。
    pub amount_specified: i128,
    pub sqrt_price_limit_x96: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonateParams {
    pub amount0: u128,
    pub amount1: u128,
}

/// 一次生命周期调用的完整入参；原样转发给每个扩展。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext<'a, P> {
    pub venue: VenueId,
    pub sender: Address,
    pub params: P,
    pub hook_data: &'a [u8],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_roundtrips_through_base58() {
        let address = Address::new_unique();
        let parsed: Address = address.to_string().parse().expect("parse address");
        assert_eq!(parsed, address);
    }

    #[test]
    fn address_rejects_wrong_length() {
        let short = bs58::encode([7u8; 20]).into_string();
        assert_eq!(short.parse::<Address>(), Err(ParseIdError::Length(20)));
    }

    #[test]
    fn lifecycle_event_parses_dashed_names() {
        assert_eq!(
            "before-swap".parse::<LifecycleEvent>(),
            Ok(LifecycleEvent::BeforeSwap)
        );
        assert!("after_mint".parse::<LifecycleEvent>().is_err());
    }

    #[test]
    fn only_before_swap_carries_fee() {
        let fee_events: Vec<_> = LifecycleEvent::ALL
            .into_iter()
            .filter(|event| event.carries_fee())
            .collect();
        assert_eq!(fee_events, vec![LifecycleEvent::BeforeSwap]);
    }
}
