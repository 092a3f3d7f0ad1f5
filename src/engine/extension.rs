use std::fmt;

use anyhow::Result;
use serde::Serialize;

use super::aggregator::Delta;
use super::types::{
    Address, DonateParams, EventContext, InitializeParams, ModifyLiquidityParams, SwapParams,
};

/// 基础操作结算后的结果，随 after_* 事件一并下发。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settled<P> {
    pub params: P,
    pub balance_delta: Delta,
}

/// before_swap 的返回：额外 Delta 与建议费率（0 表示无偏好）。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SwapVote {
    pub delta: Delta,
    pub fee: u32,
}

impl SwapVote {
    pub const ABSTAIN: SwapVote = SwapVote {
        delta: Delta::ZERO,
        fee: 0,
    };
}

/// 挂载到场所上的扩展。每个生命周期事件对应一个方法；
/// 未覆盖的方法直接确认，返回恒等结果。
///
/// 扩展可以在回调中再次调用编排器：只读查询会正常返回，
/// 变更类入口会被重入保护拒绝。
pub trait Extension: Send + Sync {
    fn address(&self) -> Address;

    fn before_initialize(&self, _ctx: &EventContext<'_, InitializeParams>) -> Result<()> {
        Ok(())
    }

    fn after_initialize(&self, _ctx: &EventContext<'_, InitializeParams>) -> Result<()> {
        Ok(())
    }

    fn before_add_liquidity(&self, _ctx: &EventContext<'_, ModifyLiquidityParams>) -> Result<()> {
        Ok(())
    }

    fn after_add_liquidity(
        &self,
        _ctx: &EventContext<'_, Settled<ModifyLiquidityParams>>,
    ) -> Result<Delta> {
        Ok(Delta::ZERO)
    }

    fn before_remove_liquidity(
        &self,
        _ctx: &EventContext<'_, ModifyLiquidityParams>,
    ) -> Result<()> {
        Ok(())
    }

    fn after_remove_liquidity(
        &self,
        _ctx: &EventContext<'_, Settled<ModifyLiquidityParams>>,
    ) -> Result<Delta> {
        Ok(Delta::ZERO)
    }

    fn before_swap(&self, _ctx: &EventContext<'_, SwapParams>) -> Result<SwapVote> {
        Ok(SwapVote::ABSTAIN)
    }

    /// 返回 unspecified 一侧的额外调整。
    fn after_swap(&self, _ctx: &EventContext<'_, Settled<SwapParams>>) -> Result<i128> {
        Ok(0)
    }

    fn before_donate(&self, _ctx: &EventContext<'_, DonateParams>) -> Result<()> {
        Ok(())
    }

    fn after_donate(&self, _ctx: &EventContext<'_, DonateParams>) -> Result<()> {
        Ok(())
    }
}

impl fmt::Debug for dyn Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("address", &self.address())
            .finish()
    }
}
