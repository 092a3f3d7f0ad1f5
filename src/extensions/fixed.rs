use anyhow::{Result, bail};
use smallvec::SmallVec;
use tracing::trace;

use crate::config::{DeltaConfig, ExtensionConfig};
use crate::engine::{
    Address, Delta, DonateParams, EventContext, Extension, InitializeParams, LifecycleEvent,
    ModifyLiquidityParams, Settled, SwapParams, SwapVote,
};

/// 返回固定结果的扩展，由 `[[extensions]]` 配置生成，用于模拟与联调。
#[derive(Debug, Clone)]
pub struct FixedExtension {
    address: Address,
    fee: u32,
    swap_delta: Delta,
    after_swap_unspecified: i128,
    add_liquidity_delta: Delta,
    remove_liquidity_delta: Delta,
    fail_on: SmallVec<[LifecycleEvent; 2]>,
}

impl FixedExtension {
    pub fn from_config(config: &ExtensionConfig) -> Self {
        Self {
            address: config.address,
            fee: config.fee,
            swap_delta: to_delta(config.before_swap),
            after_swap_unspecified: i128::from(config.after_swap_unspecified),
            add_liquidity_delta: to_delta(config.after_add_liquidity),
            remove_liquidity_delta: to_delta(config.after_remove_liquidity),
            fail_on: config.fail_on.iter().copied().collect(),
        }
    }

    fn observe(&self, event: LifecycleEvent) -> Result<()> {
        trace!(
            target: "extensions::fixed",
            extension = %self.address,
            event = event.as_str(),
            "fixed extension invoked"
        );
        if self.fail_on.contains(&event) {
            bail!("扩展 {} 按配置在 {} 阶段返回失败", self.address, event);
        }
        Ok(())
    }
}

fn to_delta(config: DeltaConfig) -> Delta {
    Delta::new(i128::from(config.specified), i128::from(config.unspecified))
}

impl Extension for FixedExtension {
    fn address(&self) -> Address {
        self.address
    }

    fn before_initialize(&self, _ctx: &EventContext<'_, InitializeParams>) -> Result<()> {
        self.observe(LifecycleEvent::BeforeInitialize)
    }

    fn after_initialize(&self, _ctx: &EventContext<'_, InitializeParams>) -> Result<()> {
        self.observe(LifecycleEvent::AfterInitialize)
    }

    fn before_add_liquidity(&self, _ctx: &EventContext<'_, ModifyLiquidityParams>) -> Result<()> {
        self.observe(LifecycleEvent::BeforeAddLiquidity)
    }

    fn after_add_liquidity(
        &self,
        _ctx: &EventContext<'_, Settled<ModifyLiquidityParams>>,
    ) -> Result<Delta> {
        self.observe(LifecycleEvent::AfterAddLiquidity)?;
        Ok(self.add_liquidity_delta)
    }

    fn before_remove_liquidity(
        &self,
        _ctx: &EventContext<'_, ModifyLiquidityParams>,
    ) -> Result<()> {
        self.observe(LifecycleEvent::BeforeRemoveLiquidity)
    }

    fn after_remove_liquidity(
        &self,
        _ctx: &EventContext<'_, Settled<ModifyLiquidityParams>>,
    ) -> Result<Delta> {
        self.observe(LifecycleEvent::AfterRemoveLiquidity)?;
        Ok(self.remove_liquidity_delta)
    }

    fn before_swap(&self, _ctx: &EventContext<'_, SwapParams>) -> Result<SwapVote> {
        self.observe(LifecycleEvent::BeforeSwap)?;
        Ok(SwapVote {
            delta: self.swap_delta,
            fee: self.fee,
        })
    }

    fn after_swap(&self, _ctx: &EventContext<'_, Settled<SwapParams>>) -> Result<i128> {
        self.observe(LifecycleEvent::AfterSwap)?;
        Ok(self.after_swap_unspecified)
    }

    fn before_donate(&self, _ctx: &EventContext<'_, DonateParams>) -> Result<()> {
        self.observe(LifecycleEvent::BeforeDonate)
    }

    fn after_donate(&self, _ctx: &EventContext<'_, DonateParams>) -> Result<()> {
        self.observe(LifecycleEvent::AfterDonate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::VenueId;

    fn swap_ctx() -> EventContext<'static, SwapParams> {
        EventContext {
            venue: VenueId::new_unique(),
            sender: Address::new_unique(),
            params: SwapParams {
                zero_for_one: false,
                amount_specified: 2_000,
                sqrt_price_limit_x96: u128::MAX,
            },
            hook_data: &[],
        }
    }

    fn config() -> ExtensionConfig {
        ExtensionConfig {
            address: Address::new_unique(),
            fee: 2_500,
            weight: None,
            before_swap: DeltaConfig {
                specified: 12,
                unspecified: -3,
            },
            after_swap_unspecified: 40,
            after_add_liquidity: DeltaConfig::default(),
            after_remove_liquidity: DeltaConfig {
                specified: 0,
                unspecified: 9,
            },
            fail_on: Vec::new(),
        }
    }

    #[test]
    fn returns_configured_values() {
        let ext = FixedExtension::from_config(&config());
        let vote = ext.before_swap(&swap_ctx()).unwrap();
        assert_eq!(vote.fee, 2_500);
        assert_eq!(vote.delta, Delta::new(12, -3));

        let ctx = swap_ctx();
        let settled = EventContext {
            venue: ctx.venue,
            sender: ctx.sender,
            params: Settled {
                params: ctx.params,
                balance_delta: Delta::new(2_000, -1_990),
            },
            hook_data: ctx.hook_data,
        };
        assert_eq!(ext.after_swap(&settled).unwrap(), 40);
    }

    #[test]
    fn fails_only_on_listed_events() {
        let mut cfg = config();
        cfg.fail_on = vec![LifecycleEvent::BeforeSwap];
        let ext = FixedExtension::from_config(&cfg);

        let err = ext.before_swap(&swap_ctx()).unwrap_err();
        assert!(err.to_string().contains("before_swap"));

        let donate = EventContext {
            venue: VenueId::new_unique(),
            sender: Address::new_unique(),
            params: DonateParams {
                amount0: 1,
                amount1: 2,
            },
            hook_data: &[],
        };
        assert!(ext.before_donate(&donate).is_ok());
    }
}
