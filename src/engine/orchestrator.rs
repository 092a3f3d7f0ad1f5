//! 单一回调目标背后的多扩展编排器。
//!
//! 每个生命周期入口的执行顺序固定：
//! 重入保护 → 上游身份校验 → 读取注册表快照 → 按注册顺序逐个调用扩展
//! → 聚合 Delta / 收集费率投票 → 费率仲裁 → 返回合并结果。
//! 任何一个扩展失败都会让整次分发失败，不做隔离。
//!
//! 状态锁只在读取快照或应用变更时短暂持有，从不跨越扩展调用，
//! 因此扩展在回调中可以安全地调用只读查询。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::monitoring::events;

use super::access::{ApprovalRegistry, Roles};
use super::aggregator::{self, Delta};
use super::audit::{ChangeRecord, DispatchRecord, Journal, JournalEntry};
use super::error::{OrchestratorError, OrchestratorResult, Role};
use super::extension::{Extension, Settled, SwapVote};
use super::fee::{self, FeeCalculationMethod, FeeConfiguration, FeeSource, FeeVote, Resolution};
use super::guard::ReentrancyGuard;
use super::registry::{AdmissionRules, RegistryStore};
use super::types::{
    Address, DonateParams, EventContext, InitializeParams, LifecycleEvent, ModifyLiquidityParams,
    RegistryMode, SwapParams, VenueId,
};

pub const DEFAULT_JOURNAL_CAPACITY: usize = 4_096;

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub mode: RegistryMode,
    /// 编排器自身地址，扩展不得与之相同。
    pub self_address: Address,
    /// 唯一允许触发生命周期入口的上游调用方。
    pub upstream: Address,
    pub roles: Roles,
    /// 新场所的默认费率与计算方法。
    pub default_fee: u32,
    pub default_method: FeeCalculationMethod,
    pub journal_capacity: usize,
}

/// before_swap 的合并结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapOutcome {
    pub delta: Delta,
    pub fee: u32,
    /// 空注册表时为 `None`（不覆盖费率）。
    pub fee_source: Option<FeeSource>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dispatched {
    delta: Delta,
    resolution: Option<Resolution>,
    invoked: usize,
}

impl Dispatched {
    const IDENTITY: Dispatched = Dispatched {
        delta: Delta::ZERO,
        resolution: None,
        invoked: 0,
    };
}

struct State {
    roles: Roles,
    registry: RegistryStore,
    approvals: ApprovalRegistry,
    fees: HashMap<VenueId, FeeConfiguration>,
}

pub struct Orchestrator {
    mode: RegistryMode,
    self_address: Address,
    upstream: Address,
    fee_template: FeeConfiguration,
    guard: ReentrancyGuard,
    state: RwLock<State>,
    journal: Mutex<Journal>,
}

impl Orchestrator {
    pub fn new(settings: OrchestratorSettings) -> OrchestratorResult<Self> {
        let OrchestratorSettings {
            mode,
            self_address,
            upstream,
            roles,
            default_fee,
            default_method,
            journal_capacity,
        } = settings;

        if self_address.is_zero() {
            return Err(OrchestratorError::InvalidExtension {
                address: self_address,
                reason: "zero orchestrator address",
            });
        }
        if upstream.is_zero() {
            return Err(OrchestratorError::InvalidRole(Role::Upstream));
        }
        let roles = Roles::new(roles.governance, roles.registry_manager, roles.owner)?;
        let fee_template = FeeConfiguration::new(default_fee, default_method)?;

        debug!(
            target: "orchestrator::registry",
            %mode,
            self_address = %self_address,
            upstream = %upstream,
            default_fee,
            default_method = default_method.as_str(),
            "orchestrator initialised"
        );

        Ok(Self {
            mode,
            self_address,
            upstream,
            fee_template,
            guard: ReentrancyGuard::new(),
            state: RwLock::new(State {
                roles,
                registry: RegistryStore::new(),
                approvals: ApprovalRegistry::default(),
                fees: HashMap::new(),
            }),
            journal: Mutex::new(Journal::with_capacity(journal_capacity)),
        })
    }

    // ---------------------------------------------------------------------
    // 生命周期入口（仅限上游调用方）
    // ---------------------------------------------------------------------

    pub fn before_initialize(
        &self,
        caller: Address,
        ctx: &EventContext<'_, InitializeParams>,
    ) -> OrchestratorResult<()> {
        self.dispatch(caller, ctx.venue, LifecycleEvent::BeforeInitialize, |ext| {
            ext.before_initialize(ctx).map(|_| SwapVote::ABSTAIN)
        })
        .map(|_| ())
    }

    pub fn after_initialize(
        &self,
        caller: Address,
        ctx: &EventContext<'_, InitializeParams>,
    ) -> OrchestratorResult<()> {
        self.dispatch(caller, ctx.venue, LifecycleEvent::AfterInitialize, |ext| {
            ext.after_initialize(ctx).map(|_| SwapVote::ABSTAIN)
        })
        .map(|_| ())
    }

    pub fn before_add_liquidity(
        &self,
        caller: Address,
        ctx: &EventContext<'_, ModifyLiquidityParams>,
    ) -> OrchestratorResult<()> {
        self.dispatch(caller, ctx.venue, LifecycleEvent::BeforeAddLiquidity, |ext| {
            ext.before_add_liquidity(ctx).map(|_| SwapVote::ABSTAIN)
        })
        .map(|_| ())
    }

    pub fn after_add_liquidity(
        &self,
        caller: Address,
        ctx: &EventContext<'_, Settled<ModifyLiquidityParams>>,
    ) -> OrchestratorResult<Delta> {
        self.dispatch(caller, ctx.venue, LifecycleEvent::AfterAddLiquidity, |ext| {
            ext.after_add_liquidity(ctx).map(delta_only)
        })
        .map(|out| out.delta)
    }

    pub fn before_remove_liquidity(
        &self,
        caller: Address,
        ctx: &EventContext<'_, ModifyLiquidityParams>,
    ) -> OrchestratorResult<()> {
        self.dispatch(
            caller,
            ctx.venue,
            LifecycleEvent::BeforeRemoveLiquidity,
            |ext| ext.before_remove_liquidity(ctx).map(|_| SwapVote::ABSTAIN),
        )
        .map(|_| ())
    }

    pub fn after_remove_liquidity(
        &self,
        caller: Address,
        ctx: &EventContext<'_, Settled<ModifyLiquidityParams>>,
    ) -> OrchestratorResult<Delta> {
        self.dispatch(
            caller,
            ctx.venue,
            LifecycleEvent::AfterRemoveLiquidity,
            |ext| ext.after_remove_liquidity(ctx).map(delta_only),
        )
        .map(|out| out.delta)
    }

    pub fn before_swap(
        &self,
        caller: Address,
        ctx: &EventContext<'_, SwapParams>,
    ) -> OrchestratorResult<SwapOutcome> {
        self.dispatch(caller, ctx.venue, LifecycleEvent::BeforeSwap, |ext| {
            ext.before_swap(ctx)
        })
        .map(|out| SwapOutcome {
            delta: out.delta,
            fee: out.resolution.map_or(0, |resolution| resolution.fee),
            fee_source: out.resolution.map(|resolution| resolution.source),
        })
    }

    /// 返回合并后的 unspecified 调整量。
    pub fn after_swap(
        &self,
        caller: Address,
        ctx: &EventContext<'_, Settled<SwapParams>>,
    ) -> OrchestratorResult<i128> {
        self.dispatch(caller, ctx.venue, LifecycleEvent::AfterSwap, |ext| {
            ext.after_swap(ctx)
                .map(|unspecified| delta_only(Delta::unspecified_only(unspecified)))
        })
        .map(|out| out.delta.unspecified)
    }

    pub fn before_donate(
        &self,
        caller: Address,
        ctx: &EventContext<'_, DonateParams>,
    ) -> OrchestratorResult<()> {
        self.dispatch(caller, ctx.venue, LifecycleEvent::BeforeDonate, |ext| {
            ext.before_donate(ctx).map(|_| SwapVote::ABSTAIN)
        })
        .map(|_| ())
    }

    pub fn after_donate(
        &self,
        caller: Address,
        ctx: &EventContext<'_, DonateParams>,
    ) -> OrchestratorResult<()> {
        self.dispatch(caller, ctx.venue, LifecycleEvent::AfterDonate, |ext| {
            ext.after_donate(ctx).map(|_| SwapVote::ABSTAIN)
        })
        .map(|_| ())
    }

    fn dispatch<F>(
        &self,
        caller: Address,
        venue: VenueId,
        event: LifecycleEvent,
        invoke: F,
    ) -> OrchestratorResult<Dispatched>
    where
        F: FnMut(&dyn Extension) -> anyhow::Result<SwapVote>,
    {
        let started = Instant::now();
        let result = self.dispatch_guarded(caller, venue, event, invoke);
        match &result {
            Ok(out) if out.invoked == 0 => events::dispatch_skipped(&venue, event),
            Ok(out) => events::dispatch_completed(
                &venue,
                event,
                out.invoked,
                out.resolution.map(|r| (r.fee, r.source)),
                started.elapsed(),
            ),
            Err(err) => events::dispatch_failed(&venue, event, err),
        }
        result
    }

    fn dispatch_guarded<F>(
        &self,
        caller: Address,
        venue: VenueId,
        event: LifecycleEvent,
        mut invoke: F,
    ) -> OrchestratorResult<Dispatched>
    where
        F: FnMut(&dyn Extension) -> anyhow::Result<SwapVote>,
    {
        let _token = self.guard.enter()?;
        if caller != self.upstream {
            return Err(OrchestratorError::Unauthorized {
                required: Role::Upstream,
                caller,
            });
        }

        let (entries, fee_config) = {
            let state = self.state.read();
            (
                state.registry.snapshot(&venue),
                state
                    .fees
                    .get(&venue)
                    .copied()
                    .unwrap_or(self.fee_template),
            )
        };
        if entries.is_empty() {
            return Ok(Dispatched::IDENTITY);
        }

        let mut deltas: SmallVec<[Delta; 4]> = SmallVec::new();
        let mut votes: SmallVec<[FeeVote; 8]> = SmallVec::new();
        for entry in &entries {
            let contribution = invoke(entry.extension.as_ref()).map_err(|source| {
                OrchestratorError::ExtensionFailure {
                    extension: entry.address,
                    event,
                    source,
                }
            })?;
            trace!(
                target: "orchestrator::dispatch",
                event = event.as_str(),
                extension = %entry.address,
                specified = %contribution.delta.specified,
                unspecified = %contribution.delta.unspecified,
                fee = contribution.fee,
                "extension returned"
            );
            if event.carries_delta() {
                deltas.push(contribution.delta);
            }
            if event.carries_fee() {
                votes.push(FeeVote::new(entry.address, contribution.fee, entry.weight)?);
            }
        }

        let delta = aggregator::fold(deltas)?;
        let resolution = if event.carries_fee() {
            let resolution = fee::resolve(&votes, &fee_config)?;
            debug!(
                target: "orchestrator::fee",
                venue = %venue,
                votes = votes.len(),
                method = fee_config.method().as_str(),
                fee = resolution.fee,
                "fee resolved"
            );
            Some(resolution)
        } else {
            None
        };

        self.journal
            .lock()
            .push(JournalEntry::Dispatch(DispatchRecord {
                venue,
                event,
                extensions: entries.iter().map(|entry| entry.address).collect(),
                fee: resolution.map(|r| (r.fee, r.source)),
            }));

        Ok(Dispatched {
            delta,
            resolution,
            invoked: entries.len(),
        })
    }

    // ---------------------------------------------------------------------
    // 管理入口
    // ---------------------------------------------------------------------

    /// 不可变模式：一次性注册场所的扩展列表，可同时指定权重与费率计算方法。
    /// 注册之后列表与权重都不可再改；空列表视为无操作。
    pub fn register(
        &self,
        caller: Address,
        venue: VenueId,
        extensions: Vec<Arc<dyn Extension>>,
        weights: &[(Address, u64)],
        fee_method: Option<FeeCalculationMethod>,
    ) -> OrchestratorResult<()> {
        self.administer("register", caller, Role::Owner, |state| {
            self.require_mode(RegistryMode::Immutable, "register")?;
            if state.registry.is_registered(&venue) {
                return Err(OrchestratorError::AlreadyRegistered);
            }
            let rules = AdmissionRules {
                self_address: self.self_address,
                approved: None,
            };
            state
                .registry
                .check_admission(&venue, &extensions, &rules)?;

            let addresses: Vec<Address> = extensions.iter().map(|ext| ext.address()).collect();
            if let Some((stray, _)) = weights
                .iter()
                .find(|(address, _)| !addresses.contains(address))
            {
                return Err(OrchestratorError::InvalidExtension {
                    address: *stray,
                    reason: "not registered for venue",
                });
            }
            if extensions.is_empty() {
                return Ok(((), None));
            }

            let config = state.fees.entry(venue).or_insert(self.fee_template);
            if let Some(method) = fee_method {
                config.set_method(method);
            }
            let method = config.method();
            state.registry.insert_all(venue, extensions);
            for (address, weight) in weights {
                state.registry.set_weight(&venue, address, *weight)?;
            }
            Ok(((), Some(ChangeRecord::VenueRegistered {
                venue,
                extensions: addresses,
                weights: weights.to_vec(),
                method,
            })))
        })
    }

    /// 许可模式：追加扩展到场所末尾，必须全部已审批。
    pub fn add_extensions(
        &self,
        caller: Address,
        venue: VenueId,
        extensions: Vec<Arc<dyn Extension>>,
    ) -> OrchestratorResult<()> {
        self.administer("add_extensions", caller, Role::RegistryManager, |state| {
            self.require_mode(RegistryMode::Permissioned, "add_extensions")?;
            let approvals = &state.approvals;
            let is_approved = |address: &Address| approvals.is_approved(address);
            let rules = AdmissionRules {
                self_address: self.self_address,
                approved: Some(&is_approved as &dyn Fn(&Address) -> bool),
            };
            state
                .registry
                .check_admission(&venue, &extensions, &rules)?;

            if extensions.is_empty() {
                return Ok(((), None));
            }
            let addresses: Vec<Address> = extensions.iter().map(|ext| ext.address()).collect();
            state.fees.entry(venue).or_insert(self.fee_template);
            state.registry.insert_all(venue, extensions);
            Ok(((), Some(ChangeRecord::ExtensionsAdded {
                venue,
                extensions: addresses,
            })))
        })
    }

    /// 许可模式：移除扩展；不在注册表中的地址直接忽略。返回实际移除的地址。
    pub fn remove_extensions(
        &self,
        caller: Address,
        venue: VenueId,
        addresses: &[Address],
    ) -> OrchestratorResult<Vec<Address>> {
        self.administer("remove_extensions", caller, Role::RegistryManager, |state| {
            self.require_mode(RegistryMode::Permissioned, "remove_extensions")?;
            let removed = state.registry.remove_all(&venue, addresses);
            let change = (!removed.is_empty()).then(|| ChangeRecord::ExtensionsRemoved {
                venue,
                extensions: removed.clone(),
            });
            Ok((removed, change))
        })
    }

    /// 许可模式：调整单个场所内扩展的权重。不可变模式下权重随 `register` 一次写定。
    pub fn set_extension_weight(
        &self,
        caller: Address,
        venue: VenueId,
        extension: Address,
        weight: u64,
    ) -> OrchestratorResult<()> {
        self.administer(
            "set_extension_weight",
            caller,
            Role::RegistryManager,
            |state| {
                self.require_mode(RegistryMode::Permissioned, "set_extension_weight")?;
                state.registry.set_weight(&venue, &extension, weight)?;
                Ok(((), Some(ChangeRecord::ExtensionWeightUpdated {
                    venue,
                    extension,
                    weight,
                })))
            },
        )
    }

    pub fn approve_extension(&self, caller: Address, extension: Address) -> OrchestratorResult<()> {
        self.administer("approve_extension", caller, Role::RegistryManager, |state| {
            let inserted = state.approvals.approve(extension, self.self_address)?;
            Ok(((), inserted.then_some(ChangeRecord::ExtensionApproved { extension })))
        })
    }

    /// 撤销审批只影响之后的新增，不会把扩展从已挂载的场所中移除。
    pub fn revoke_extension(&self, caller: Address, extension: Address) -> OrchestratorResult<()> {
        self.administer("revoke_extension", caller, Role::RegistryManager, |state| {
            let removed = state.approvals.revoke(&extension);
            Ok(((), removed.then_some(ChangeRecord::ExtensionRevoked { extension })))
        })
    }

    pub fn set_fee_method(
        &self,
        caller: Address,
        venue: VenueId,
        method: FeeCalculationMethod,
    ) -> OrchestratorResult<()> {
        self.administer("set_fee_method", caller, Role::Governance, |state| {
            self.fee_entry(state, venue).set_method(method);
            Ok(((), Some(ChangeRecord::FeeMethodUpdated { venue, method })))
        })
    }

    pub fn set_default_fee(
        &self,
        caller: Address,
        venue: VenueId,
        fee: u32,
    ) -> OrchestratorResult<()> {
        self.administer("set_default_fee", caller, Role::Governance, |state| {
            let mut config = self.current_fees(state, venue);
            config.set_default_fee(fee)?;
            state.fees.insert(venue, config);
            Ok(((), Some(ChangeRecord::DefaultFeeUpdated { venue, fee })))
        })
    }

    pub fn set_governance_fee(
        &self,
        caller: Address,
        venue: VenueId,
        fee: u32,
    ) -> OrchestratorResult<()> {
        self.update_governance_fee("set_governance_fee", caller, venue, Some(fee))
    }

    pub fn clear_governance_fee(&self, caller: Address, venue: VenueId) -> OrchestratorResult<()> {
        self.update_governance_fee("clear_governance_fee", caller, venue, None)
    }

    pub fn set_venue_specific_fee(
        &self,
        caller: Address,
        venue: VenueId,
        fee: u32,
    ) -> OrchestratorResult<()> {
        self.update_venue_specific_fee("set_venue_specific_fee", caller, venue, Some(fee))
    }

    pub fn clear_venue_specific_fee(
        &self,
        caller: Address,
        venue: VenueId,
    ) -> OrchestratorResult<()> {
        self.update_venue_specific_fee("clear_venue_specific_fee", caller, venue, None)
    }

    pub fn set_registry_manager(&self, caller: Address, next: Address) -> OrchestratorResult<()> {
        self.administer("set_registry_manager", caller, Role::Governance, |state| {
            let previous = state.roles.reassign(Role::RegistryManager, next)?;
            Ok(((), Some(ChangeRecord::RegistryManagerUpdated { previous, next })))
        })
    }

    pub fn transfer_governance(&self, caller: Address, next: Address) -> OrchestratorResult<()> {
        self.administer("transfer_governance", caller, Role::Governance, |state| {
            let previous = state.roles.reassign(Role::Governance, next)?;
            Ok(((), Some(ChangeRecord::GovernanceTransferred { previous, next })))
        })
    }

    pub fn transfer_ownership(&self, caller: Address, next: Address) -> OrchestratorResult<()> {
        self.administer("transfer_ownership", caller, Role::Owner, |state| {
            let previous = state.roles.reassign(Role::Owner, next)?;
            Ok(((), Some(ChangeRecord::OwnershipTransferred { previous, next })))
        })
    }

    fn update_governance_fee(
        &self,
        operation: &'static str,
        caller: Address,
        venue: VenueId,
        fee: Option<u32>,
    ) -> OrchestratorResult<()> {
        self.administer(operation, caller, Role::Governance, |state| {
            let mut config = self.current_fees(state, venue);
            config.set_governance_fee(fee)?;
            state.fees.insert(venue, config);
            Ok(((), Some(ChangeRecord::GovernanceFeeUpdated { venue, fee })))
        })
    }

    fn update_venue_specific_fee(
        &self,
        operation: &'static str,
        caller: Address,
        venue: VenueId,
        fee: Option<u32>,
    ) -> OrchestratorResult<()> {
        self.administer(operation, caller, Role::Governance, |state| {
            let mut config = self.current_fees(state, venue);
            config.set_venue_specific_fee(fee)?;
            state.fees.insert(venue, config);
            Ok(((), Some(ChangeRecord::VenueSpecificFeeUpdated { venue, fee })))
        })
    }

    /// 所有管理入口的公共骨架：重入保护 → 角色校验 → 校验并应用 → 记录变更。
    /// `apply` 必须在校验全部通过之后才写入状态。
    fn administer<T, F>(
        &self,
        operation: &'static str,
        caller: Address,
        role: Role,
        apply: F,
    ) -> OrchestratorResult<T>
    where
        F: FnOnce(&mut State) -> OrchestratorResult<(T, Option<ChangeRecord>)>,
    {
        let result = self.administer_guarded(caller, role, apply);
        if let Err(err) = &result {
            events::admin_rejected(operation, err);
        }
        result
    }

    fn administer_guarded<T, F>(&self, caller: Address, role: Role, apply: F) -> OrchestratorResult<T>
    where
        F: FnOnce(&mut State) -> OrchestratorResult<(T, Option<ChangeRecord>)>,
    {
        let _token = self.guard.enter()?;
        let (value, change) = {
            let mut state = self.state.write();
            state.roles.require(role, caller)?;
            trace!(
                target: "orchestrator::access",
                role = %role,
                caller = %caller,
                "caller authorised"
            );
            apply(&mut *state)?
        };
        if let Some(record) = change {
            events::admin_change(&record);
            self.journal.lock().push(JournalEntry::Change(record));
        }
        Ok(value)
    }

    fn require_mode(&self, expected: RegistryMode, operation: &'static str) -> OrchestratorResult<()> {
        if self.mode != expected {
            return Err(OrchestratorError::UnsupportedInMode {
                operation,
                mode: self.mode,
            });
        }
        Ok(())
    }

    fn fee_entry<'s>(&self, state: &'s mut State, venue: VenueId) -> &'s mut FeeConfiguration {
        state.fees.entry(venue).or_insert(self.fee_template)
    }

    fn current_fees(&self, state: &State, venue: VenueId) -> FeeConfiguration {
        state
            .fees
            .get(&venue)
            .copied()
            .unwrap_or(self.fee_template)
    }

    // ---------------------------------------------------------------------
    // 只读查询（分发过程中可重入调用）
    // ---------------------------------------------------------------------

    pub fn mode(&self) -> RegistryMode {
        self.mode
    }

    pub fn address(&self) -> Address {
        self.self_address
    }

    pub fn upstream(&self) -> Address {
        self.upstream
    }

    pub fn extensions(&self, venue: &VenueId) -> Vec<Address> {
        self.state.read().registry.extensions(venue)
    }

    pub fn extension_weight(&self, venue: &VenueId, extension: &Address) -> Option<u64> {
        self.state.read().registry.weight(venue, extension)
    }

    pub fn venues(&self) -> Vec<VenueId> {
        self.state.read().registry.venues()
    }

    pub fn fee_config(&self, venue: &VenueId) -> FeeConfiguration {
        self.current_fees(&self.state.read(), *venue)
    }

    pub fn is_approved(&self, extension: &Address) -> bool {
        self.state.read().approvals.is_approved(extension)
    }

    pub fn approved_extensions(&self) -> Vec<Address> {
        self.state.read().approvals.list()
    }

    pub fn roles(&self) -> Roles {
        self.state.read().roles
    }

    pub fn is_dispatching(&self) -> bool {
        self.guard.is_entered()
    }

    pub fn journal(&self) -> Vec<JournalEntry> {
        self.journal.lock().entries()
    }

    /// 历史上写入过的审计记录总数。
    pub fn journal_sequence(&self) -> u64 {
        self.journal.lock().sequence()
    }
}

fn delta_only(delta: Delta) -> SwapVote {
    SwapVote { delta, fee: 0 }
}

