use std::collections::BTreeSet;

use serde::Serialize;

use super::error::{OrchestratorError, OrchestratorResult, Role};
use super::registry::check_address;
use super::types::Address;

/// 进程级角色持有者，显式存放于编排器状态中。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Roles {
    pub governance: Address,
    pub registry_manager: Address,
    pub owner: Address,
}

impl Roles {
    pub fn new(
        governance: Address,
        registry_manager: Address,
        owner: Address,
    ) -> OrchestratorResult<Self> {
        Ok(Self {
            governance: non_zero(Role::Governance, governance)?,
            registry_manager: non_zero(Role::RegistryManager, registry_manager)?,
            owner: non_zero(Role::Owner, owner)?,
        })
    }

    pub fn holder(&self, role: Role) -> Option<Address> {
        match role {
            Role::Governance => Some(self.governance),
            Role::RegistryManager => Some(self.registry_manager),
            Role::Owner => Some(self.owner),
            Role::Upstream => None,
        }
    }

    /// 授权检查，失败时不触碰任何状态。
    pub fn require(&self, role: Role, caller: Address) -> OrchestratorResult<()> {
        match self.holder(role) {
            Some(holder) if holder == caller => Ok(()),
            _ => Err(OrchestratorError::Unauthorized {
                required: role,
                caller,
            }),
        }
    }

    /// 角色转交，返回旧持有者。不允许转给零地址。
    pub fn reassign(&mut self, role: Role, next: Address) -> OrchestratorResult<Address> {
        let next = non_zero(role, next)?;
        let slot = match role {
            Role::Governance => &mut self.governance,
            Role::RegistryManager => &mut self.registry_manager,
            Role::Owner => &mut self.owner,
            Role::Upstream => return Err(OrchestratorError::InvalidRole(role)),
        };
        Ok(std::mem::replace(slot, next))
    }
}

fn non_zero(role: Role, address: Address) -> OrchestratorResult<Address> {
    if address.is_zero() {
        return Err(OrchestratorError::InvalidRole(role));
    }
    Ok(address)
}

/// 许可模式下的全局扩展白名单。
#[derive(Debug, Clone, Default)]
pub struct ApprovalRegistry {
    approved: BTreeSet<Address>,
}

impl ApprovalRegistry {
    pub fn is_approved(&self, address: &Address) -> bool {
        self.approved.contains(address)
    }

    /// 返回 true 表示新增。
    pub fn approve(&mut self, address: Address, self_address: Address) -> OrchestratorResult<bool> {
        check_address(address, self_address)?;
        Ok(self.approved.insert(address))
    }

    /// 返回 true 表示确实移除。已挂载到场所的扩展不受影响。
    pub fn revoke(&mut self, address: &Address) -> bool {
        self.approved.remove(address)
    }

    pub fn list(&self) -> Vec<Address> {
        self.approved.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> Roles {
        Roles::new(
            Address::new_unique(),
            Address::new_unique(),
            Address::new_unique(),
        )
        .unwrap()
    }

    #[test]
    fn require_matches_only_the_holder() {
        let roles = roles();
        assert!(roles.require(Role::Governance, roles.governance).is_ok());
        let err = roles
            .require(Role::Governance, roles.registry_manager)
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Unauthorized {
                required: Role::Governance,
                ..
            }
        ));
        assert!(roles.require(Role::Upstream, roles.owner).is_err());
    }

    #[test]
    fn reassign_rejects_zero_and_keeps_previous_holder() {
        let mut roles = roles();
        let before = roles;
        let err = roles.reassign(Role::RegistryManager, Address::ZERO).unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidRole(Role::RegistryManager)));
        assert_eq!(roles, before);

        let next = Address::new_unique();
        let previous = roles.reassign(Role::Governance, next).unwrap();
        assert_eq!(previous, before.governance);
        assert_eq!(roles.governance, next);
    }

    #[test]
    fn roles_cannot_start_at_zero() {
        assert!(Roles::new(Address::ZERO, Address::new_unique(), Address::new_unique()).is_err());
    }

    #[test]
    fn approvals_are_idempotent() {
        let me = Address::new_unique();
        let mut approvals = ApprovalRegistry::default();
        let ext = Address::new_unique();
        assert!(approvals.approve(ext, me).unwrap());
        assert!(!approvals.approve(ext, me).unwrap());
        assert!(approvals.is_approved(&ext));
        assert!(approvals.approve(me, me).is_err());
        assert!(approvals.approve(Address::ZERO, me).is_err());
        assert!(approvals.revoke(&ext));
        assert!(!approvals.revoke(&ext));
        assert!(approvals.list().is_empty());
    }
}
