use std::fmt;

use thiserror::Error;

use super::types::{Address, LifecycleEvent, RegistryMode};

/// 需要的角色，用于授权失败时的报错。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Governance,
    RegistryManager,
    Owner,
    Upstream,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Governance => "governance",
            Role::RegistryManager => "registry_manager",
            Role::Owner => "owner",
            Role::Upstream => "upstream",
        };
        f.write_str(name)
    }
}

/// 错误大类，供调用方区分处理。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    Reentrancy,
    Arithmetic,
    ExtensionFailure,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("扩展地址非法: {address} ({reason})")]
    InvalidExtension {
        address: Address,
        reason: &'static str,
    },
    #[error("扩展重复: {0}")]
    DuplicateExtension(Address),
    #[error("场所已注册，注册表不可变")]
    AlreadyRegistered,
    #[error("费率 {fee} 超过上限 {max}")]
    InvalidFee { fee: u32, max: u32 },
    #[error("操作 {operation} 不适用于 {mode} 模式")]
    UnsupportedInMode {
        operation: &'static str,
        mode: RegistryMode,
    },
    #[error("角色 {0} 不能转交给零地址")]
    InvalidRole(Role),
    #[error("调用方 {caller} 缺少角色 {required}")]
    Unauthorized { required: Role, caller: Address },
    #[error("检测到重入调用")]
    ReentrancyDetected,
    #[error("数值溢出: {0}")]
    ArithmeticOverflow(&'static str),
    #[error("扩展 {extension} 在 {event} 阶段失败: {source}")]
    ExtensionFailure {
        extension: Address,
        event: LifecycleEvent,
        #[source]
        source: anyhow::Error,
    },
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrchestratorError::InvalidExtension { .. }
            | OrchestratorError::DuplicateExtension(_)
            | OrchestratorError::AlreadyRegistered
            | OrchestratorError::InvalidFee { .. }
            | OrchestratorError::UnsupportedInMode { .. }
            | OrchestratorError::InvalidRole(_) => ErrorKind::Validation,
            OrchestratorError::Unauthorized { .. } => ErrorKind::Authorization,
            OrchestratorError::ReentrancyDetected => ErrorKind::Reentrancy,
            OrchestratorError::ArithmeticOverflow(_) => ErrorKind::Arithmetic,
            OrchestratorError::ExtensionFailure { .. } => ErrorKind::ExtensionFailure,
        }
    }

    pub fn label(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "validation",
            ErrorKind::Authorization => "authorization",
            ErrorKind::Reentrancy => "reentrancy",
            ErrorKind::Arithmetic => "arithmetic",
            ErrorKind::ExtensionFailure => "extension_failure",
        }
    }
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
