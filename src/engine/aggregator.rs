use serde::Serialize;

use super::error::{OrchestratorError, OrchestratorResult};

/// 扩展请求的额外余额调整：(specified, unspecified)。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Delta {
    pub specified: i128,
    pub unspecified: i128,
}

impl Delta {
    pub const ZERO: Delta = Delta {
        specified: 0,
        unspecified: 0,
    };

    pub const fn new(specified: i128, unspecified: i128) -> Self {
        Self {
            specified,
            unspecified,
        }
    }

    /// after_swap 只回传 unspecified 一侧。
    pub const fn unspecified_only(unspecified: i128) -> Self {
        Self {
            specified: 0,
            unspecified,
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// 分量逐一做带溢出检查的加法。
    pub fn combine(self, other: Delta) -> OrchestratorResult<Delta> {
        let specified = self
            .specified
            .checked_add(other.specified)
            .ok_or(OrchestratorError::ArithmeticOverflow("delta.specified"))?;
        let unspecified = self
            .unspecified
            .checked_add(other.unspecified)
            .ok_or(OrchestratorError::ArithmeticOverflow("delta.unspecified"))?;
        Ok(Delta {
            specified,
            unspecified,
        })
    }
}

/// 按注册顺序折叠多个扩展返回的 Delta，任何一步溢出即整体失败。
pub fn fold<I>(deltas: I) -> OrchestratorResult<Delta>
where
    I: IntoIterator<Item = Delta>,
{
    deltas
        .into_iter()
        .try_fold(Delta::ZERO, |acc, delta| acc.combine(delta))
}
