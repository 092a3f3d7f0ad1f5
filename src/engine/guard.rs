use std::sync::atomic::{AtomicBool, Ordering};

use super::error::{OrchestratorError, OrchestratorResult};

/// 实例级重入保护：Idle / Entered 两态。
#[derive(Debug, Default)]
pub struct ReentrancyGuard {
    entered: AtomicBool,
}

/// 持有期间保护处于 Entered，drop 时无条件回到 Idle。
#[must_use = "dropping the token releases the guard immediately"]
pub struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl ReentrancyGuard {
    pub const fn new() -> Self {
        Self {
            entered: AtomicBool::new(false),
        }
    }

    pub fn enter(&self) -> OrchestratorResult<GuardToken<'_>> {
        self.entered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| OrchestratorError::ReentrancyDetected)?;
        Ok(GuardToken { guard: self })
    }

    pub fn is_entered(&self) -> bool {
        self.entered.load(Ordering::Acquire)
    }
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.entered.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_entry_is_rejected() {
        let guard = ReentrancyGuard::new();
        let token = guard.enter().unwrap();
        assert!(guard.is_entered());
        assert!(matches!(
            guard.enter(),
            Err(OrchestratorError::ReentrancyDetected)
        ));
        drop(token);
        assert!(!guard.is_entered());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn guard_is_released_on_error_paths() {
        let guard = ReentrancyGuard::new();
        let run = || -> OrchestratorResult<()> {
            let _token = guard.enter()?;
            Err(OrchestratorError::ArithmeticOverflow("test"))
        };
        assert!(run().is_err());
        assert!(!guard.is_entered());
    }

    #[test]
    fn guard_is_released_on_panic() {
        let guard = ReentrancyGuard::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _token = guard.enter().unwrap();
            panic!("extension blew up");
        }));
        assert!(result.is_err());
        assert!(!guard.is_entered());
    }
}
