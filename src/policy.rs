//! How allocators act on contract violations.
use prometrics::metrics::Counter;
use slog::Logger;

use crate::Result;

/// The reaction of an allocator when a caller breaks a contract.
///
/// Contracts are things like "the size of an allocation is not zero" or
/// "a rollback target lies within the live region".
/// Running out of space is not a contract violation.
/// It is always reported as `Ok(None)` or `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationPolicy {
    /// Panic at once.
    ///
    /// Intended to catch programming errors during development.
    Strict,

    /// Refuse the request and return the error to the caller.
    ///
    /// The allocator state is left unchanged.
    Lenient,
}
impl Default for ViolationPolicy {
    fn default() -> Self {
        ViolationPolicy::Lenient
    }
}

/// Applies a `ViolationPolicy` to the outcome of contract checks.
#[derive(Debug, Clone)]
pub(crate) struct Contract {
    policy: ViolationPolicy,
    logger: Logger,
    violations: Counter,
}
impl Contract {
    pub fn new(policy: ViolationPolicy, logger: Logger, violations: Counter) -> Self {
        Contract {
            policy,
            logger,
            violations,
        }
    }

    pub fn policy(&self) -> ViolationPolicy {
        self.policy
    }

    /// Passes `result` through, handling an error according to the policy.
    pub fn enforce<T>(&self, result: Result<T>) -> Result<T> {
        let e = match result {
            Ok(v) => return Ok(v),
            Err(e) => e,
        };
        self.violations.increment();
        match self.policy {
            ViolationPolicy::Strict => {
                crit!(self.logger, "Contract violation"; "error" => %e);
                panic!("Contract violation: {}", e);
            }
            ViolationPolicy::Lenient => {
                warn!(self.logger, "Request refused"; "error" => %e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use prometrics::metrics::MetricBuilder;
    use slog::{Discard, Logger};

    use super::*;
    use crate::ErrorKind;

    fn contract(policy: ViolationPolicy) -> Contract {
        let violations = MetricBuilder::new()
            .counter("violations_total")
            .finish()
            .expect("Never fails");
        Contract::new(policy, Logger::root(Discard, o!()), violations)
    }

    fn violation() -> Result<()> {
        track_panic!(ErrorKind::InvalidInput, "broken");
    }

    #[test]
    fn lenient_returns_errors() {
        let contract = contract(ViolationPolicy::Lenient);
        assert_eq!(contract.enforce(Ok(3)).ok(), Some(3));

        let e = contract.enforce(violation()).err().map(|e| *e.kind());
        assert_eq!(e, Some(ErrorKind::InvalidInput));
        assert_eq!(contract.violations.value() as u64, 1);
    }

    #[test]
    #[should_panic]
    fn strict_panics() {
        let _ = contract(ViolationPolicy::Strict).enforce(violation());
    }

    #[test]
    fn default_is_lenient() {
        assert_eq!(ViolationPolicy::default(), ViolationPolicy::Lenient);
    }
}
