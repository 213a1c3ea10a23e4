//! Numeric-policy knobs shared by operator descriptors and backends.
//!
//! Operator descriptors freeze a [`CastingRule`] and an [`ErrorPolicy`] at
//! construction time. Neither is checked up front; backends consult them when
//! the corresponding instruction actually executes.

use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::backend::spec::DType;

/// Casting discipline applied when an instruction converts between dtypes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastingRule {
    /// No casting of any kind.
    No,
    /// Only byte-order changes; identical to `No` for the dtypes here.
    Equiv,
    /// Only value-preserving casts.
    Safe,
    /// Safe casts plus casts to the same or a higher kind (e.g. `F64` to
    /// `F32`, or `Si32` to `F32`).
    #[default]
    SameKind,
    /// Any conversion at all.
    Unsafe,
}

/// Response to a floating-point error condition raised during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrAction {
    Ignore,
    Warn,
    Raise,
    Call,
    Print,
    Log,
}

/// Floating-point error conditions a backend kernel can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FpCondition {
    DivideByZero,
    Overflow,
    Underflow,
    Invalid,
}

impl fmt::Display for FpCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FpCondition::DivideByZero => "divide-by-zero",
            FpCondition::Overflow => "overflow",
            FpCondition::Underflow => "underflow",
            FpCondition::Invalid => "invalid value",
        };
        f.write_str(name)
    }
}

/// Per-condition error handling, mirroring the process-wide default that
/// descriptors snapshot at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorPolicy {
    pub divide: ErrAction,
    pub over: ErrAction,
    pub under: ErrAction,
    pub invalid: ErrAction,
}

impl ErrorPolicy {
    /// Conventional default: warn on everything except underflow.
    pub const fn standard() -> Self {
        Self {
            divide: ErrAction::Warn,
            over: ErrAction::Warn,
            under: ErrAction::Ignore,
            invalid: ErrAction::Warn,
        }
    }

    /// Policy that silences every condition.
    pub const fn ignore_all() -> Self {
        Self {
            divide: ErrAction::Ignore,
            over: ErrAction::Ignore,
            under: ErrAction::Ignore,
            invalid: ErrAction::Ignore,
        }
    }

    pub fn action_for(&self, condition: FpCondition) -> ErrAction {
        match condition {
            FpCondition::DivideByZero => self.divide,
            FpCondition::Overflow => self.over,
            FpCondition::Underflow => self.under,
            FpCondition::Invalid => self.invalid,
        }
    }
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

static DEFAULT_POLICY: RwLock<ErrorPolicy> = RwLock::new(ErrorPolicy::standard());

/// Returns a snapshot of the current process-wide default error policy.
///
/// Descriptors constructed without an explicit policy call this once and keep
/// the result; later changes to the default do not affect them.
pub fn default_error_policy() -> ErrorPolicy {
    *DEFAULT_POLICY
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Replaces the process-wide default error policy, returning the previous one.
pub fn set_default_error_policy(policy: ErrorPolicy) -> ErrorPolicy {
    let mut guard = DEFAULT_POLICY
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    std::mem::replace(&mut *guard, policy)
}

fn kind_rank(dtype: DType) -> u8 {
    if dtype == DType::I1 {
        0
    } else if dtype.is_integer() {
        1
    } else if dtype.is_float() {
        2
    } else {
        3
    }
}

fn cast_is_safe(from: DType, to: DType) -> bool {
    use DType::*;
    if from == to {
        return true;
    }
    match from {
        I1 => true,
        Si8 => matches!(to, Si32 | Si64 | F32 | F64 | Cf32 | Cf64),
        Si32 => matches!(to, Si64 | F64 | Cf64),
        Si64 => matches!(to, F64 | Cf64),
        Bf16 | F16 => matches!(to, F32 | F64 | Cf32 | Cf64),
        F32 => matches!(to, F64 | Cf32 | Cf64),
        F64 => matches!(to, Cf64),
        Cf32 => matches!(to, Cf64),
        Cf64 => false,
    }
}

/// Decides whether `from` may convert to `to` under the given rule.
pub fn can_cast(from: DType, to: DType, rule: CastingRule) -> bool {
    match rule {
        CastingRule::No | CastingRule::Equiv => from == to,
        CastingRule::Safe => cast_is_safe(from, to),
        CastingRule::SameKind => cast_is_safe(from, to) || kind_rank(to) >= kind_rank(from),
        CastingRule::Unsafe => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_kind_allows_lossy_within_kind() {
        assert!(can_cast(DType::F64, DType::F32, CastingRule::SameKind));
        assert!(can_cast(DType::Cf64, DType::Cf32, CastingRule::SameKind));
        assert!(!can_cast(DType::F64, DType::Si32, CastingRule::SameKind));
    }

    #[test]
    fn same_kind_allows_raising_the_kind() {
        assert!(can_cast(DType::Si32, DType::F32, CastingRule::SameKind));
        assert!(can_cast(DType::Si64, DType::F32, CastingRule::SameKind));
        assert!(can_cast(DType::F64, DType::Cf32, CastingRule::SameKind));
        assert!(!can_cast(DType::Cf32, DType::Si32, CastingRule::SameKind));
    }

    #[test]
    fn safe_rejects_narrowing() {
        assert!(can_cast(DType::F32, DType::F64, CastingRule::Safe));
        assert!(can_cast(DType::I1, DType::Cf64, CastingRule::Safe));
        assert!(!can_cast(DType::F64, DType::F32, CastingRule::Safe));
        assert!(!can_cast(DType::Cf32, DType::F64, CastingRule::Safe));
    }

    #[test]
    fn no_and_equiv_require_identity() {
        assert!(can_cast(DType::F32, DType::F32, CastingRule::No));
        assert!(!can_cast(DType::F32, DType::F64, CastingRule::No));
        assert!(!can_cast(DType::F32, DType::F64, CastingRule::Equiv));
    }

    #[test]
    fn unsafe_allows_anything() {
        assert!(can_cast(DType::Cf64, DType::I1, CastingRule::Unsafe));
    }

    #[test]
    fn default_policy_swap_returns_previous() {
        let previous = set_default_error_policy(ErrorPolicy::ignore_all());
        assert_eq!(default_error_policy(), ErrorPolicy::ignore_all());
        set_default_error_policy(previous);
        assert_eq!(default_error_policy(), previous);
    }
}
