use log::warn;

use crate::context::EvaluationContext;
use crate::flag::Flag;
use crate::flag_value::FlagValue;
use crate::variation::{BucketResult, VariationName};

/// Evaluate a feature flag for the specified [EvaluationContext].
///
/// A disabled flag yields an empty [Detail] with [Reason::Disabled]: callers substitute their own
/// default, and no error is reported. Otherwise the first enabled targeting rule that matches
/// decides the variation, falling back to the flag's default rule.
pub fn evaluate<'a>(flag: &'a Flag, context: &EvaluationContext) -> Detail<&'a FlagValue> {
    if flag.disable {
        return Detail::empty(Reason::Disabled);
    }

    for (rule_index, rule) in flag.targeting.iter().enumerate() {
        if rule.disable || !rule.matches(context) {
            continue;
        }
        return match flag.resolve_variation_or_percentage(&rule.variation_or_percentage, context) {
            Ok(BucketResult {
                variation,
                in_split,
            }) => {
                let reason = Reason::TargetingMatch {
                    rule_index,
                    rule_name: rule.name.clone().unwrap_or_default(),
                    in_split,
                };
                flag.variation(variation, reason)
            }
            Err(e) => {
                warn!("targeting rule {} of flag {} is malformed", rule_index, flag.key);
                Detail::err(e)
            }
        };
    }

    match flag.resolve_variation_or_percentage(&flag.default_rule, context) {
        Ok(BucketResult {
            variation,
            in_split,
        }) => {
            let reason = if in_split {
                Reason::Split
            } else {
                Reason::Default
            };
            flag.variation(variation, reason)
        }
        Err(e) => {
            warn!("default rule of flag {} is malformed", flag.key);
            Detail::err(e)
        }
    }
}

/// A Detail instance is returned from [evaluate], combining the result of a flag evaluation with
/// an explanation of how it was calculated.
#[derive(Clone, Debug, PartialEq)]
pub struct Detail<T> {
    /// The selected variation's value, or None when the flag is disabled or evaluation failed.
    pub value: Option<T>,

    /// The name of the selected variation, if any.
    pub variation: Option<VariationName>,

    pub reason: Reason,
}

impl<T> Detail<T> {
    /// Returns a detail with value and variation of None.
    pub fn empty(reason: Reason) -> Detail<T> {
        Detail {
            value: None,
            variation: None,
            reason,
        }
    }

    /// Returns a detail response using the provided error as the [Detail::reason].
    pub fn err(error: EvalError) -> Detail<T> {
        Detail::empty(Reason::Error { error })
    }

    /// Sets the [Detail::reason] to the provided error if the current detail instance does not
    /// have a value set.
    pub fn should_have_value(mut self, e: EvalError) -> Detail<T> {
        if self.value.is_none() {
            self.variation = None;
            self.reason = Reason::Error { error: e };
        }
        self
    }

    /// Collapses the detail into the value handed to a caller.
    ///
    /// An error reason becomes `Err`; a detail without a value (a disabled flag) becomes the
    /// caller's `default`; otherwise `f` converts the value, and a failed conversion is
    /// [EvalError::WrongType].
    pub fn try_map<U, F>(self, f: F, default: U) -> Result<U, EvalError>
    where
        F: FnOnce(T) -> Option<U>,
    {
        if let Reason::Error { error } = self.reason {
            return Err(error);
        }
        match self.value {
            None => Ok(default),
            Some(value) => f(value).ok_or(EvalError::WrongType),
        }
    }
}

/// Reason describes the reason that a flag evaluation produced a particular value.
#[derive(Clone, Debug, PartialEq)]
pub enum Reason {
    /// The flag is disabled; the caller's default applies.
    Disabled,
    /// A targeting rule matched.
    TargetingMatch {
        rule_index: usize,
        rule_name: String,
        /// True when the rule served a percentage split rather than a fixed variation.
        in_split: bool,
    },
    /// No rule matched and the default rule served a percentage split.
    Split,
    /// No rule matched and the default rule served a fixed variation.
    Default,
    /// The flag could not be evaluated; the caller's default applies.
    Error { error: EvalError },
}

/// Why a flag could not be evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// The engine has no flags loaded yet, or has been closed.
    #[error("flag engine is not ready")]
    ClientNotReady,
    /// No flag with the requested key exists.
    #[error("flag not found")]
    FlagNotFound,
    /// The flag names a variation it does not declare, or a rule serves nothing.
    #[error("flag is malformed")]
    MalformedFlag,
    /// The selected variation is not of the requested type.
    #[error("flag value has the wrong type")]
    WrongType,
}
