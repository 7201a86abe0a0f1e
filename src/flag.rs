use std::collections::HashMap;

use log::debug;
use serde::Deserialize;

use crate::context::EvaluationContext;
use crate::eval::{Detail, EvalError, Reason};
use crate::flag_value::FlagValue;
use crate::rule::FlagRule;
use crate::variation::{BucketResult, VariationName, VariationOrPercentage};

/// A flag as declared in the flag document.
///
/// The key is the document's map key rather than a field, so it is filled in by
/// [crate::FlagStore] after parsing.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    #[serde(skip)]
    pub key: String,
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub(crate) disable: bool,

    pub(crate) variations: HashMap<VariationName, FlagValue>,
    #[serde(default)]
    pub(crate) targeting: Vec<FlagRule>,
    pub(crate) default_rule: VariationOrPercentage,
    /// Context attribute percentage splits bucket on instead of the context key.
    #[serde(default)]
    pub(crate) bucketing_key: Option<String>,

    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Flag {
    pub fn variation(&self, name: &str, reason: Reason) -> Detail<&FlagValue> {
        Detail {
            value: self.variations.get(name),
            variation: Some(name.to_owned()),
            reason,
        }
        .should_have_value(EvalError::MalformedFlag)
    }

    pub(crate) fn resolve_variation_or_percentage<'a>(
        &'a self,
        vp: &'a VariationOrPercentage,
        context: &EvaluationContext,
    ) -> Result<BucketResult<'a>, EvalError> {
        vp.variation(&self.key, &self.bucket_by(context))
            .ok_or(EvalError::MalformedFlag)
    }

    // Contexts lacking a usable bucketing attribute fall back to their key.
    fn bucket_by(&self, context: &EvaluationContext) -> String {
        if let Some(attribute) = &self.bucketing_key {
            match context.value_of(attribute).and_then(|v| v.as_bucketable()) {
                Some(value) => return value,
                None => debug!(
                    "flag {} buckets on {}, which context {} cannot provide",
                    self.key,
                    attribute,
                    context.key()
                ),
            }
        }
        context.key().to_owned()
    }

    #[cfg(test)]
    pub(crate) fn from_yaml(key: &str, yaml: &str) -> Self {
        let mut flag: Flag = serde_yaml::from_str(yaml).expect("flag should parse");
        flag.key = key.to_owned();
        flag
    }
}
