use std::collections::HashMap;

use log::warn;

use crate::AttributeValue;

/// Key substituted for an empty user identifier.
///
/// Every accessor builds its context through [ContextBuilder], so anonymous callers all land on
/// the same key and the same bucket.
pub const ANONYMOUS_KEY: &str = "anonymous";

/// The bundle of attributes a flag's targeting rules are evaluated against.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationContext {
    key: String,
    attributes: HashMap<String, AttributeValue>,
}

impl EvaluationContext {
    /// A context with only a key. Shorthand for `ContextBuilder::new(key).build()`.
    pub fn new(key: impl Into<String>) -> Self {
        ContextBuilder::new(key).build()
    }

    /// The targeting key. Never empty.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Looks up an attribute by name. `key` and `targetingKey` address the context key itself.
    pub fn value_of(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "key" | "targetingKey" => Some(AttributeValue::String(self.key.clone())),
            _ => self.attributes.get(name).cloned(),
        }
    }

    pub fn attributes(&self) -> &HashMap<String, AttributeValue> {
        &self.attributes
    }
}

/// Builds an [EvaluationContext] for a user identifier.
///
/// An empty identifier is replaced by [ANONYMOUS_KEY] when the builder is created, so a built
/// context never has an empty key.
pub struct ContextBuilder {
    key: String,
    attributes: HashMap<String, AttributeValue>,
}

impl ContextBuilder {
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            key: if key.is_empty() {
                ANONYMOUS_KEY.to_owned()
            } else {
                key
            },
            attributes: HashMap::new(),
        }
    }

    pub fn set_string(&mut self, attribute_name: &str, value: impl Into<String>) -> &mut Self {
        self.set_value(attribute_name, AttributeValue::String(value.into()))
    }

    pub fn set_bool(&mut self, attribute_name: &str, value: bool) -> &mut Self {
        self.set_value(attribute_name, AttributeValue::Bool(value))
    }

    pub fn set_float(&mut self, attribute_name: &str, value: f64) -> &mut Self {
        self.set_value(attribute_name, AttributeValue::Number(value))
    }

    /// Attaches a custom attribute.
    ///
    /// The names `key` and `targetingKey` are reserved for the context key and are ignored here,
    /// as is an empty name. Setting [AttributeValue::Null] removes the attribute.
    pub fn set_value(&mut self, attribute_name: &str, value: AttributeValue) -> &mut Self {
        match (attribute_name, value) {
            ("", _) => warn!("Provided attribute name is empty. Ignoring."),
            ("key" | "targetingKey", _) => {
                warn!("{} is reserved for the context key. Ignoring.", attribute_name)
            }
            (_, AttributeValue::Null) => {
                self.attributes.remove(attribute_name);
            }
            (_, value) => {
                self.attributes.insert(attribute_name.to_string(), value);
            }
        }
        self
    }

    pub fn build(&self) -> EvaluationContext {
        EvaluationContext {
            key: self.key.clone(),
            attributes: self.attributes.clone(),
        }
    }
}

/// Builds the context every accessor evaluates with: the user identifier (or
/// [ANONYMOUS_KEY]) plus at most one custom attribute.
pub(crate) fn evaluation_context(
    user_id: &str,
    custom: Option<(&str, AttributeValue)>,
) -> EvaluationContext {
    let mut builder = ContextBuilder::new(user_id);
    if let Some((name, value)) = custom {
        builder.set_value(name, value);
    }
    builder.build()
}
