use std::collections::HashMap;

use crate::config::FileFormat;
use crate::flag::Flag;
use crate::Error;

/// Store is an interface for a data store that holds the feature flags an engine evaluates.
pub trait Store {
    /// Retrieve the flag with key `flag_key`.
    fn flag(&self, flag_key: &str) -> Option<&Flag>;
}

/// An immutable snapshot of parsed flags.
///
/// The engine never mutates a snapshot; a refresh builds a new one and swaps it in.
#[derive(Clone, Debug, Default)]
pub struct FlagStore {
    flags: HashMap<String, Flag>,
}

impl FlagStore {
    /// Parses a flag document in the given format.
    pub fn parse(bytes: &[u8], format: FileFormat) -> Result<Self, Error> {
        let mut flags: HashMap<String, Flag> = match format {
            FileFormat::Yaml => serde_yaml::from_slice(bytes)?,
            FileFormat::Json => serde_json::from_slice(bytes)?,
        };
        for (key, flag) in flags.iter_mut() {
            flag.key = key.clone();
        }
        Ok(FlagStore { flags })
    }

    /// Adds every flag of `other`, replacing flags with the same key.
    pub fn merge(&mut self, other: FlagStore) {
        self.flags.extend(other.flags);
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl Store for FlagStore {
    fn flag(&self, flag_key: &str) -> Option<&Flag> {
        self.flags.get(flag_key)
    }
}
