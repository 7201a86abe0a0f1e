#![cfg(test)]

use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::engine::FlagEngine;
use crate::retriever::FileRetriever;

pub const YAML_FLAGS: &str = "flags.goff.yaml";
pub const JSON_FLAGS: &str = "flags.goff.json";

pub const NOT_EXISTS_FLAG: &str = "not-exists";
pub const FLOAT_FLAG: &str = "ff-float";
pub const NUMBER_FLAG: &str = "ff-number";
pub const DESCRIPTION_FLAG: &str = "ff-description";
pub const IS_ENABLED_FLAG: &str = "is-enabled";
pub const TIME_FLAG: &str = "cr-start";
pub const DISABLED_TIME_FLAG: &str = "cr-disabled";
pub const JSON_FLAG: &str = "ff-json";
pub const ENABLED_BY_ID_FLAG: &str = "is-enabled-for-user";
pub const ANONYMOUS_TARGET_FLAG: &str = "is-enabled-for-anonymous";
pub const ID_LIST_INT_FLAG: &str = "ff-json-list";
pub const ID_LIST_STRING_FLAG: &str = "ff-json-list-string";
pub const ID_LIST_MIXED_FLAG: &str = "ff-json-list-mixed";

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("testdata")
        .join(name)
}

/// An explicit engine over one of the canonical fixtures, in the format its name implies.
pub fn setup_engine(name: &str) -> FlagEngine {
    FlagEngine::new(config_for(name)).expect("fixture engine should start")
}

pub fn config_for(name: &str) -> Config {
    let format = if name.contains("json") { "json" } else { "yaml" };
    Config::new(vec![Box::new(FileRetriever::new(fixture(name)))])
        .with_polling_interval(Duration::from_secs(600))
        .with_file_format(format)
}
