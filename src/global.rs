//! The process-wide client and free-function accessors bound to it.
//!
//! [new_client] installs the client, [close] tears it down. Accessors called while no client is
//! installed return their default with [Error::NotInitialized].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use log::{info, warn};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::accessors::{ListKey, Resolved, TimeLayout, TypedFlags};
use crate::config::Config;
use crate::engine::{Engine, FlagEngine};
use crate::Error;

lazy_static! {
    static ref CLIENT: RwLock<Option<Arc<FlagEngine>>> = RwLock::new(None);
}

/// Builds the process-wide client from `config`.
///
/// Fails without retrievers, when the engine rejects the configuration, or when a client is
/// already installed.
pub fn new_client(config: Config) -> Result<(), Error> {
    if config.retrievers.is_empty() {
        return Err(Error::NoRetrievers);
    }

    let mut client = CLIENT.write();
    if client.is_some() {
        warn!("flag client initialized twice");
        return Err(Error::AlreadyInitialized);
    }

    let engine = FlagEngine::new(config).map_err(|e| Error::Init(Box::new(e)))?;
    *client = Some(Arc::new(engine));
    Ok(())
}

/// Tears down the process-wide client. Does nothing if there is none.
pub fn close() {
    let engine = CLIENT.write().take();
    if let Some(engine) = engine {
        engine.close();
        info!("flag client closed");
    }
}

/// Re-reads the flag sources of the process-wide client now.
pub fn refresh() -> Result<(), Error> {
    client().ok_or(Error::NotInitialized)?.force_refresh()
}

/// When the process-wide client last loaded its flags.
pub fn cache_refresh_date() -> Option<DateTime<Utc>> {
    client().map(|engine| engine.cache_refresh_date())
}

/// The process-wide client, if one is installed.
pub fn client() -> Option<Arc<FlagEngine>> {
    CLIENT.read().clone()
}

fn with_client<T, F>(default: T, f: F) -> Resolved<T>
where
    F: FnOnce(&FlagEngine, T) -> Resolved<T>,
{
    match client() {
        Some(engine) => f(&engine, default),
        None => Resolved::fallback(default, Error::NotInitialized),
    }
}

pub fn is_enabled(flag: &str, user_id: &str, default: bool) -> Resolved<bool> {
    with_client(default, |engine, default| {
        engine.is_enabled(flag, user_id, default)
    })
}

pub fn is_enabled_by_id(
    flag: &str,
    user_id: &str,
    id: &str,
    attribute: &str,
    default: bool,
) -> Resolved<bool> {
    with_client(default, |engine, default| {
        engine.is_enabled_by_id(flag, user_id, id, attribute, default)
    })
}

pub fn get_int(flag: &str, user_id: &str, default: i64) -> Resolved<i64> {
    with_client(default, |engine, default| {
        engine.get_int(flag, user_id, default)
    })
}

pub fn get_float(flag: &str, user_id: &str, default: f64) -> Resolved<f64> {
    with_client(default, |engine, default| {
        engine.get_float(flag, user_id, default)
    })
}

pub fn get_string(flag: &str, user_id: &str, default: impl Into<String>) -> Resolved<String> {
    with_client(default.into(), |engine, default| {
        engine.get_string(flag, user_id, default)
    })
}

pub fn get_time(
    flag: &str,
    user_id: &str,
    layout: &TimeLayout,
    default: DateTime<Utc>,
) -> Resolved<DateTime<Utc>> {
    with_client(default, |engine, default| {
        engine.get_time(flag, user_id, layout, default)
    })
}

pub fn get_json_struct<T>(flag: &str, user_id: &str, default: T) -> Resolved<T>
where
    T: Serialize + DeserializeOwned,
{
    with_client(default, |engine, default| {
        engine.get_json_struct(flag, user_id, default)
    })
}

pub fn get_json_map(
    flag: &str,
    user_id: &str,
    default: Map<String, Value>,
) -> Resolved<Map<String, Value>> {
    with_client(default, |engine, default| {
        engine.get_json_map(flag, user_id, default)
    })
}

pub fn is_enabled_by_id_list<K: ListKey>(
    flag: &str,
    user_id: &str,
    lookup: K,
    default: bool,
) -> Resolved<bool> {
    with_client(default, |engine, default| {
        engine.is_enabled_by_id_list(flag, user_id, lookup, default)
    })
}
