use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use crate::config::{Config, FileFormat};
use crate::context::EvaluationContext;
use crate::eval::{evaluate, EvalError};
use crate::flag_value::FlagValue;
use crate::poller::Poller;
use crate::retriever::Retriever;
use crate::store::{FlagStore, Store};
use crate::Error;

/// The weakly-typed flag engine the typed accessors are layered on.
///
/// Each variation primitive returns the flag's value for `context`, or `default` when the flag
/// is disabled. On error the caller is expected to fall back to its own default. Structured
/// values carry every number as an f64.
pub trait Engine: Send + Sync {
    fn bool_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: bool,
    ) -> Result<bool, EvalError>;

    fn int_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: i64,
    ) -> Result<i64, EvalError>;

    fn float_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: f64,
    ) -> Result<f64, EvalError>;

    fn string_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: String,
    ) -> Result<String, EvalError>;

    fn json_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: Map<String, Value>,
    ) -> Result<Map<String, Value>, EvalError>;

    fn json_array_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: Vec<Value>,
    ) -> Result<Vec<Value>, EvalError>;

    /// Re-reads the flag sources outside of the polling schedule.
    fn force_refresh(&self) -> Result<(), Error>;

    /// When the flags were last (re)loaded.
    fn cache_refresh_date(&self) -> DateTime<Utc>;
}

struct Snapshot {
    store: Arc<FlagStore>,
    refreshed_at: DateTime<Utc>,
}

/// State shared between a [FlagEngine] and its poller.
pub(crate) struct Shared {
    retrievers: Vec<Box<dyn Retriever>>,
    format: FileFormat,
    state: RwLock<Snapshot>,
    closed: AtomicBool,
}

impl Shared {
    fn load(retrievers: &[Box<dyn Retriever>], format: FileFormat) -> Result<FlagStore, Error> {
        let mut store = FlagStore::default();
        for retriever in retrievers {
            let bytes = retriever.retrieve()?;
            store.merge(FlagStore::parse(&bytes, format)?);
        }
        Ok(store)
    }

    /// Loads every retriever and swaps in the result. On failure the previous flags and
    /// timestamp stay in place.
    pub(crate) fn refresh(&self) -> Result<(), Error> {
        let store = Shared::load(&self.retrievers, self.format)?;
        let flag_count = store.len();

        let mut state = self.state.write();
        let now = Utc::now();
        // the timestamp never goes backward, even if the clock does
        state.refreshed_at = if now > state.refreshed_at {
            now
        } else {
            state.refreshed_at + chrono::Duration::nanoseconds(1)
        };
        state.store = Arc::new(store);

        debug!("refreshed {} flags at {}", flag_count, state.refreshed_at);
        Ok(())
    }

    fn snapshot(&self) -> Arc<FlagStore> {
        Arc::clone(&self.state.read().store)
    }
}

/// The bundled [Engine]: evaluates the crate's flag document loaded from retrievers,
/// refreshing it in the background every polling interval.
///
/// Readers evaluate against an immutable snapshot, so a refresh can interleave with in-flight
/// evaluations; each one observes either the old flags or the new ones.
pub struct FlagEngine {
    shared: Arc<Shared>,
    poller: Mutex<Option<Poller>>,
}

impl FlagEngine {
    /// Loads the flags once and starts the poller.
    ///
    /// Fails when there are no retrievers, the file format is unknown, or the initial load
    /// fails.
    pub fn new(config: Config) -> Result<Self, Error> {
        if config.retrievers.is_empty() {
            return Err(Error::NoRetrievers);
        }
        let format = config.effective_file_format()?;
        let interval = config.effective_polling_interval();

        let store = Shared::load(&config.retrievers, format)?;
        let flag_count = store.len();
        let shared = Arc::new(Shared {
            retrievers: config.retrievers,
            format,
            state: RwLock::new(Snapshot {
                store: Arc::new(store),
                refreshed_at: Utc::now(),
            }),
            closed: AtomicBool::new(false),
        });

        let poller = Poller::start(Arc::clone(&shared), interval);
        info!(
            "flag engine started with {} flags ({} format, polling every {:?})",
            flag_count, format, interval
        );

        Ok(FlagEngine {
            shared,
            poller: Mutex::new(Some(poller)),
        })
    }

    /// Stops the poller. Evaluations afterwards fail with [EvalError::ClientNotReady].
    /// Closing twice is harmless.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(mut poller) = self.poller.lock().take() {
            poller.stop();
            info!("flag engine closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Number of flags in the current snapshot.
    pub fn flag_count(&self) -> usize {
        self.shared.snapshot().len()
    }

    fn variation<T, F>(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: T,
        f: F,
    ) -> Result<T, EvalError>
    where
        F: FnOnce(&FlagValue) -> Option<T>,
    {
        if self.is_closed() {
            return Err(EvalError::ClientNotReady);
        }
        let store = self.shared.snapshot();
        let flag = match store.flag(flag_key) {
            Some(flag) => flag,
            None => {
                debug!("flag {} not found", flag_key);
                return Err(EvalError::FlagNotFound);
            }
        };
        evaluate(flag, context).try_map(f, default)
    }
}

impl Engine for FlagEngine {
    fn bool_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: bool,
    ) -> Result<bool, EvalError> {
        self.variation(flag_key, context, default, FlagValue::as_bool)
    }

    fn int_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: i64,
    ) -> Result<i64, EvalError> {
        self.variation(flag_key, context, default, FlagValue::as_int)
    }

    fn float_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: f64,
    ) -> Result<f64, EvalError> {
        self.variation(flag_key, context, default, FlagValue::as_float)
    }

    fn string_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: String,
    ) -> Result<String, EvalError> {
        self.variation(flag_key, context, default, FlagValue::as_string)
    }

    fn json_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: Map<String, Value>,
    ) -> Result<Map<String, Value>, EvalError> {
        self.variation(flag_key, context, default, FlagValue::as_object)
    }

    fn json_array_variation(
        &self,
        flag_key: &str,
        context: &EvaluationContext,
        default: Vec<Value>,
    ) -> Result<Vec<Value>, EvalError> {
        self.variation(flag_key, context, default, FlagValue::as_array)
    }

    fn force_refresh(&self) -> Result<(), Error> {
        if self.is_closed() {
            return Err(Error::Evaluation(EvalError::ClientNotReady));
        }
        self.shared.refresh()
    }

    fn cache_refresh_date(&self) -> DateTime<Utc> {
        self.shared.state.read().refreshed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::retriever::FileRetriever;
    use crate::test_common::{fixture, setup_engine, JSON_FLAGS, YAML_FLAGS};
    use spectral::prelude::*;
    use std::io::Write;
    use test_case::test_case;

    #[test_case(YAML_FLAGS)]
    #[test_case(JSON_FLAGS)]
    fn primitive_variations(file: &str) {
        let engine = setup_engine(file);
        let context = ContextBuilder::new("1").build();

        assert_that!(engine.float_variation("ff-float", &context, 1.11)).is_equal_to(Ok(3.14159));
        assert_that!(engine.int_variation("ff-number", &context, 69)).is_equal_to(Ok(9081));
        assert_that!(engine.bool_variation("is-enabled", &context, false)).is_equal_to(Ok(true));
        assert_that!(engine.string_variation("ff-description", &context, "hello".into()))
            .is_equal_to(Ok("Something about chocolate eggs".to_string()));
    }

    #[test]
    fn missing_flag_and_wrong_type() {
        let engine = setup_engine(YAML_FLAGS);
        let context = ContextBuilder::new("1").build();

        assert_that!(engine.float_variation("not-exists", &context, 1.11))
            .is_equal_to(Err(EvalError::FlagNotFound));
        assert_that!(engine.bool_variation("ff-description", &context, false))
            .is_equal_to(Err(EvalError::WrongType));
    }

    #[test]
    fn disabled_flag_returns_default_without_error() {
        let engine = setup_engine(YAML_FLAGS);
        let context = ContextBuilder::new("1").build();

        assert_that!(engine.bool_variation("ff-disabled", &context, false)).is_equal_to(Ok(false));
        assert_that!(engine.bool_variation("ff-disabled", &context, true)).is_equal_to(Ok(true));
    }

    #[test]
    fn structured_variations_carry_floats() {
        let engine = setup_engine(YAML_FLAGS);
        let context = ContextBuilder::new("1").build();

        let map = engine.json_variation("ff-json", &context, Map::new()).unwrap();
        assert_that!(map.get("p50").and_then(Value::as_f64)).contains_value(40.0);
        assert!(map["p50"].is_f64());

        let list = engine
            .json_array_variation("ff-json-list", &context, vec![])
            .unwrap();
        assert_that!(list).has_length(3);
        assert!(list.iter().all(Value::is_f64));

        assert_that!(engine.json_array_variation("ff-json", &context, vec![]))
            .is_equal_to(Err(EvalError::WrongType));
    }

    #[test]
    fn construction_failures() {
        assert!(matches!(
            FlagEngine::new(Config::default()),
            Err(Error::NoRetrievers)
        ));

        let missing = Config::new(vec![Box::new(FileRetriever::new("non-existent.goff.yaml"))]);
        assert!(matches!(FlagEngine::new(missing), Err(Error::Retriever(_))));

        let wrong_format = Config::new(vec![Box::new(FileRetriever::new(fixture(YAML_FLAGS)))])
            .with_file_format("json");
        assert!(matches!(FlagEngine::new(wrong_format), Err(Error::Json(_))));
    }

    #[test]
    fn refresh_advances_timestamp_and_picks_up_new_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&std::fs::read(fixture(YAML_FLAGS)).unwrap())
            .unwrap();
        file.flush().unwrap();

        let engine = FlagEngine::new(Config::new(vec![Box::new(FileRetriever::new(file.path()))]))
            .unwrap();
        let context = ContextBuilder::new("1").build();
        let before = engine.cache_refresh_date();

        file.write_all(
            b"\nff-test:\n  metadata:\n    description: test\n  variations:\n    e: 2.71828\n  defaultRule:\n    variation: e\n",
        )
        .unwrap();
        file.flush().unwrap();

        assert_that!(engine.cache_refresh_date()).is_equal_to(before);
        assert_that!(engine.float_variation("ff-test", &context, 0.0))
            .is_equal_to(Err(EvalError::FlagNotFound));

        engine.force_refresh().unwrap();

        assert_that!(engine.cache_refresh_date()).is_greater_than(before);
        assert_that!(engine.float_variation("ff-test", &context, 0.0)).is_equal_to(Ok(2.71828));
    }

    #[test]
    fn failed_refresh_keeps_previous_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&std::fs::read(fixture(YAML_FLAGS)).unwrap())
            .unwrap();
        file.flush().unwrap();

        let engine = FlagEngine::new(Config::new(vec![Box::new(FileRetriever::new(file.path()))]))
            .unwrap();
        let before = engine.cache_refresh_date();
        let flags = engine.flag_count();

        file.write_all(b"\nbroken: [unclosed\n").unwrap();
        file.flush().unwrap();

        assert_that!(engine.force_refresh()).is_err();
        assert_that!(engine.cache_refresh_date()).is_equal_to(before);
        assert_that!(engine.flag_count()).is_equal_to(flags);
    }

    #[test]
    fn closed_engine_is_not_ready() {
        let engine = setup_engine(YAML_FLAGS);
        engine.close();
        engine.close();

        let context = ContextBuilder::new("1").build();
        assert_that!(engine.is_closed()).is_true();
        assert_that!(engine.bool_variation("is-enabled", &context, false))
            .is_equal_to(Err(EvalError::ClientNotReady));
        assert!(engine.force_refresh().is_err());
    }

    #[test]
    fn later_retrievers_override_earlier_ones() {
        let mut override_file = tempfile::NamedTempFile::new().unwrap();
        override_file
            .write_all(b"ff-float:\n  variations:\n    e: 2.71828\n  defaultRule:\n    variation: e\n")
            .unwrap();
        override_file.flush().unwrap();

        let engine = FlagEngine::new(Config::new(vec![
            Box::new(FileRetriever::new(fixture(YAML_FLAGS))),
            Box::new(FileRetriever::new(override_file.path())),
        ]))
        .unwrap();

        let context = ContextBuilder::new("1").build();
        assert_that!(engine.float_variation("ff-float", &context, 0.0)).is_equal_to(Ok(2.71828));
        assert_that!(engine.int_variation("ff-number", &context, 0)).is_equal_to(Ok(9081));
    }
}
