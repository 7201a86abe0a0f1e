use crate::eval::EvalError;
use crate::retriever::RetrieverError;

/// Everything that can go wrong in this crate.
///
/// Accessors never fail outright: they return the caller's default alongside one of these in
/// [crate::Resolved::error].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("flag client expects at least 1 retriever")]
    NoRetrievers,
    #[error("unsupported flag file format {0:?}, expected yaml or json")]
    UnsupportedFormat(String),
    #[error("failed to init flag engine: {0}")]
    Init(#[source] Box<Error>),
    #[error("flag client is already initialized")]
    AlreadyInitialized,
    #[error("flag client is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Retriever(#[from] RetrieverError),
    #[error("failed to parse yaml flag file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse json flag file: {0}")]
    Json(#[from] serde_json::Error),

    /// The engine's own error, forwarded untouched by the primitive accessors.
    #[error(transparent)]
    Evaluation(#[from] EvalError),
    /// An engine error annotated with the flag it occurred on.
    #[error("failed to get flag {flag}: {source}")]
    Flag {
        flag: String,
        #[source]
        source: EvalError,
    },
    #[error("failed to {stage} for flag {flag}: {source}")]
    Marshal {
        flag: String,
        stage: MarshalStage,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to format default time for flag {flag} with layout {layout}")]
    TimeFormat { flag: String, layout: String },
    #[error("failed to parse time {value} into layout {layout}: {source}")]
    TimeParse {
        value: String,
        layout: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl Error {
    pub(crate) fn flag(flag: &str, source: EvalError) -> Self {
        Error::Flag {
            flag: flag.to_owned(),
            source,
        }
    }

    pub(crate) fn marshal(flag: &str, stage: MarshalStage, source: serde_json::Error) -> Self {
        Error::Marshal {
            flag: flag.to_owned(),
            stage,
            source,
        }
    }

    /// The engine-level error kind behind this error, if any.
    pub fn eval_error(&self) -> Option<EvalError> {
        match self {
            Error::Evaluation(e) | Error::Flag { source: e, .. } => Some(*e),
            _ => None,
        }
    }
}

/// Which step of the structured accessor's round trip failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarshalStage {
    /// Serializing the caller's default.
    EncodeDefault,
    /// Reading the serialized default back as a mapping.
    DefaultToMap,
    /// Decoding the engine's mapping into the caller's type.
    DecodeResult,
}

impl std::fmt::Display for MarshalStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            MarshalStage::EncodeDefault => "marshal default value",
            MarshalStage::DefaultToMap => "unmarshal default value to map",
            MarshalStage::DecodeResult => "unmarshal flag to target",
        };
        f.write_str(stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;

    #[test]
    fn annotated_errors_name_the_flag() {
        let err = Error::flag("ff-json", EvalError::FlagNotFound);
        assert_that!(err.to_string()).is_equal_to("failed to get flag ff-json: flag not found".to_string());
        assert_that!(err.eval_error()).contains_value(EvalError::FlagNotFound);
    }

    #[test]
    fn forwarded_errors_are_verbatim() {
        let err = Error::from(EvalError::WrongType);
        assert_that!(err.to_string()).is_equal_to(EvalError::WrongType.to_string());
    }

    #[test]
    fn init_wraps_cause() {
        let err = Error::Init(Box::new(Error::NoRetrievers));
        assert_that!(err.to_string())
            .is_equal_to("failed to init flag engine: flag client expects at least 1 retriever".to_string());
        assert_that!(err.eval_error()).is_none();
    }
}
