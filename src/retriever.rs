use std::fmt;
use std::fs;
use std::path::PathBuf;

/// Why a [Retriever] could not produce a flag document.
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    #[error("failed to read flag file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0}")]
    Other(String),
}

/// A source of raw flag documents.
///
/// The engine treats retrievers as black boxes: it asks each one for bytes on every refresh and
/// parses them in the configured [crate::FileFormat].
pub trait Retriever: fmt::Debug + Send + Sync {
    fn retrieve(&self) -> Result<Vec<u8>, RetrieverError>;
}

/// Reads the flag document from a local file.
#[derive(Clone, Debug)]
pub struct FileRetriever {
    path: PathBuf,
}

impl FileRetriever {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Retriever for FileRetriever {
    fn retrieve(&self) -> Result<Vec<u8>, RetrieverError> {
        fs::read(&self.path).map_err(|source| RetrieverError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
