use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::retriever::Retriever;
use crate::Error;

/// Polling interval used when [Config::polling_interval] is zero.
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(60);

/// File format assumed when [Config::file_format] is empty.
pub const DEFAULT_FILE_FORMAT: &str = "yaml";

/// Everything needed to construct a [crate::FlagEngine].
///
/// A configuration is consumed by engine construction and not retained by the facade.
#[derive(Debug, Default)]
pub struct Config {
    /// How often the engine re-reads its retrievers in the background. Zero means
    /// [DEFAULT_POLLING_INTERVAL].
    pub polling_interval: Duration,
    /// Sources of the flag document. Must not be empty; later retrievers override flags of
    /// earlier ones with the same key.
    pub retrievers: Vec<Box<dyn Retriever>>,
    /// `yaml` or `json`. Empty means [DEFAULT_FILE_FORMAT].
    pub file_format: String,
}

impl Config {
    pub fn new(retrievers: Vec<Box<dyn Retriever>>) -> Self {
        Self {
            retrievers,
            ..Default::default()
        }
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn with_file_format(mut self, format: impl Into<String>) -> Self {
        self.file_format = format.into();
        self
    }

    pub(crate) fn effective_polling_interval(&self) -> Duration {
        if self.polling_interval.is_zero() {
            DEFAULT_POLLING_INTERVAL
        } else {
            self.polling_interval
        }
    }

    pub(crate) fn effective_file_format(&self) -> Result<FileFormat, Error> {
        if self.file_format.is_empty() {
            DEFAULT_FILE_FORMAT.parse()
        } else {
            self.file_format.parse()
        }
    }
}

/// Serialization grammar of the flag document.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Yaml,
    Json,
}

impl FromStr for FileFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(FileFormat::Yaml),
            "json" => Ok(FileFormat::Json),
            _ => Err(Error::UnsupportedFormat(s.to_owned())),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Yaml => write!(f, "yaml"),
            FileFormat::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::FileRetriever;
    use spectral::prelude::*;
    use test_case::test_case;

    #[test_case("", FileFormat::Yaml)]
    #[test_case("yaml", FileFormat::Yaml)]
    #[test_case("YML", FileFormat::Yaml)]
    #[test_case("json", FileFormat::Json)]
    fn file_format_defaults_to_yaml(format: &str, expected: FileFormat) {
        let config = Config::default().with_file_format(format);
        assert_that!(config.effective_file_format().unwrap()).is_equal_to(expected);
    }

    #[test]
    fn unknown_file_format_is_rejected() {
        let config = Config::default().with_file_format("toml");
        assert!(matches!(
            config.effective_file_format(),
            Err(Error::UnsupportedFormat(f)) if f == "toml"
        ));
    }

    #[test]
    fn zero_polling_interval_uses_default() {
        let config = Config::new(vec![Box::new(FileRetriever::new("flags.goff.yaml"))]);
        assert_that!(config.effective_polling_interval()).is_equal_to(DEFAULT_POLLING_INTERVAL);

        let config = config.with_polling_interval(Duration::from_secs(5));
        assert_that!(config.effective_polling_interval()).is_equal_to(Duration::from_secs(5));
        assert_that!(config.retrievers).has_length(1);
    }
}
