use std::path::PathBuf;

use regex::Regex;
use thiserror::Error;
use url::Url;

use crate::dom::{Selector, SelectorError};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub selectors: SelectorConfig,
    pub script_pattern: Regex,
    pub host: HostConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub analyze_url: Url,
    pub predict_url: Url,
}

/// Host page coupling. Everything the pipeline knows about the markup.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub post_text: Selector,
    pub post_container: Selector,
    pub text_region: Selector,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Stdin,
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub feed: FeedSource,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub report_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} is not a valid URL: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{key} is not a supported selector: {source}")]
    InvalidSelector {
        key: &'static str,
        #[source]
        source: SelectorError,
    },
    #[error("{key} is not a valid pattern: {source}")]
    InvalidPattern {
        key: &'static str,
        #[source]
        source: regex::Error,
    },
}
