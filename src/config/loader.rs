use std::{env, path::PathBuf};

use regex::Regex;
use url::Url;

use crate::{dom::Selector, feed::filter::HANGUL_PATTERN};

use super::env::{
    AppConfig, ClassifierConfig, ConfigError, DirectoryConfig, FeedSource, HostConfig,
    LoggingConfig, SelectorConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_lookup(|key| env::var(key).ok())
}

impl AppConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let classifier = ClassifierConfig {
            analyze_url: parse_url(
                "ANALYZE_API_URL",
                &var("ANALYZE_API_URL", "http://127.0.0.1:5000/analyze"),
            )?,
            predict_url: parse_url(
                "PREDICT_API_URL",
                &var("PREDICT_API_URL", "http://127.0.0.1:5000/predict"),
            )?,
        };

        let selectors = SelectorConfig {
            post_text: parse_selector(
                "POST_TEXT_SELECTOR",
                &var("POST_TEXT_SELECTOR", r#"div[data-testid="tweetText"] span"#),
            )?,
            post_container: parse_selector(
                "POST_CONTAINER_SELECTOR",
                &var("POST_CONTAINER_SELECTOR", r#"[data-testid="tweet"]"#),
            )?,
            text_region: parse_selector(
                "POST_TEXT_REGION_SELECTOR",
                &var("POST_TEXT_REGION_SELECTOR", r#"div[data-testid="tweetText"]"#),
            )?,
        };

        let script_pattern = Regex::new(&var("TARGET_SCRIPT_PATTERN", HANGUL_PATTERN)).map_err(
            |source| ConfigError::InvalidPattern {
                key: "TARGET_SCRIPT_PATTERN",
                source,
            },
        )?;

        let host = HostConfig {
            feed: match var("HOST_FEED", "-").as_str() {
                "-" => FeedSource::Stdin,
                path => FeedSource::File(PathBuf::from(path)),
            },
        };

        let directories = DirectoryConfig {
            logs_dir: var("LOGS_DIR", "logs"),
            data_dir: var("DATA_DIR", "data"),
            report_filename: var("REPORT_FILENAME", "annotations.json"),
        };

        let logging = LoggingConfig {
            level: var("LOG_LEVEL", "info"),
        };

        let timezone = var("FEED_TIMEZONE", "Asia/Seoul");

        Ok(Self {
            classifier,
            selectors,
            script_pattern,
            host,
            directories,
            logging,
            timezone,
        })
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::InvalidUrl { key, source })
}

fn parse_selector(key: &'static str, value: &str) -> Result<Selector, ConfigError> {
    value
        .parse::<Selector>()
        .map_err(|source| ConfigError::InvalidSelector { key, source })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_target_the_local_service_and_tweet_markup() {
        let config = load(&[]).unwrap();
        assert_eq!(
            config.classifier.analyze_url.as_str(),
            "http://127.0.0.1:5000/analyze"
        );
        assert_eq!(
            config.selectors.post_text.to_string(),
            r#"div[data-testid="tweetText"] span"#
        );
        assert_eq!(config.host.feed, FeedSource::Stdin);
        assert!(config.script_pattern.is_match("한"));
        assert!(!config.script_pattern.is_match("漢字"));
        assert_eq!(config.timezone, "Asia/Seoul");
    }

    #[test]
    fn overrides_are_applied_and_blank_values_ignored() {
        let config = load(&[
            ("HOST_FEED", "feed.jsonl"),
            ("POST_CONTAINER_SELECTOR", "article.post"),
            ("POST_TEXT_SELECTOR", r#"div[data-testid="tweetText"] > span"#),
            ("LOG_LEVEL", "  "),
        ])
        .unwrap();
        assert_eq!(config.host.feed, FeedSource::File(PathBuf::from("feed.jsonl")));
        assert_eq!(config.selectors.post_container.to_string(), "article.post");
        assert_eq!(
            config.selectors.post_text.to_string(),
            r#"div[data-testid="tweetText"] > span"#
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn invalid_values_are_reported_with_their_key() {
        let err = load(&[("ANALYZE_API_URL", "not a url")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { key: "ANALYZE_API_URL", .. }));

        let err = load(&[("POST_TEXT_SELECTOR", "div >")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSelector { key: "POST_TEXT_SELECTOR", .. }));

        let err = load(&[("TARGET_SCRIPT_PATTERN", "[")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern { .. }));
    }
}
