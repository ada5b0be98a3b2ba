use anyhow::{Context, Result};
use reqwest::Client;

use crate::{config::ClassifierConfig, domain::Verdict};

use super::inference::{build_request, parse_prediction, parse_verdict};

/// HTTP client for the external classification service. One request per
/// call; no batching, caching or retries.
#[derive(Clone)]
pub struct ClassificationClient {
    http: Client,
    config: ClassifierConfig,
}

impl ClassificationClient {
    pub fn new(http: Client, config: ClassifierConfig) -> Self {
        Self { http, config }
    }

    pub async fn classify(&self, text: &str) -> Result<Verdict> {
        let response = self
            .http
            .post(self.config.analyze_url.clone())
            .json(&build_request(text))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.config.analyze_url))?
            .error_for_status()?;

        parse_verdict(response).await
    }

    /// Single-label prediction used by the relay path.
    pub async fn predict(&self, text: &str) -> Result<String> {
        let response = self
            .http
            .post(self.config.predict_url.clone())
            .json(&build_request(text))
            .send()
            .await
            .with_context(|| format!("failed to reach {}", self.config.predict_url))?
            .error_for_status()?;

        parse_prediction(response).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use url::Url;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn client_for(server: &MockServer) -> ClassificationClient {
        let base = Url::parse(&server.uri()).unwrap();
        ClassificationClient::new(
            Client::new(),
            ClassifierConfig {
                analyze_url: base.join("/analyze").unwrap(),
                predict_url: base.join("/predict").unwrap(),
            },
        )
    }

    #[tokio::test]
    async fn classify_posts_text_and_decodes_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .and(body_json(json!({"text": "광고 문구"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "label": "비혐오", "hate_prob": 0.02, "viral_hate": false,
                "ad_label": "광고", "ad_prob": 0.95, "viral_ad": true,
                "viral_score": 0.3, "viral_reason_ad": "count"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = client_for(&server).classify("광고 문구").await.unwrap();
        assert!(verdict.viral_ad);
        assert_eq!(verdict.viral_reason_ad, crate::domain::ViralReason::Count);
    }

    #[tokio::test]
    async fn server_error_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "x"})))
            .mount(&server)
            .await;

        assert!(client_for(&server).classify("본문").await.is_err());
    }

    #[tokio::test]
    async fn non_json_body_is_a_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        assert!(client_for(&server).classify("본문").await.is_err());
    }

    #[tokio::test]
    async fn predict_returns_result_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "혐오"})))
            .mount(&server)
            .await;

        assert_eq!(client_for(&server).predict("본문").await.unwrap(), "혐오");
    }
}
