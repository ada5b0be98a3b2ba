use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    task::JoinSet,
};

use crate::{ai::ClassificationClient, infrastructure::shutdown::ShutdownListener};

pub const ANALYZE_ACTION: &str = "analyzeTweet";
pub const FAILURE_RESULT: &str = "분석 실패";

/// Message from another execution context asking for a one-shot prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    pub action: String,
    #[serde(rename = "tweetText", default)]
    pub tweet_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub result: String,
}

#[derive(Debug, Clone)]
pub struct RelayEnvelope {
    pub id: Option<String>,
    pub request: RelayRequest,
}

/// Forwards relay requests to the prediction endpoint. Independent of the
/// feed pipeline: no dedup, no banners, no document access.
pub struct RelayService {
    client: Arc<ClassificationClient>,
}

impl RelayService {
    pub fn new(client: Arc<ClassificationClient>) -> Self {
        Self { client }
    }

    /// `None` for actions this relay does not answer.
    pub async fn handle(&self, request: &RelayRequest) -> Option<String> {
        if request.action != ANALYZE_ACTION {
            tracing::debug!(target: "relay", action = %request.action, "ignoring relay action");
            return None;
        }
        match self.client.predict(&request.tweet_text).await {
            Ok(result) => Some(result),
            Err(err) => {
                tracing::error!(target: "relay", error = %err, "prediction request failed");
                Some(FAILURE_RESULT.to_string())
            }
        }
    }

    /// Answers requests concurrently, writing one JSON line per reply in
    /// completion order. Returns the writer once the request channel closes
    /// and every reply is out, or on shutdown.
    pub async fn serve<W>(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<RelayEnvelope>,
        mut out: W,
        mut shutdown: ShutdownListener,
    ) -> Result<W>
    where
        W: AsyncWrite + Unpin,
    {
        let mut pending = JoinSet::new();
        let mut open = true;
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    if !pending.is_empty() {
                        tracing::info!(target: "relay", abandoned = pending.len(), "shutdown requested; dropping relay requests");
                    }
                    break;
                }
                envelope = requests.recv(), if open => match envelope {
                    Some(RelayEnvelope { id, request }) => {
                        let service = self.clone();
                        pending.spawn(async move {
                            service
                                .handle(&request)
                                .await
                                .map(|result| RelayResponse { id, result })
                        });
                    }
                    None => open = false,
                },
                Some(joined) = pending.join_next(), if !pending.is_empty() => match joined {
                    Ok(Some(response)) => write_reply(&mut out, &response).await?,
                    Ok(None) => {}
                    Err(err) => tracing::error!(target: "relay", error = %err, "relay task failed"),
                },
            }
            if !open && pending.is_empty() {
                break;
            }
        }
        out.flush().await?;
        Ok(out)
    }
}

async fn write_reply<W>(out: &mut W, response: &RelayResponse) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(response)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    out.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use reqwest::Client;
    use serde_json::json;
    use url::Url;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::{config::ClassifierConfig, infrastructure::shutdown::Shutdown};

    fn service_for(server: &MockServer) -> Arc<RelayService> {
        let base = Url::parse(&server.uri()).unwrap();
        let client = ClassificationClient::new(
            Client::new(),
            ClassifierConfig {
                analyze_url: base.join("/analyze").unwrap(),
                predict_url: base.join("/predict").unwrap(),
            },
        );
        Arc::new(RelayService::new(Arc::new(client)))
    }

    fn request(action: &str, text: &str) -> RelayRequest {
        RelayRequest {
            action: action.into(),
            tweet_text: text.into(),
        }
    }

    #[test]
    fn wire_names_match_extension_messages() {
        let parsed: RelayRequest =
            serde_json::from_str(r#"{"action":"analyzeTweet","tweetText":"안녕"}"#).unwrap();
        assert_eq!(parsed, request("analyzeTweet", "안녕"));
        let reply = serde_json::to_string(&RelayResponse {
            id: None,
            result: "ok".into(),
        })
        .unwrap();
        assert_eq!(reply, r#"{"result":"ok"}"#);
    }

    #[tokio::test]
    async fn forwards_text_and_returns_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(body_json(json!({"text": "혐오 문장"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "혐오"})))
            .expect(1)
            .mount(&server)
            .await;

        let result = service_for(&server).handle(&request(ANALYZE_ACTION, "혐오 문장")).await;
        assert_eq!(result.as_deref(), Some("혐오"));
    }

    #[tokio::test]
    async fn failure_is_reported_as_fixed_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = service_for(&server).handle(&request(ANALYZE_ACTION, "본문")).await;
        assert_eq!(result.as_deref(), Some(FAILURE_RESULT));
    }

    #[tokio::test]
    async fn other_actions_get_no_reply_and_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        assert!(service_for(&server).handle(&request("ping", "본문")).await.is_none());
    }

    #[tokio::test]
    async fn serve_writes_one_line_per_answered_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "비혐오"})))
            .mount(&server)
            .await;

        let (tx, rx) = mpsc::channel(4);
        let (_shutdown, listener) = Shutdown::new();
        tx.send(RelayEnvelope {
            id: Some("1".into()),
            request: request(ANALYZE_ACTION, "첫째"),
        })
        .await
        .unwrap();
        tx.send(RelayEnvelope {
            id: Some("2".into()),
            request: request("unknown", "둘째"),
        })
        .await
        .unwrap();
        drop(tx);

        let out = service_for(&server)
            .serve(rx, Vec::new(), listener)
            .await
            .unwrap();
        let lines: Vec<RelayResponse> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(
            lines,
            vec![RelayResponse {
                id: Some("1".into()),
                result: "비혐오".into()
            }]
        );
    }
}
