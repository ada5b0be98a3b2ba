use anyhow::{Context, Result};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Verdict, ViralReason};

pub fn build_request(text: &str) -> AnalyzeRequest<'_> {
    AnalyzeRequest { text }
}

/// Decodes the analyze endpoint's body. Absent fields are tolerated and end
/// up as a non-qualifying verdict; only an undecodable body is an error.
pub async fn parse_verdict(response: Response) -> Result<Verdict> {
    let body: AnalyzeResponse = response
        .json()
        .await
        .context("classification service returned an undecodable body")?;
    Ok(body.into())
}

pub async fn parse_prediction(response: Response) -> Result<String> {
    let body: PredictResponse = response
        .json()
        .await
        .context("prediction service returned an undecodable body")?;
    match body.result {
        Some(Value::String(result)) => Ok(result),
        Some(Value::Null) | None => anyhow::bail!("prediction response missing result"),
        Some(other) => Ok(other.to_string()),
    }
}

#[derive(Debug, Serialize)]
pub struct AnalyzeRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub hate_prob: Option<f64>,
    #[serde(default)]
    pub viral_hate: Option<bool>,
    #[serde(default)]
    pub ad_label: Option<String>,
    #[serde(default)]
    pub ad_prob: Option<f64>,
    #[serde(default)]
    pub viral_ad: Option<bool>,
    #[serde(default)]
    pub viral_score: Option<f64>,
    #[serde(default)]
    pub viral_reason_ad: Option<String>,
}

impl From<AnalyzeResponse> for Verdict {
    fn from(body: AnalyzeResponse) -> Self {
        Verdict {
            hate_label: body.label,
            hate_probability: body.hate_prob.unwrap_or_default(),
            viral_hate: body.viral_hate.unwrap_or(false),
            ad_label: body.ad_label,
            ad_probability: body.ad_prob.unwrap_or_default(),
            viral_ad: body.viral_ad.unwrap_or(false),
            viral_reason_ad: ViralReason::from_wire(body.viral_reason_ad.as_deref()),
            viral_score: body.viral_score.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub result: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnnotationKind;

    #[test]
    fn full_response_maps_every_field() {
        let body: AnalyzeResponse = serde_json::from_str(
            r#"{"label":"혐오","hate_prob":0.87,"viral_hate":true,"viral_score":0.63,
                "ad_label":"비광고","ad_prob":0.12,"viral_ad":false,"viral_reason_ad":"none"}"#,
        )
        .unwrap();
        let verdict = Verdict::from(body);
        assert_eq!(verdict.hate_label.as_deref(), Some("혐오"));
        assert_eq!(verdict.hate_probability, 0.87);
        assert_eq!(verdict.viral_score, 0.63);
        assert_eq!(verdict.qualifying_kinds(), vec![AnnotationKind::Hate]);
    }

    #[test]
    fn missing_fields_yield_a_non_qualifying_verdict() {
        let body: AnalyzeResponse = serde_json::from_str(r#"{"label":"혐오"}"#).unwrap();
        assert!(Verdict::from(body).qualifying_kinds().is_empty());

        let error_body: AnalyzeResponse =
            serde_json::from_str(r#"{"error":"분석 중 오류 발생","detail":"boom"}"#).unwrap();
        assert_eq!(Verdict::from(error_body), Verdict::default());
    }
}
