use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::{
    domain::{AnnotationKind, FeedStats},
    dom::{Document, Selector},
    feed::annotate::RENDERED_AT_ATTR,
};

#[derive(Debug, Serialize)]
pub struct AnnotationReport {
    pub generated_at: String,
    pub stats: FeedStats,
    pub annotations: Vec<AnnotationEntry>,
}

#[derive(Debug, Serialize)]
pub struct AnnotationEntry {
    pub kind: AnnotationKind,
    pub container: String,
    pub text: String,
    pub rendered_at: Option<String>,
}

/// Collects every live banner still attached to the document.
pub fn build_report(
    doc: &Document,
    container: &Selector,
    stats: FeedStats,
    tz: Tz,
) -> AnnotationReport {
    let annotations = doc
        .descendants(doc.root())
        .into_iter()
        .filter_map(|node| {
            let kind = doc.attr(node, "class").and_then(AnnotationKind::from_class)?;
            let owner = doc
                .closest(node, container)
                .map(|c| doc.describe(c))
                .unwrap_or_else(|| "-".to_string());
            let rendered_at = doc
                .attr(node, RENDERED_AT_ATTR)
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|ts| format_local(ts.with_timezone(&Utc), tz));
            Some(AnnotationEntry {
                kind,
                container: owner,
                text: doc.text_content(node),
                rendered_at,
            })
        })
        .collect();

    AnnotationReport {
        generated_at: format_local(Utc::now(), tz),
        stats,
        annotations,
    }
}

pub async fn write_report(path: &Path, report: &AnnotationReport) -> Result<()> {
    let body = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, body)
        .await
        .with_context(|| format!("failed to write report {}", path.display()))?;
    tracing::info!(
        target: "report",
        path = %path.display(),
        annotations = report.annotations.len(),
        "annotation report written"
    );
    Ok(())
}

fn format_local(ts: DateTime<Utc>, tz: Tz) -> String {
    ts.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S").to_string()
}
