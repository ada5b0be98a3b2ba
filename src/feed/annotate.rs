use chrono::Utc;

use crate::{
    domain::{AnnotationKind, Verdict, ViralReason},
    dom::{Document, DomError, NodeId, Selector},
};

pub const RENDERED_AT_ATTR: &str = "data-rendered-at";

const BASE_STYLE: &str = "color: white; padding: 10px; border-radius: 12px; \
margin-bottom: 8px; font-size: 0.8em; font-weight: bold; text-align: left; \
white-space: pre-line; box-shadow: 0 4px 8px rgba(0, 0, 0, 0.15); \
font-family: Segoe UI, sans-serif; display: inline-block; max-width: 360px";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Created(NodeId),
    Updated(NodeId),
    /// The container left the document before the verdict arrived.
    Detached,
    MissingTextRegion,
}

/// Inserts or refreshes verdict banners right above a post's text region.
///
/// Posts can nest (quoted posts are containers too), so lookups only consider
/// the text region whose nearest container is the post being annotated.
#[derive(Debug, Clone)]
pub struct Annotator {
    container: Selector,
    text_region: Selector,
}

impl Annotator {
    pub fn new(container: Selector, text_region: Selector) -> Self {
        Self {
            container,
            text_region,
        }
    }

    /// Renders every banner kind the verdict qualifies for.
    pub fn apply(
        &self,
        doc: &mut Document,
        container: NodeId,
        verdict: &Verdict,
    ) -> Vec<(AnnotationKind, RenderOutcome)> {
        let mut outcomes = Vec::new();
        for kind in verdict.qualifying_kinds() {
            match self.render(doc, container, kind, verdict) {
                Ok(outcome) => outcomes.push((kind, outcome)),
                Err(err) => {
                    tracing::warn!(
                        target: "annotate",
                        error = %err,
                        %kind,
                        container = %doc.describe(container),
                        "failed to render banner"
                    );
                }
            }
        }
        outcomes
    }

    pub fn render(
        &self,
        doc: &mut Document,
        container: NodeId,
        kind: AnnotationKind,
        verdict: &Verdict,
    ) -> Result<RenderOutcome, DomError> {
        if !doc.is_connected(container) {
            return Ok(RenderOutcome::Detached);
        }
        let Some(region) = self.own_text_region(doc, container) else {
            return Ok(RenderOutcome::MissingTextRegion);
        };
        let Some(parent) = doc.parent(region) else {
            return Ok(RenderOutcome::MissingTextRegion);
        };
        let content = banner_text(kind, verdict);
        let rendered_at = Utc::now().to_rfc3339();

        if let Some(existing) = banner_under(doc, parent, kind) {
            doc.set_text(existing, &content)?;
            doc.set_attr(existing, RENDERED_AT_ATTR, &rendered_at)?;
            return Ok(RenderOutcome::Updated(existing));
        }

        let banner = doc.create_element("div");
        doc.set_attr(banner, "class", kind.class_name())?;
        doc.set_attr(
            banner,
            "style",
            &format!("background-color: {}; {BASE_STYLE}", kind.accent_color()),
        )?;
        doc.set_attr(banner, RENDERED_AT_ATTR, &rendered_at)?;
        doc.set_text(banner, &content)?;
        doc.insert_before(parent, banner, Some(region))?;
        Ok(RenderOutcome::Created(banner))
    }

    /// The live banner of `kind` belonging to `container`, if any.
    pub fn find_banner(
        &self,
        doc: &Document,
        container: NodeId,
        kind: AnnotationKind,
    ) -> Option<NodeId> {
        let region = self.own_text_region(doc, container)?;
        banner_under(doc, doc.parent(region)?, kind)
    }

    fn own_text_region(&self, doc: &Document, container: NodeId) -> Option<NodeId> {
        doc.query_selector_all(container, &self.text_region)
            .into_iter()
            .find(|region| doc.closest(*region, &self.container) == Some(container))
    }
}

/// Banners sit next to the text region, so only direct children are checked.
fn banner_under(doc: &Document, parent: NodeId, kind: AnnotationKind) -> Option<NodeId> {
    doc.children(parent)
        .iter()
        .copied()
        .find(|node| doc.attr(*node, "class").and_then(AnnotationKind::from_class) == Some(kind))
}

pub fn banner_text(kind: AnnotationKind, verdict: &Verdict) -> String {
    match kind {
        AnnotationKind::Hate => format!(
            "⚠️ 바이럴 혐오 표현 탐지됨\n· 혐오 확률: {}\n· 바이럴 유사도: {}",
            percent(verdict.hate_probability),
            percent(verdict.viral_score)
        ),
        AnnotationKind::Ad => {
            let viral_line = match verdict.viral_reason_ad {
                ViralReason::Count => "· 유사 문장 다수 감지".to_string(),
                ViralReason::Similarity => {
                    format!("· 바이럴 유사도: {}", percent(verdict.viral_score))
                }
            };
            format!(
                "📢 바이럴 광고 탐지됨\n{viral_line}\n· 광고 확률: {}",
                percent(verdict.ad_probability)
            )
        }
    }
}

fn percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}
