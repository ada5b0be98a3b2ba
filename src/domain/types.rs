use std::fmt;

use serde::Serialize;

pub const HATE_POSITIVE_LABEL: &str = "혐오";
pub const AD_POSITIVE_LABEL: &str = "광고";

/// Why the service considered an ad viral.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViralReason {
    /// Several near-duplicate posts were seen recently.
    Count,
    #[default]
    Similarity,
}

impl ViralReason {
    /// Only `"count"` is significant; every other reason the service reports
    /// is shown as a similarity score.
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("count") => ViralReason::Count,
            _ => ViralReason::Similarity,
        }
    }
}

/// Classification result for one post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Verdict {
    pub hate_label: Option<String>,
    pub hate_probability: f64,
    pub viral_hate: bool,
    pub ad_label: Option<String>,
    pub ad_probability: f64,
    pub viral_ad: bool,
    pub viral_reason_ad: ViralReason,
    pub viral_score: f64,
}

impl Verdict {
    /// Banner gate: positive label and viral flag, nothing else.
    pub fn qualifies(&self, kind: AnnotationKind) -> bool {
        match kind {
            AnnotationKind::Hate => {
                self.viral_hate && self.hate_label.as_deref() == Some(HATE_POSITIVE_LABEL)
            }
            AnnotationKind::Ad => {
                self.viral_ad && self.ad_label.as_deref() == Some(AD_POSITIVE_LABEL)
            }
        }
    }

    pub fn qualifying_kinds(&self) -> Vec<AnnotationKind> {
        AnnotationKind::ALL
            .into_iter()
            .filter(|kind| self.qualifies(*kind))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    Hate,
    Ad,
}

impl AnnotationKind {
    pub const ALL: [AnnotationKind; 2] = [AnnotationKind::Hate, AnnotationKind::Ad];

    /// Class carried by the banner element; doubles as its lookup key.
    pub fn class_name(self) -> &'static str {
        match self {
            AnnotationKind::Hate => "hate-detection-result",
            AnnotationKind::Ad => "ad-detection-result",
        }
    }

    pub fn accent_color(self) -> &'static str {
        match self {
            AnnotationKind::Hate => "rgba(255, 77, 79, 0.85)",
            AnnotationKind::Ad => "rgba(24, 144, 255, 0.85)",
        }
    }

    pub fn from_class(class_attr: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| class_attr.split_whitespace().any(|c| c == kind.class_name()))
    }
}

impl fmt::Display for AnnotationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationKind::Hate => f.write_str("hate"),
            AnnotationKind::Ad => f.write_str("ad"),
        }
    }
}

/// Pipeline counters, reported on exit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FeedStats {
    pub discovered: usize,
    pub skipped_script: usize,
    pub submitted: usize,
    pub classified: usize,
    pub failed: usize,
    pub banners_created: usize,
    pub banners_updated: usize,
}
