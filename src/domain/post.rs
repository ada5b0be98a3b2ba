use chrono::{DateTime, Utc};

use crate::dom::NodeId;

/// A discovered post, captured by value so it can travel into the
/// classification future independently of the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostNode {
    pub node: NodeId,
    pub container: NodeId,
    pub text: String,
    pub discovered_at: DateTime<Utc>,
}

impl PostNode {
    /// First characters of the text, for log lines.
    pub fn preview(&self) -> String {
        let mut preview: String = self.text.chars().take(50).collect();
        if preview.len() < self.text.len() {
            preview.push('…');
        }
        preview
    }
}
