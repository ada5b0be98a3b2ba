use crate::dom::{Document, NodeId};

pub const ANALYZED_MARKER: &str = "data-analyzed";

/// Per-node "already submitted" marker, stored on the element itself so it
/// lives and dies with the node.
#[derive(Debug, Clone)]
pub struct DedupTracker {
    marker: String,
}

impl Default for DedupTracker {
    fn default() -> Self {
        Self::new(ANALYZED_MARKER)
    }
}

impl DedupTracker {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
        }
    }

    pub fn is_marked(&self, doc: &Document, node: NodeId) -> bool {
        doc.attr(node, &self.marker).is_some()
    }

    /// Check-and-set. Must run before any await for the same node so two
    /// discoveries within one batch cannot both see the node unmarked.
    pub fn should_process(&self, doc: &mut Document, node: NodeId) -> bool {
        if self.is_marked(doc, node) {
            return false;
        }
        doc.set_attr(node, &self.marker, "true").is_ok()
    }
}
