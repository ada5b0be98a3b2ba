use crate::{
    domain::{FeedStats, PostNode},
    dom::{Document, MutationRecord, NodeId, Selector},
};

use super::{dedup::DedupTracker, extractor::TextExtractor, filter::ScriptFilter};

/// Finds post text nodes at activation and inside every inserted subtree,
/// handing back posts that are new, extractable and in the target script.
#[derive(Debug, Clone)]
pub struct FeedWatcher {
    post_text: Selector,
    extractor: TextExtractor,
    dedup: DedupTracker,
    filter: ScriptFilter,
}

impl FeedWatcher {
    pub fn new(
        post_text: Selector,
        extractor: TextExtractor,
        dedup: DedupTracker,
        filter: ScriptFilter,
    ) -> Self {
        Self {
            post_text,
            extractor,
            dedup,
            filter,
        }
    }

    /// Full scan of the current document, then starts observing it.
    pub fn activate(&self, doc: &mut Document, stats: &mut FeedStats) -> Vec<PostNode> {
        let candidates = doc.query_selector_all(doc.root(), &self.post_text);
        tracing::info!(
            target: "watcher",
            candidates = candidates.len(),
            selector = %self.post_text,
            "initial scan"
        );
        let posts = self.discover(doc, candidates, stats);
        doc.observe();
        posts
    }

    /// Handles one change notification. Only inserted subtrees are inspected.
    pub fn on_mutations(
        &self,
        doc: &mut Document,
        records: &[MutationRecord],
        stats: &mut FeedStats,
    ) -> Vec<PostNode> {
        let mut candidates = Vec::new();
        for record in records {
            tracing::trace!(
                target: "watcher",
                parent = ?record.target,
                added = record.added.len(),
                removed = record.removed.len(),
                "mutation record"
            );
            for &added in &record.added {
                // Inserted and removed again within the same batch.
                if !doc.is_connected(added) {
                    continue;
                }
                if doc.matches(added, &self.post_text) {
                    candidates.push(added);
                }
                candidates.extend(doc.query_selector_all(added, &self.post_text));
            }
        }
        if candidates.is_empty() {
            return Vec::new();
        }
        tracing::debug!(
            target: "watcher",
            records = records.len(),
            candidates = candidates.len(),
            "mutation batch"
        );
        self.discover(doc, candidates, stats)
    }

    fn discover(
        &self,
        doc: &mut Document,
        candidates: Vec<NodeId>,
        stats: &mut FeedStats,
    ) -> Vec<PostNode> {
        let mut ready = Vec::new();
        for node in candidates {
            if self.dedup.is_marked(doc, node) {
                continue;
            }
            let Some(post) = self.extractor.extract(doc, node) else {
                continue;
            };
            if !self.dedup.should_process(doc, node) {
                continue;
            }
            stats.discovered += 1;
            if !self.filter.admits(&post.text) {
                stats.skipped_script += 1;
                continue;
            }
            ready.push(post);
        }
        ready
    }
}
