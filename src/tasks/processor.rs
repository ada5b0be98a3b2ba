use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::{future::BoxFuture, stream::FuturesUnordered, FutureExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    ai::ClassificationClient,
    domain::{FeedStats, PostNode, Verdict},
    dom::Document,
    feed::{Annotator, FeedWatcher, RenderOutcome},
    host::{self, DocumentEvent},
    infrastructure::shutdown::ShutdownListener,
};

type Classification = BoxFuture<'static, (PostNode, Result<Verdict>)>;

/// What is left once the processor stops.
#[derive(Debug)]
pub struct FeedOutcome {
    pub document: Document,
    pub stats: FeedStats,
}

/// Owns the document and is the only code that touches it. Host events,
/// change notifications and classification responses are all handled from
/// one select loop, so they interleave but never overlap.
pub struct FeedProcessor {
    document: Document,
    watcher: FeedWatcher,
    annotator: Annotator,
    client: Arc<ClassificationClient>,
    stats: FeedStats,
    active: bool,
}

impl FeedProcessor {
    pub fn new(
        watcher: FeedWatcher,
        annotator: Annotator,
        client: Arc<ClassificationClient>,
    ) -> Self {
        Self {
            document: Document::new(),
            watcher,
            annotator,
            client,
            stats: FeedStats::default(),
            active: false,
        }
    }

    pub fn spawn(
        self,
        events: mpsc::Receiver<DocumentEvent>,
        shutdown: ShutdownListener,
    ) -> JoinHandle<FeedOutcome> {
        tokio::spawn(self.run(events, shutdown))
    }

    /// Runs until the host feed closes and every in-flight classification has
    /// settled, or until shutdown.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<DocumentEvent>,
        mut shutdown: ShutdownListener,
    ) -> FeedOutcome {
        let mut in_flight: FuturesUnordered<Classification> = FuturesUnordered::new();
        let mut feed_open = true;

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    tracing::info!(
                        target: "processor",
                        abandoned = in_flight.len(),
                        "shutdown requested; abandoning in-flight classifications"
                    );
                    break;
                }
                event = events.recv(), if feed_open => {
                    let posts = match event {
                        Some(event) => self.handle_event(event),
                        None => {
                            feed_open = false;
                            tracing::info!(
                                target: "processor",
                                in_flight = in_flight.len(),
                                "host feed closed; draining classifications"
                            );
                            if self.active { Vec::new() } else { self.activate() }
                        }
                    };
                    self.dispatch(posts, &mut in_flight);
                }
                Some((post, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    let posts = self.complete(post, outcome);
                    self.dispatch(posts, &mut in_flight);
                }
            }

            if !feed_open && in_flight.is_empty() {
                break;
            }
        }

        tracing::info!(target: "processor", stats = ?self.stats, "feed processor stopped");
        FeedOutcome {
            document: self.document,
            stats: self.stats,
        }
    }

    fn activate(&mut self) -> Vec<PostNode> {
        self.active = true;
        self.watcher.activate(&mut self.document, &mut self.stats)
    }

    /// Delivers pending mutation records to the watcher as one notification.
    fn notify(&mut self) -> Vec<PostNode> {
        let records = self.document.take_records();
        if records.is_empty() {
            return Vec::new();
        }
        self.watcher
            .on_mutations(&mut self.document, &records, &mut self.stats)
    }

    fn handle_event(&mut self, event: DocumentEvent) -> Vec<PostNode> {
        match event {
            DocumentEvent::Snapshot(root) => {
                if let Err(err) = host::load_snapshot(&mut self.document, &root) {
                    tracing::warn!(target: "host", error = %err, "failed to load snapshot");
                }
                if self.active {
                    self.notify()
                } else {
                    self.activate()
                }
            }
            DocumentEvent::Mutations(mutations) => {
                let mut posts = if self.active {
                    Vec::new()
                } else {
                    self.activate()
                };
                for mutation in &mutations {
                    if let Err(err) = host::apply_mutation(&mut self.document, mutation) {
                        tracing::warn!(target: "host", error = %err, ?mutation, "skipping host mutation");
                    }
                }
                posts.extend(self.notify());
                posts
            }
        }
    }

    fn dispatch(&mut self, posts: Vec<PostNode>, in_flight: &mut FuturesUnordered<Classification>) {
        for post in posts {
            self.stats.submitted += 1;
            tracing::debug!(
                target: "classifier",
                node = %post.node,
                text = %post.preview(),
                "submitting post"
            );
            let client = self.client.clone();
            in_flight.push(
                async move {
                    let outcome = client.classify(&post.text).await;
                    (post, outcome)
                }
                .boxed(),
            );
        }
    }

    fn complete(&mut self, post: PostNode, outcome: Result<Verdict>) -> Vec<PostNode> {
        let elapsed_ms = (Utc::now() - post.discovered_at).num_milliseconds();
        let verdict = match outcome {
            Ok(verdict) => verdict,
            Err(err) => {
                self.stats.failed += 1;
                tracing::warn!(
                    target: "classifier",
                    error = %err,
                    node = %post.node,
                    text = %post.preview(),
                    "classification failed; post stays unannotated"
                );
                return Vec::new();
            }
        };
        self.stats.classified += 1;
        tracing::debug!(
            target: "classifier",
            node = %post.node,
            elapsed_ms,
            hate_label = verdict.hate_label.as_deref().unwrap_or("-"),
            hate_prob = verdict.hate_probability,
            viral_hate = verdict.viral_hate,
            ad_label = verdict.ad_label.as_deref().unwrap_or("-"),
            ad_prob = verdict.ad_probability,
            viral_ad = verdict.viral_ad,
            viral_score = verdict.viral_score,
            "verdict received"
        );

        for (kind, outcome) in self.annotator.apply(&mut self.document, post.container, &verdict) {
            match outcome {
                RenderOutcome::Created(banner) => {
                    self.stats.banners_created += 1;
                    tracing::info!(
                        target: "annotate",
                        %kind,
                        %banner,
                        container = %self.document.describe(post.container),
                        "banner added"
                    );
                }
                RenderOutcome::Updated(banner) => {
                    self.stats.banners_updated += 1;
                    tracing::info!(target: "annotate", %kind, %banner, "banner updated");
                }
                RenderOutcome::Detached | RenderOutcome::MissingTextRegion => {
                    tracing::debug!(
                        target: "annotate",
                        %kind,
                        ?outcome,
                        container = %post.container,
                        "banner not rendered"
                    );
                }
            }
        }
        // Our own insertions are observed like any other change.
        self.notify()
    }
}
