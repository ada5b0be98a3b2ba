pub mod annotate;
pub mod dedup;
pub mod extractor;
pub mod filter;
pub mod watcher;

pub use annotate::{Annotator, RenderOutcome};
pub use dedup::DedupTracker;
pub use extractor::TextExtractor;
pub use filter::ScriptFilter;
pub use watcher::FeedWatcher;
