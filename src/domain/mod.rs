pub mod post;
pub mod types;

pub use post::PostNode;
pub use types::{AnnotationKind, FeedStats, Verdict, ViralReason};
