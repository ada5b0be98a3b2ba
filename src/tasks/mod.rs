pub mod processor;

pub use processor::{FeedOutcome, FeedProcessor};
