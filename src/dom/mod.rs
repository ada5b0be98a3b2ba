pub mod selector;
pub mod spec;
pub mod tree;

pub use selector::{Selector, SelectorError};
pub use spec::NodeSpec;
pub use tree::{Document, DomError, MutationRecord, NodeId};
