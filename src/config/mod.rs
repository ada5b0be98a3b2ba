pub mod env;
mod loader;

pub use env::{AppConfig, ClassifierConfig, DirectoryConfig, FeedSource};
pub use loader::load_config;
