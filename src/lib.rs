pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod feed;
pub mod proxy;
pub mod server;
pub mod storage;

pub use config::Config;
pub use content::ExtractedArticle;
pub use error::{Error, Result};
pub use feed::{Article, FeedPage};
pub use proxy::NewsProxy;
