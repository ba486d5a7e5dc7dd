//! Web search capability used when the knowledge base has nothing to offer.

pub mod any;
pub mod digest;
pub mod duckduckgo;
pub mod error;
pub mod fallback;
#[cfg(feature = "mock")]
pub mod mock;
pub mod search;
pub mod tavily;

mod http;

pub use any::AnyWebSearch;
pub use digest::{excerpt, format_digest};
pub use duckduckgo::DuckDuckGoSearch;
pub use error::ToolError;
pub use fallback::FallbackSearch;
pub use search::{WebResult, WebSearch};
pub use tavily::TavilySearch;
