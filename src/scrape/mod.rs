pub mod extract;
pub mod fetcher;
pub mod source;

pub use fetcher::{BrowserSettings, ChromeFetcher, PageFetcher};
pub use source::{SnapshotSource, SourceAggregator, SourcePage};
