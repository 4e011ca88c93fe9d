pub mod error;
pub mod extract;
pub mod fetch;
mod html;
pub mod price;
mod rate_limit;

pub use error::ScraperError;
pub use extract::{
    extractor_for, AmazonExtractor, CandidateExtractor, EbayExtractor, ExtractionReport,
    ExtractionStatus, WalmartExtractor,
};
pub use fetch::{HttpPageFetcher, Page, PageFetcher, StaticPageFetcher};
