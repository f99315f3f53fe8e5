pub mod cli;
pub mod crawler;
pub mod downloader;
pub mod error;
pub mod model;
pub mod sys;

pub use crawler::{crawl, CrawlReport, CrawlRequest};
pub use downloader::{download_all, DownloadReport, DownloadRequest};
pub use error::{
    CrawlError, DownloadError, RetrievalError, SerializationError, ValidationError,
};
pub use model::VideoRecord;
pub use sys::platform::VideoPlatform;
