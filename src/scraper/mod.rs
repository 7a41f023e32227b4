pub mod browser;
pub mod pool;
pub mod report;

pub use browser::{BrowserFactory, BrowserSession};
pub use pool::{FetcherFactory, PageFetcher, WorkerPool};
pub use report::{Progress, ScrapeReport, WorkerOutcome};
