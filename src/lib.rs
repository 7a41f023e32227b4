pub mod config;
pub mod error;
pub mod merge;
pub mod scraper;

pub use config::{Category, MergeConfig, ScrapeConfig};
pub use error::{Error, Result};
pub use merge::Consolidator;
pub use scraper::{ScrapeReport, WorkerPool};
