use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use url::Url;

/// Category listing URL template; the page index is appended after the
/// trailing slash.
pub const BASE_URL: &str = "https://www.comp-engine.org/#!browse/category";

pub const PAGE_LOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const CONTROL_WAIT_TIMEOUT: Duration = Duration::from_secs(60);
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Pause after clicking the bulk-download control so the browser gets to
/// start the download before we navigate away.
pub const POST_CLICK_DELAY: Duration = Duration::from_millis(50);

/// How long a worker keeps its browser alive after the queue drains, so
/// in-flight downloads can finish writing to disk. Heuristic, not a
/// guarantee.
pub const DRAIN_LINGER: Duration = Duration::from_secs(10);

pub const DOWNLOAD_CONTROL_XPATH: &str = "//*[contains(text(), 'Download all on page')]";
pub const DOWNLOAD_CONTROL_LABEL: &str = "DOWNLOAD ALL ON PAGE";

/// Top-level dataset partition on the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Real,
    Synthetic,
    Unassigned,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Real => "real",
            Category::Synthetic => "synthetic",
            Category::Unassigned => "unassigned",
        }
    }

    /// Directory the scraper downloads archives into and the merger reads
    /// fragments from.
    pub fn zip_dir(self) -> PathBuf {
        PathBuf::from(format!("zip_files_{}", self.as_str()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "real" => Ok(Category::Real),
            "synthetic" => Ok(Category::Synthetic),
            // "unnasigned" is the spelling some older exports used.
            "unassigned" | "unnasigned" => Ok(Category::Unassigned),
            other => Err(Error::Config(format!(
                "invalid data_type '{other}', pick one of: real, synthetic, unassigned"
            ))),
        }
    }
}

/// Validated settings for one scrape run.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub category: Category,
    pub start_page: u32,
    pub end_page: u32,
    pub headless: bool,
    /// Requested worker count; 0 means auto-detect.
    pub workers: usize,
    pub download_dir: PathBuf,
}

impl ScrapeConfig {
    pub fn new(
        category: Category,
        start_page: u32,
        end_page: u32,
        headless: bool,
        workers: usize,
    ) -> Result<Self> {
        if start_page < 1 {
            return Err(Error::Config(format!(
                "start_on_page ({start_page}) must be >= 1"
            )));
        }
        if end_page < start_page {
            return Err(Error::Config(format!(
                "end_on_page ({end_page}) must be >= start_on_page ({start_page})"
            )));
        }
        Ok(Self {
            category,
            start_page,
            end_page,
            headless,
            workers,
            download_dir: category.zip_dir(),
        })
    }

    pub fn pages(&self) -> RangeInclusive<u32> {
        self.start_page..=self.end_page
    }

    pub fn page_count(&self) -> usize {
        (self.end_page - self.start_page + 1) as usize
    }

    /// Worker count actually spawned: auto-detect caps at available
    /// parallelism, and nobody gets more workers than there are pages.
    pub fn effective_workers(&self) -> usize {
        let pages = self.page_count();
        if self.workers == 0 {
            let available = thread::available_parallelism().map_or(1, |n| n.get());
            available.min(pages)
        } else {
            self.workers.min(pages)
        }
    }

    /// Catalog URL for one page index, trailing slash normalized.
    pub fn page_url(&self, page: u32) -> Result<Url> {
        let mut base = format!("{BASE_URL}/{}", self.category);
        if !base.ends_with('/') {
            base.push('/');
        }
        Url::parse(&format!("{base}{page}"))
            .map_err(|e| Error::Config(format!("cannot build page URL: {e}")))
    }
}

/// Settings for one merge run.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    pub category: Category,
    /// Extract archives found in the input directory before loading
    /// fragments.
    pub unzip: bool,
    /// Remove consumed fragment files once consolidation succeeded.
    pub clean: bool,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl MergeConfig {
    pub fn new(category: Category, unzip: bool, clean: bool) -> Self {
        Self {
            category,
            unzip,
            clean,
            input_dir: category.zip_dir(),
            output_dir: PathBuf::from("csv"),
        }
    }
}
