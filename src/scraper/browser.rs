use crate::config::{
    CONTROL_WAIT_TIMEOUT, DOWNLOAD_CONTROL_LABEL, DOWNLOAD_CONTROL_XPATH, PAGE_LOAD_TIMEOUT,
    POLL_INTERVAL, POST_CLICK_DELAY, ScrapeConfig,
};
use crate::error::{Error, Result};
use crate::scraper::pool::{FetcherFactory, PageFetcher};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::element::Element;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::fs;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// True once the catalog's loading overlay is gone, either removed from the
/// DOM or hidden.
const LOADING_CLEARED_JS: &str = "(() => { \
    const el = document.querySelector('.app-loading'); \
    return el === null || el.offsetParent === null; \
})()";

/// Launches one browser per worker. Browsers are never shared; each worker
/// owns its instance for the whole run.
pub struct BrowserFactory {
    config: Arc<ScrapeConfig>,
}

impl BrowserFactory {
    pub fn new(config: ScrapeConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl FetcherFactory for BrowserFactory {
    type Fetcher = BrowserSession;

    async fn connect(&self, worker_id: usize) -> Result<BrowserSession> {
        BrowserSession::launch(self.config.clone(), worker_id).await
    }
}

/// One Chromium instance plus the single tab it pages through the catalog
/// with. Downloads land in the configured directory as a side effect of
/// clicking the bulk-download control; this session only waits for the UI
/// state that triggers them.
pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    config: Arc<ScrapeConfig>,
    worker_id: usize,
}

impl BrowserSession {
    pub async fn launch(config: Arc<ScrapeConfig>, worker_id: usize) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(Error::Browser)?;

        let (browser, mut events) = Browser::launch(browser_config).await?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        // Route downloads into the archive directory instead of the
        // browser's default location.
        let download_dir = fs::canonicalize(&config.download_dir)?;
        let behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(download_dir.to_string_lossy())
            .build()
            .map_err(Error::Browser)?;
        page.execute(behavior).await?;

        log::debug!("worker {worker_id}: browser ready");
        Ok(Self {
            browser,
            page,
            handler,
            config,
            worker_id,
        })
    }

    async fn wait_loading_cleared(&self, page_index: u32) -> Result<()> {
        let deadline = Instant::now() + PAGE_LOAD_TIMEOUT;
        loop {
            let cleared: bool = self
                .page
                .evaluate(LOADING_CLEARED_JS)
                .await?
                .into_value()
                .map_err(|e| Error::Browser(e.to_string()))?;
            if cleared {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::PageTimeout {
                    page: page_index,
                    what: "loading indicator",
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn wait_download_control(&self, page_index: u32) -> Result<Element> {
        let deadline = Instant::now() + CONTROL_WAIT_TIMEOUT;
        loop {
            if let Ok(element) = self.page.find_xpath(DOWNLOAD_CONTROL_XPATH).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(Error::PageTimeout {
                    page: page_index,
                    what: "download control",
                });
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

#[async_trait]
impl PageFetcher for BrowserSession {
    async fn fetch_page(&mut self, page_index: u32) -> Result<()> {
        let url = self.config.page_url(page_index)?;
        log::debug!("worker {}: visiting {url}", self.worker_id);

        self.page.goto(url.as_str()).await?;
        self.wait_loading_cleared(page_index).await?;

        let control = self.wait_download_control(page_index).await?;
        let label = control.inner_text().await?.unwrap_or_default();
        if label.trim() != DOWNLOAD_CONTROL_LABEL {
            return Err(Error::Browser(format!(
                "unexpected control label {:?} on page {page_index}",
                label.trim()
            )));
        }

        control.click().await?;
        sleep(POST_CLICK_DELAY).await;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        log::debug!("worker {}: closing browser", self.worker_id);
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler.abort();
        Ok(())
    }
}
