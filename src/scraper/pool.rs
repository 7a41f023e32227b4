use crate::config::DRAIN_LINGER;
use crate::error::{Error, Result};
use crate::scraper::report::{Progress, ScrapeReport, WorkerOutcome};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::sleep;

/// One page-processing backend. Implementations own whatever heavyweight
/// resource is needed (a browser instance in production) and are used by
/// exactly one worker.
#[async_trait]
pub trait PageFetcher: Send {
    async fn fetch_page(&mut self, page: u32) -> Result<()>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Builds one [`PageFetcher`] per worker. Fetchers are never shared across
/// workers.
#[async_trait]
pub trait FetcherFactory: Send + Sync + 'static {
    type Fetcher: PageFetcher + 'static;

    async fn connect(&self, worker_id: usize) -> Result<Self::Fetcher>;
}

/// Drains a queue of catalog page indices across a fixed set of workers.
///
/// The queue is populated once before the workers start; each index is
/// consumed by exactly one worker. Page failures are recorded and skipped,
/// never retried. Workers report their outcome when they exit instead of
/// mutating shared counters during the run; live progress is a best-effort
/// event channel.
pub struct WorkerPool<F: FetcherFactory> {
    factory: Arc<F>,
    workers: usize,
    linger: Duration,
}

impl<F: FetcherFactory> WorkerPool<F> {
    pub fn new(factory: F, workers: usize) -> Self {
        Self {
            factory: Arc::new(factory),
            workers: workers.max(1),
            linger: DRAIN_LINGER,
        }
    }

    /// Overrides the post-drain pause before fetchers are closed.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub async fn run(
        &self,
        pages: Vec<u32>,
        progress: Option<mpsc::Sender<Progress>>,
    ) -> Result<ScrapeReport> {
        let started = Instant::now();
        let queue = Arc::new(Mutex::new(VecDeque::from(pages)));

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let queue = queue.clone();
            let factory = self.factory.clone();
            let progress = progress.clone();
            let linger = self.linger;

            handles.push(tokio::spawn(async move {
                let mut fetcher = factory.connect(worker_id).await?;
                let mut outcome = WorkerOutcome::new(worker_id);

                loop {
                    let page = queue.lock().expect("page queue lock").pop_front();
                    let Some(page) = page else { break };

                    let ok = match fetcher.fetch_page(page).await {
                        Ok(()) => {
                            log::info!("worker {worker_id}: page {page} ok");
                            outcome.processed.push(page);
                            true
                        }
                        Err(e) => {
                            log::warn!("worker {worker_id}: page {page} failed: {e}");
                            outcome.failed.push(page);
                            false
                        }
                    };

                    if let Some(tx) = &progress {
                        let _ = tx.try_send(Progress {
                            worker_id,
                            page,
                            ok,
                        });
                    }
                }

                // Queue is drained; give in-flight downloads a chance to
                // finish before the fetcher (and its browser) goes away.
                sleep(linger).await;
                fetcher.close().await?;
                Ok::<WorkerOutcome, Error>(outcome)
            }));
        }
        drop(progress);

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await??);
        }

        Ok(ScrapeReport::from_outcomes(outcomes, started.elapsed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Clone, Default)]
    struct RecordingFactory {
        visited: Arc<Mutex<Vec<(usize, u32)>>>,
        fail_pages: HashSet<u32>,
        closed: Arc<Mutex<usize>>,
    }

    struct RecordingFetcher {
        worker_id: usize,
        visited: Arc<Mutex<Vec<(usize, u32)>>>,
        fail_pages: HashSet<u32>,
        closed: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl FetcherFactory for RecordingFactory {
        type Fetcher = RecordingFetcher;

        async fn connect(&self, worker_id: usize) -> Result<RecordingFetcher> {
            Ok(RecordingFetcher {
                worker_id,
                visited: self.visited.clone(),
                fail_pages: self.fail_pages.clone(),
                closed: self.closed.clone(),
            })
        }
    }

    #[async_trait]
    impl PageFetcher for RecordingFetcher {
        async fn fetch_page(&mut self, page: u32) -> Result<()> {
            self.visited
                .lock()
                .expect("visited lock")
                .push((self.worker_id, page));
            if self.fail_pages.contains(&page) {
                return Err(Error::PageTimeout {
                    page,
                    what: "loading indicator",
                });
            }
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            *self.closed.lock().expect("closed lock") += 1;
            Ok(())
        }
    }

    fn pool(factory: RecordingFactory, workers: usize) -> WorkerPool<RecordingFactory> {
        WorkerPool::new(factory, workers).with_linger(Duration::ZERO)
    }

    #[tokio::test]
    async fn every_page_is_processed_exactly_once() {
        let factory = RecordingFactory::default();
        let visited = factory.visited.clone();

        let pages: Vec<u32> = (1..=20).collect();
        let report = pool(factory, 4).run(pages.clone(), None).await.unwrap();

        assert_eq!(report.processed, pages);
        assert!(report.failed.is_empty());

        let visited = visited.lock().unwrap();
        let unique: HashSet<u32> = visited.iter().map(|&(_, p)| p).collect();
        assert_eq!(visited.len(), 20);
        assert_eq!(unique.len(), 20);
    }

    #[tokio::test]
    async fn single_worker_drains_the_whole_queue() {
        let factory = RecordingFactory::default();
        let report = pool(factory, 1)
            .run((5..=9).collect(), None)
            .await
            .unwrap();
        assert_eq!(report.processed, vec![5, 6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn failed_pages_are_recorded_and_skipped() {
        let factory = RecordingFactory {
            fail_pages: HashSet::from([2]),
            ..RecordingFactory::default()
        };

        let report = pool(factory, 2).run(vec![1, 2, 3], None).await.unwrap();

        assert_eq!(report.processed, vec![1, 3]);
        assert_eq!(report.failed, vec![2]);
        assert_eq!(report.total(), 3);
    }

    #[tokio::test]
    async fn every_fetcher_is_closed_after_the_drain() {
        let factory = RecordingFactory::default();
        let closed = factory.closed.clone();

        pool(factory, 3).run((1..=6).collect(), None).await.unwrap();

        assert_eq!(*closed.lock().unwrap(), 3);
    }

    #[tokio::test]
    async fn progress_events_cover_every_page() {
        let factory = RecordingFactory {
            fail_pages: HashSet::from([4]),
            ..RecordingFactory::default()
        };

        let (tx, mut rx) = mpsc::channel(16);
        let report = pool(factory, 2)
            .run((1..=8).collect(), Some(tx))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }

        assert_eq!(events.len(), 8);
        assert_eq!(events.iter().filter(|e| !e.ok).count(), 1);
        assert_eq!(report.failed, vec![4]);
    }

    #[tokio::test]
    async fn empty_queue_yields_empty_report() {
        let factory = RecordingFactory::default();
        let report = pool(factory, 2).run(Vec::new(), None).await.unwrap();
        assert_eq!(report.total(), 0);
    }
}
