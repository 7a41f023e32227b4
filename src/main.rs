use clap::{Parser, Subcommand};
use compengine_export::config::{Category, MergeConfig, ScrapeConfig};
use compengine_export::merge::Consolidator;
use compengine_export::scraper::{BrowserFactory, Progress, WorkerPool};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::str::FromStr;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[derive(Parser)]
#[command(name = "compengine-export")]
#[command(version = "0.1.0")]
#[command(about = "Bulk export of comp-engine.org time-series", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Page through a category listing and trigger every "download all on
    /// page" action
    Scrape {
        /// Dataset category: real, synthetic or unassigned
        #[arg(value_parser = Category::from_str)]
        data_type: Category,

        /// First catalog page to fetch (1-based)
        start_on_page: u32,

        /// Last catalog page to fetch, inclusive
        end_on_page: u32,

        /// Show the browser window instead of running headless
        #[arg(long)]
        render: bool,

        /// Worker count; 0 picks one per available core, capped by the page
        /// count
        #[arg(long, default_value_t = 0)]
        num_cpu: usize,
    },
    /// Merge downloaded fragments into one datapoints and one metadata table
    Merge {
        /// Dataset category: real, synthetic or unassigned
        #[arg(value_parser = Category::from_str)]
        data_type: Category,

        /// Skip archive extraction, assume fragments are already unpacked
        #[arg(long)]
        no_unzip: bool,

        /// Keep fragment files after consolidation
        #[arg(long)]
        no_clean: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }
    let cli = Cli::parse();
    let logger = env_logger::Builder::from_default_env().build();
    let multi = MultiProgress::new();
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger).try_init()?;

    match cli.command {
        Commands::Scrape {
            data_type,
            start_on_page,
            end_on_page,
            render,
            num_cpu,
        } => {
            let config =
                ScrapeConfig::new(data_type, start_on_page, end_on_page, !render, num_cpu)?;
            run_scrape(config, multi).await
        }
        Commands::Merge {
            data_type,
            no_unzip,
            no_clean,
        } => run_merge(MergeConfig::new(data_type, !no_unzip, !no_clean)),
    }
}

async fn run_scrape(config: ScrapeConfig, multi: MultiProgress) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.download_dir)?;
    log::info!("Saving archives to {}", config.download_dir.display());

    let workers = config.effective_workers();
    let pages: Vec<u32> = config.pages().collect();
    log::info!(
        "Scraping pages {}..={} of category '{}' with {} worker(s)",
        config.start_page,
        config.end_page,
        config.category,
        workers
    );

    let pb = multi.add(ProgressBar::new(pages.len() as u64));
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("#>-"),
    );

    let (progress_tx, progress_rx) = mpsc::channel(64);
    let pb_clone = pb.clone();
    let progress_task = tokio::spawn(async move {
        ReceiverStream::new(progress_rx)
            .for_each(|event: Progress| {
                let pb = pb_clone.clone();
                async move {
                    pb.inc(1);
                    if !event.ok {
                        pb.set_message(format!("page {} failed", event.page));
                    }
                }
            })
            .await;
    });

    let pool = WorkerPool::new(BrowserFactory::new(config.clone()), workers);
    let report = pool.run(pages, Some(progress_tx)).await?;

    let _ = progress_task.await;
    pb.finish_and_clear();

    println!("\n✅ Scrape Completed:");
    println!("   Pages Processed: {}", report.total());
    println!("   Pages Failed: {}", report.failed.len());
    println!("   Success Rate: {:.1}%", report.success_rate());
    println!("   Total Time: {:.1}s", report.elapsed_seconds);
    if !report.failed.is_empty() {
        println!(
            "   Failed Pages: {:?} (re-run the scrape with these indices)",
            report.failed
        );
    }
    Ok(())
}

fn run_merge(config: MergeConfig) -> anyhow::Result<()> {
    log::info!(
        "Merging '{}' fragments from {}",
        config.category,
        config.input_dir.display()
    );
    let output_dir = config.output_dir.clone();
    let summary = Consolidator::new(config).run()?;

    println!("\n✅ Merge Completed:");
    println!("   Datapoint Rows: {}", summary.datapoint_rows);
    println!("   Metadata Rows: {}", summary.metadata_rows);
    println!("   Series: {}", summary.series);
    println!("   Fragments Consumed: {}", summary.fragments_consumed);
    if summary.fragments_removed > 0 {
        println!("   Fragments Removed: {}", summary.fragments_removed);
    }
    println!("   Output Directory: {}", output_dir.display());
    Ok(())
}
