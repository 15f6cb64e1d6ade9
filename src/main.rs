use clap::Parser;
use std::process::ExitCode;
use yield_rag::{CrawlConfig, DomainScope, SiteIndexer};

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match CrawlConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                ::log::error!("Failed to load config from {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => CrawlConfig::default(),
    };
    config.apply_env();

    // Command-line flags take precedence over file and environment
    let mut indexer = SiteIndexer::new().with_config(config);
    if let Some(depth) = args.max_depth {
        indexer = indexer.with_max_depth(depth);
    }
    if let Some(url) = args.webdriver_url {
        indexer = indexer.with_webdriver_url(url);
    }
    if let Some(dir) = args.output_dir {
        indexer = indexer.with_output_dir(dir);
    }
    if args.strict_domain {
        indexer = indexer.with_domain_scope(DomainScope::Strict);
    }
    if let Some(max_pages) = args.max_pages {
        indexer = indexer.with_max_pages(max_pages);
    }

    let mut session = match indexer.build() {
        Ok(session) => session,
        Err(e) => {
            ::log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Note: crawling requires a WebDriver server (e.g., ChromeDriver).");
    println!(
        "Set WEBDRIVER_URL if not using {}",
        indexer.config().webdriver.url
    );

    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ::log::warn!("Interrupted, finishing the current page");
            cancel.cancel();
        }
    });

    let start_time = std::time::Instant::now();
    let output = session
        .crawl(&args.url, &args.instructions, indexer.config().max_depth)
        .await;
    let stats = session.stats();

    ::log::info!(
        "Crawling complete - rendered {} pages in {:.2} seconds",
        stats.rendered,
        start_time.elapsed().as_secs_f64()
    );

    let output_config = &indexer.config().output;
    println!("Total pages stored: {}", output.all_data.len());
    println!("Relevant pages: {}", output.filtered_data.len());
    println!("Metadata: {}", output_config.metadata_path().display());
    println!(
        "Filtered metadata: {}",
        output_config.filtered_metadata_path().display()
    );
    println!("Index: {}", output_config.index_path().display());
    println!(
        "Filtered index: {}",
        output_config.filtered_index_path().display()
    );

    ExitCode::SUCCESS
}
