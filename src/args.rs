use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "yield-rag")]
#[command(about = "Crawls a site and builds relevance-filtered vector indexes of its pages")]
#[command(version)]
pub struct Args {
    /// Seed URL to start crawling from
    pub url: String,

    /// What the user is looking for; drives relevance filtering
    #[arg(short, long)]
    pub instructions: String,

    /// Maximum link distance from the seed URL
    #[arg(short = 'd', long)]
    pub max_depth: Option<usize>,

    /// JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// WebDriver URL (overrides config and WEBDRIVER_URL)
    #[arg(long)]
    pub webdriver_url: Option<String>,

    /// Directory for the metadata and index files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Only follow links on exactly the seed's host
    #[arg(long)]
    pub strict_domain: bool,

    /// Stop after rendering this many pages
    #[arg(long)]
    pub max_pages: Option<usize>,
}
