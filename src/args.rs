use clap::{Args as ClapArgs, Parser, Subcommand};
use sitescope::config::ResearchConfig;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sitescope")]
#[command(about = "Crawls a company website and runs brand and visibility research on it")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub overrides: Overrides,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl a site and print the aggregated content as JSON
    Crawl {
        /// Start URL or bare domain
        url: String,
    },
    /// Run the full research pipeline for a company and print the final state
    Run {
        /// Company domain, e.g. acme.com
        company: String,
    },
    /// Serve the HTTP API
    Serve {
        /// Address to bind (host:port)
        #[arg(long, default_value = "127.0.0.1:8000")]
        bind: String,
    },
}

#[derive(ClapArgs, Debug)]
pub struct Overrides {
    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Maximum number of pages to collect
    #[arg(long, global = true)]
    pub max_pages: Option<usize>,

    /// Number of concurrent page fetches
    #[arg(short, long, global = true)]
    pub concurrency: Option<usize>,
}

impl Overrides {
    /// File (or default) configuration, then environment, then command-line flags
    pub fn load(&self) -> Result<ResearchConfig, sitescope::error::ConfigError> {
        let config = match &self.config {
            Some(path) => ResearchConfig::from_file(path)?,
            None => ResearchConfig::default(),
        };
        let mut config = config.apply_env();
        if let Some(max_pages) = self.max_pages {
            config.crawl.max_pages = max_pages;
        }
        if let Some(concurrency) = self.concurrency {
            config.crawl.concurrency_limit = concurrency;
        }
        Ok(config)
    }
}
