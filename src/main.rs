use clap::Parser;
use sitescope::crawl_site;
use sitescope::research::research;
use sitescope::server;
use std::process::ExitCode;
use std::sync::Arc;

mod args;
use args::{Args, Command};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::init();

    // Parse command-line arguments
    let args = Args::parse();
    let config = match args.overrides.load() {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::Crawl { url } => {
            println!("Note: Web crawling requires a WebDriver server (e.g., ChromeDriver).");
            println!(
                "Set WEBDRIVER_URL environment variable if not using {}",
                config.crawl.webdriver_url
            );
            match crawl_site(&config.crawl, &url).await {
                Ok(result) => print_json(&result),
                Err(e) => {
                    ::log::error!("Crawl failed: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Run { company } => {
            let state = research(&config, &company).await;
            let printed = print_json(&state);
            if state.error().is_some() {
                ExitCode::FAILURE
            } else {
                printed
            }
        }
        Command::Serve { bind } => match server::serve(&bind, Arc::new(config)).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                ::log::error!("Server stopped: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            ::log::error!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}
