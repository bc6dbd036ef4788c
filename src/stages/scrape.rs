use crate::artifacts::ArtifactWriter;
use crate::crawlers::SiteCrawler;
use crate::error::StageError;
use crate::pipeline::{ResearchState, Stage, StateUpdate, fields};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

/// Crawls the company website and publishes the aggregate content
pub struct ScrapeStage {
    crawler: Arc<dyn SiteCrawler>,
    artifacts: ArtifactWriter,
}

impl ScrapeStage {
    pub fn new(crawler: Arc<dyn SiteCrawler>, artifacts: ArtifactWriter) -> Self {
        Self { crawler, artifacts }
    }
}

#[async_trait]
impl Stage for ScrapeStage {
    fn name(&self) -> &'static str {
        "scrape_website"
    }

    fn reads(&self) -> &[&'static str] {
        &[fields::COMPANY_NAME]
    }

    fn writes(&self) -> &[&'static str] {
        &[
            fields::WEBSITE_CONTENT,
            fields::WEBSITE_CONTENT_INDIVIDUAL,
            fields::SCRAPED_SUMMARY,
        ]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        let target = state
            .get_str(fields::COMPANY_NAME)
            .ok_or(StageError::MissingInput(fields::COMPANY_NAME))?;

        let result = self.crawler.crawl(target).await?;
        let summary = result.summary();
        ::log::info!(
            "Scraped {} pages from {} ({} rejected)",
            result.total_pages,
            result.website_url,
            result.rejected_urls.len()
        );

        self.artifacts.write(
            "rejected_urls.json",
            &json!({ "rejected_urls": result.rejected_urls }),
        );
        self.artifacts.write("pages_with_content.json", &result.pages);
        self.artifacts.write("compiled_scraped_data.json", &result);
        self.artifacts.write("scraped_summary.json", &summary);

        Ok(StateUpdate::new()
            .with_json(fields::WEBSITE_CONTENT, &result)
            .with_json(fields::WEBSITE_CONTENT_INDIVIDUAL, &result.pages)
            .with_json(fields::SCRAPED_SUMMARY, &summary))
    }
}
