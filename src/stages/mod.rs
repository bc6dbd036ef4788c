//! Analysis stages of the research pipeline.
//!
//! Each stage owns a handful of fields. LLM-backed stages format a prompt from
//! state, call the model and validate the JSON they get back; the others are
//! pure computations over earlier results.

pub mod brand_analytics;
pub mod brand_identity;
pub mod industry;
pub mod keyword_research;
pub mod periodic_table;
pub mod prompt_page;
pub mod scrape;
pub mod visibility;

pub use brand_analytics::BrandAnalyticsStage;
pub use brand_identity::BrandIdentityStage;
pub use industry::IndustryStage;
pub use keyword_research::KeywordResearchStage;
pub use periodic_table::PeriodicTableStage;
pub use prompt_page::PromptPageStage;
pub use scrape::ScrapeStage;
pub use visibility::VisibilityStage;

use crate::artifacts::ArtifactWriter;
use crate::config::KeywordConfig;
use crate::crawlers::SiteCrawler;
use crate::error::StageError;
use crate::llm::LanguageModel;
use crate::pipeline::{ResearchState, Stage, fields};
use crate::results::CrawlResult;
use std::sync::Arc;

/// The full research graph, in declaration order
pub fn standard_stages(
    crawler: Arc<dyn SiteCrawler>,
    model: Arc<dyn LanguageModel>,
    keywords: KeywordConfig,
    artifacts: ArtifactWriter,
) -> Vec<Arc<dyn Stage>> {
    vec![
        Arc::new(ScrapeStage::new(crawler, artifacts.clone())),
        Arc::new(BrandIdentityStage::new(model.clone(), artifacts.clone())),
        Arc::new(PeriodicTableStage::new(model.clone(), artifacts.clone())),
        Arc::new(KeywordResearchStage::new(
            model.clone(),
            keywords,
            artifacts.clone(),
        )),
        Arc::new(PromptPageStage::new(model.clone(), artifacts.clone())),
        Arc::new(IndustryStage::new(artifacts.clone())),
        Arc::new(VisibilityStage::new(artifacts.clone())),
        Arc::new(BrandAnalyticsStage::new(model, artifacts)),
    ]
}

/// The aggregated site content flattened into prompt text
pub(crate) fn website_text(state: &ResearchState) -> Result<String, StageError> {
    let content: CrawlResult = state
        .get_as(fields::WEBSITE_CONTENT)
        .ok_or(StageError::MissingInput(fields::WEBSITE_CONTENT))?;
    Ok(content.as_text())
}

/// A string-list field, empty when unset
pub(crate) fn string_list(state: &ResearchState, field: &str) -> Vec<String> {
    state.get_as(field).unwrap_or_default()
}

/// Rounds to two decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
