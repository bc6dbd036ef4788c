use crate::artifacts::ArtifactWriter;
use crate::config::{KeywordConfig, ResearchConfig};
use crate::crawlers::{SiteCrawler, WebDriverCrawler};
use crate::error::{LlmError, PipelineError};
use crate::llm::{GeminiClient, LanguageModel};
use crate::pipeline::{Pipeline, ResearchState, StageGraph, StateSchema};
use crate::stages::standard_stages;
use crate::utils::sanitize_filename;
use std::sync::Arc;
use std::time::Instant;

/// Runs one research job: crawl a company site and push it through every analysis stage.
pub struct Researcher {
    crawler: Arc<dyn SiteCrawler>,
    model: Arc<dyn LanguageModel>,
    keywords: KeywordConfig,
    artifacts: ArtifactWriter,
    schema: StateSchema,
}

impl Researcher {
    pub fn new(
        crawler: Arc<dyn SiteCrawler>,
        model: Arc<dyn LanguageModel>,
        keywords: KeywordConfig,
        artifacts: ArtifactWriter,
    ) -> Self {
        Self {
            crawler,
            model,
            keywords,
            artifacts,
            schema: StateSchema::research(),
        }
    }

    /// WebDriver crawler plus Gemini client, as configured
    pub fn from_config(config: &ResearchConfig) -> Result<Self, LlmError> {
        let model = GeminiClient::new(&config.llm)?;
        Ok(Self::new(
            Arc::new(WebDriverCrawler::new(config.crawl.clone())),
            Arc::new(model),
            config.keywords.clone(),
            ArtifactWriter::from_option(config.output_dir.clone()),
        ))
    }

    /// Replace the merge policies
    pub fn with_schema(mut self, schema: StateSchema) -> Self {
        self.schema = schema;
        self
    }

    /// The standard stage graph, with artifacts going to `artifacts`
    pub fn pipeline(&self, artifacts: ArtifactWriter) -> Result<Pipeline, PipelineError> {
        let stages = standard_stages(
            self.crawler.clone(),
            self.model.clone(),
            self.keywords.clone(),
            artifacts,
        );
        Ok(Pipeline::new(StageGraph::new(stages)?, self.schema.clone()))
    }

    /// Research `company`. Failures are reported through the state's `error` field.
    pub async fn run(&self, company: &str) -> ResearchState {
        let company = company.trim();
        if company.is_empty() {
            ::log::error!("Research requested without a company name");
            return ResearchState::failed("company name is required");
        }

        let artifacts = self.artifacts.subdir(&sanitize_filename(company));
        let pipeline = match self.pipeline(artifacts.clone()) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                ::log::error!("Invalid stage graph: {}", e);
                return ResearchState::failed(format!("invalid stage graph: {e}"));
            }
        };

        ::log::info!("Starting research for {}", company);
        let start = Instant::now();
        let state = pipeline.run(ResearchState::for_company(company)).await;
        match state.error() {
            Some(error) => ::log::warn!("Research for {} finished with error: {}", company, error),
            None => ::log::info!(
                "Research for {} finished in {:.2}s",
                company,
                start.elapsed().as_secs_f64()
            ),
        }

        artifacts.write("final_results.json", &state);
        state
    }
}

/// Builds a [`Researcher`] from `config` and runs it. Setup failures become an error state.
pub async fn research(config: &ResearchConfig, company: &str) -> ResearchState {
    match Researcher::from_config(config) {
        Ok(researcher) => researcher.run(company).await,
        Err(e) => {
            ::log::error!("Cannot start research: {}", e);
            ResearchState::failed(format!("research could not start: {e}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrawlError;
    use crate::pipeline::fields;
    use crate::results::{CrawlResult, Headings, PageRecord};
    use async_trait::async_trait;
    use serde_json::json;

    struct OnePageSite;

    #[async_trait]
    impl SiteCrawler for OnePageSite {
        async fn crawl(&self, target: &str) -> Result<CrawlResult, CrawlError> {
            let page = PageRecord {
                url: format!("https://{target}"),
                headings: Headings {
                    h1: vec!["Acme payroll".to_string()],
                    ..Headings::default()
                },
                paragraphs: vec!["Payroll and tax filing for small teams.".to_string()],
                ..PageRecord::default()
            };
            Ok(CrawlResult::aggregate(
                format!("https://{target}"),
                vec![page],
                &[0.8],
                vec![],
            ))
        }
    }

    /// Answers each stage's prompt with a plausible response
    struct ScriptedModel {
        fail_brand_identity: bool,
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            let reply = if prompt.contains("brand strategist") {
                if self.fail_brand_identity {
                    return Err(LlmError::Empty);
                }
                json!({"niche": "payroll software", "industry": "fintech",
                       "goals": ["grow"], "usp": ["fast"]})
            } else if prompt.contains("Answer Engine Optimization") {
                json!({"Content Quality & Depth": 80, "Localization": 40})
            } else if prompt.contains("SEO strategist") {
                json!([{"keyword": "payroll app", "Ranking_Score": 40},
                       {"keyword": "tax filing", "Ranking_Score": 60}])
            } else if prompt.contains("AI visibility analyst") {
                json!({"analysis": [
                    {"keyword": "payroll app", "top_competitor": "gusto.com", "company_mentions": 30},
                    {"keyword": "tax filing", "top_competitor": "acme.com", "company_mentions": 10}
                ]})
            } else if prompt.contains("brand intelligence") {
                json!({"brand_mention_count": 40, "traffic_estimate": "900/month",
                       "visibility_score": 12.5, "share_in_industry": "25%", "brand_rank": 2})
            } else {
                return Err(LlmError::NoJson);
            };
            Ok(reply.to_string())
        }
    }

    fn researcher(fail_brand_identity: bool, artifacts: ArtifactWriter) -> Researcher {
        Researcher::new(
            Arc::new(OnePageSite),
            Arc::new(ScriptedModel {
                fail_brand_identity,
            }),
            KeywordConfig {
                min_keywords: 2,
                max_keywords: 3,
                default_ranking_score: 50,
            },
            artifacts,
        )
    }

    #[test]
    fn test_standard_graph_levels() {
        let pipeline = researcher(false, ArtifactWriter::disabled())
            .pipeline(ArtifactWriter::disabled())
            .unwrap();
        assert_eq!(
            pipeline.graph().levels(),
            vec![
                vec!["scrape_website"],
                vec!["brand_identity", "periodic_table_analysis"],
                vec!["keyword_research"],
                vec!["prompt_page_analysis"],
                vec!["industry_analysis"],
                vec!["visibility_analysis"],
                vec!["brand_analytics"],
            ]
        );
    }

    #[tokio::test]
    async fn test_full_run() {
        let dir = tempfile::tempdir().unwrap();
        let state = researcher(false, ArtifactWriter::new(dir.path()))
            .run(" acme.com ")
            .await;

        assert_eq!(state.error(), None);
        assert_eq!(state.get_str(fields::COMPANY_NAME), Some("acme.com"));
        assert_eq!(state.get_str(fields::NICHE), Some("payroll software"));
        assert_eq!(
            state.get(fields::SEO_KEYWORDS),
            Some(&json!(["payroll app", "tax filing"]))
        );
        assert_eq!(
            state.get(fields::UNIQUE_COMPETITORS),
            Some(&json!(["gusto.com", "acme.com"]))
        );
        assert_eq!(
            state.get(fields::INDUSTRY_ANALYSIS).unwrap()["total_mentions"],
            json!(40)
        );
        assert_eq!(
            state.get(fields::VISIBILITY_REPORT).unwrap()["visibility_grade"],
            json!("D")
        );
        assert_eq!(
            state.get(fields::BRAND_METRICS).unwrap()["brand_rank"],
            json!(2)
        );

        let run_dir = dir.path().join("acme.com");
        for artifact in [
            "scraped_summary.json",
            "brand_guidelines.json",
            "periodic_table.json",
            "seo_keywords.json",
            "prompt.json",
            "competitors.json",
            "ranking_analysis_output.json",
            "visibility.json",
            "brand_metrics.json",
            "final_results.json",
        ] {
            assert!(run_dir.join(artifact).exists(), "{artifact} missing");
        }
    }

    #[tokio::test]
    async fn test_failed_stage_is_recorded() {
        let state = researcher(true, ArtifactWriter::disabled())
            .run("acme.com")
            .await;

        assert!(state.error().unwrap().starts_with("brand_identity failed"));
        assert!(!state.is_set(fields::NICHE));
        assert!(state.is_set(fields::VISIBILITY_REPORT));
        // downstream stages still run, falling back to defaults
        assert!(state.is_set(fields::SEO_KEYWORDS));
        assert!(state.is_set(fields::BRAND_METRICS));
    }

    #[tokio::test]
    async fn test_empty_company() {
        let state = researcher(false, ArtifactWriter::disabled()).run("  ").await;
        assert_eq!(state.error(), Some("company name is required"));
        assert!(!state.is_set(fields::COMPANY_NAME));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let mut config = ResearchConfig::default();
        config.llm.api_key = None;
        let state = research(&config, "acme.com").await;
        assert!(state.error().unwrap().starts_with("research could not start"));
    }
}
