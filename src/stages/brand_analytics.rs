use crate::artifacts::ArtifactWriter;
use crate::error::StageError;
use crate::llm::{LanguageModel, parse_object};
use crate::pipeline::{ResearchState, Stage, StateUpdate, fields};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Headline brand numbers estimated from the visibility and ranking reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandMetrics {
    pub brand_mention_count: i64,
    pub traffic_estimate: String,
    pub visibility_score: f64,
    pub share_in_industry: String,
    pub brand_rank: i64,
}

pub struct BrandAnalyticsStage {
    model: Arc<dyn LanguageModel>,
    artifacts: ArtifactWriter,
}

impl BrandAnalyticsStage {
    pub fn new(model: Arc<dyn LanguageModel>, artifacts: ArtifactWriter) -> Self {
        Self { model, artifacts }
    }

    fn prompt(company: &str, visibility: &Value, ranking: &Value) -> String {
        let pretty = |v: &Value| serde_json::to_string_pretty(v).unwrap_or_default();
        format!(
            "You are a competitive brand intelligence analyst.\n\n\
             1. Visibility and trust analysis of {company}:\n{}\n\n\
             2. Competitor ranking across the analysed prompts:\n{}\n\n\
             From both, infer realistic, data-informed estimates for {company}:\n\
             - brand_mention_count (integer)\n\
             - traffic_estimate (string, e.g. \"5000/month\")\n\
             - visibility_score (number between 0 and 100)\n\
             - share_in_industry (string percentage, e.g. \"17.5%\")\n\
             - brand_rank (integer, 1 is best)\n\n\
             Respond with JSON only, like:\n\
             {{\"brand_mention_count\": 1200, \"traffic_estimate\": \"5000/month\", \
             \"visibility_score\": 76.4, \"share_in_industry\": \"16.3%\", \"brand_rank\": 3}}",
            pretty(visibility),
            pretty(ranking)
        )
    }
}

#[async_trait]
impl Stage for BrandAnalyticsStage {
    fn name(&self) -> &'static str {
        "brand_analytics"
    }

    fn reads(&self) -> &[&'static str] {
        &[
            fields::VISIBILITY_REPORT,
            fields::RANKING_ANALYSIS_OUTPUT,
        ]
    }

    fn writes(&self) -> &[&'static str] {
        &[fields::BRAND_METRICS]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        let company = state.get_str(fields::COMPANY_NAME).unwrap_or_default();
        let empty = Value::Object(Default::default());
        let visibility = state.get(fields::VISIBILITY_REPORT).unwrap_or(&empty);
        let ranking = state.get(fields::RANKING_ANALYSIS_OUTPUT).unwrap_or(&empty);

        ::log::info!("Generating brand metrics for {}", company);
        let response = self
            .model
            .generate(&Self::prompt(company, visibility, ranking))
            .await?;
        let metrics: BrandMetrics = parse_object::<Value>(&response)
            .map_err(StageError::from)
            .and_then(|raw| {
                serde_json::from_value(raw)
                    .map_err(|e| StageError::Shape(format!("brand metrics: {e}")))
            })?;

        self.artifacts.write("brand_metrics.json", &metrics);
        Ok(StateUpdate::new().with_json(fields::BRAND_METRICS, &metrics))
    }
}
