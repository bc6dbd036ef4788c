use crate::artifacts::ArtifactWriter;
use crate::error::StageError;
use crate::llm::{LanguageModel, parse_object};
use crate::pipeline::{ResearchState, Stage, StateUpdate, fields};
use crate::results::CrawlResult;
use crate::stages::string_list;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::Arc;

/// Asks the model how each keyword surfaces in AI answers and who wins it
pub struct PromptPageStage {
    model: Arc<dyn LanguageModel>,
    artifacts: ArtifactWriter,
}

impl PromptPageStage {
    pub fn new(model: Arc<dyn LanguageModel>, artifacts: ArtifactWriter) -> Self {
        Self { model, artifacts }
    }

    fn prompt(content: &str, keywords: &[String], company: &str) -> String {
        let keywords = serde_json::to_string_pretty(keywords).unwrap_or_default();
        format!(
            "ROLE: Expert SEO and AI visibility analyst\n\n\
             WEBSITE CONTENT:\n{content}\n\n\
             TARGET KEYWORDS:\n{keywords}\n\n\
             Analyse each keyword for AI model visibility and traditional SEO competition.\n\n\
             OUTPUT FORMAT (JSON ONLY):\n{}",
            OUTPUT_FORMAT.replace("{company}", company)
        )
    }
}

const OUTPUT_FORMAT: &str = r#"{
  "analysis": [
    {
      "keyword": "exact keyword phrase",
      "prompt": "a related question a user would ask an LLM",
      "competition_score": 1-100,
      "top_competitor": "domain.com or brand name (use {company} if it leads)",
      "top_competitor_mentions": 0,
      "company_rank": 1-100 or "Not Ranked",
      "company_mentions": 0,
      "top_model": "ChatGPT|Perplexity|Gemini|Claude|Bing|Other",
      "intent": "informational|commercial|navigational|transactional"
    }
  ]
}

Include every field for every keyword. Return only valid JSON."#;

/// `top_competitor` values in first-seen order, without repeats
pub fn unique_competitors(report: &Map<String, Value>) -> Vec<String> {
    let Some(Value::Array(analysis)) = report.get("analysis") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    analysis
        .iter()
        .filter_map(|item| match item.get("top_competitor")? {
            Value::String(name) => Some(name.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[async_trait]
impl Stage for PromptPageStage {
    fn name(&self) -> &'static str {
        "prompt_page_analysis"
    }

    fn reads(&self) -> &[&'static str] {
        &[
            fields::WEBSITE_CONTENT,
            fields::SEO_KEYWORDS,
            fields::COMPANY_NAME,
        ]
    }

    fn writes(&self) -> &[&'static str] {
        &[fields::PROMPT_REPORT, fields::UNIQUE_COMPETITORS]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        let content: Option<CrawlResult> = state.get_as(fields::WEBSITE_CONTENT);
        let keywords = string_list(state, fields::SEO_KEYWORDS);
        let Some(content) = content.filter(|_| !keywords.is_empty()) else {
            ::log::error!("Missing website content or SEO keywords, skipping prompt analysis");
            return Ok(StateUpdate::new());
        };
        let company = state.get_str(fields::COMPANY_NAME).unwrap_or_default();

        let response = self
            .model
            .generate(&Self::prompt(&content.as_text(), &keywords, company))
            .await?;
        let report: Map<String, Value> = parse_object(&response).unwrap_or_else(|e| {
            ::log::error!("Could not parse prompt report: {}", e);
            Map::new()
        });

        let competitors = unique_competitors(&report);
        ::log::info!(
            "Prompt report covers {} competitors",
            competitors.len()
        );
        if !report.is_empty() {
            self.artifacts.write("prompt.json", &report);
        }
        self.artifacts.write(
            "competitors.json",
            &json!({ "unique_competitors": competitors }),
        );

        Ok(StateUpdate::new()
            .with(fields::PROMPT_REPORT, Value::Object(report))
            .with_json(fields::UNIQUE_COMPETITORS, &competitors))
    }
}
