use crate::artifacts::ArtifactWriter;
use crate::config::KeywordConfig;
use crate::error::StageError;
use crate::llm::{LanguageModel, parse_array};
use crate::pipeline::{ResearchState, Stage, StateUpdate, fields};
use crate::stages::periodic_table::parse_score;
use crate::stages::string_list;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const UNKNOWN_NICHE: &str = "unknown_niche";
const UNKNOWN_INDUSTRY: &str = "unknown_industry";

/// One SEO keyword with its estimated ranking difficulty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub keyword: String,
    #[serde(rename = "Ranking_Score")]
    pub ranking_score: i64,
}

pub struct KeywordResearchStage {
    model: Arc<dyn LanguageModel>,
    config: KeywordConfig,
    artifacts: ArtifactWriter,
}

impl KeywordResearchStage {
    pub fn new(model: Arc<dyn LanguageModel>, config: KeywordConfig, artifacts: ArtifactWriter) -> Self {
        Self {
            model,
            config,
            artifacts,
        }
    }

    fn prompt(niche: &str, industry: &str, goals: &[String], usp: &[String]) -> String {
        let goals = if goals.is_empty() {
            "no specific goals provided".to_string()
        } else {
            goals.join(", ")
        };
        let usp = if usp.is_empty() {
            "no specific USPs provided".to_string()
        } else {
            usp.join(", ")
        };
        format!(
            "You are an expert SEO strategist. Generate 90-100 targeted SEO keywords and search \
             phrases for the '{niche}' niche within the '{industry}' industry.\n\
             Business goals: {goals}\n\
             Unique selling propositions: {usp}\n\n\
             Cover informational, commercial, transactional and navigational intent across the \
             whole buyer journey. Mix short head terms with long-tail phrases of four or more words.\n\
             Give each keyword a Ranking_Score from 5 to 95 estimating how hard it is to rank for.\n\n\
             Respond with a JSON array only, where each element looks like:\n\
             {{\"keyword\": \"specific keyword phrase\", \"Ranking_Score\": 45}}"
        )
    }

    /// Truncates to the maximum, pads with fillers to the minimum, then drops
    /// malformed entries and scores outside 0..=100.
    pub fn normalize(&self, niche: &str, raw: Vec<Value>) -> Vec<Keyword> {
        let mut entries: Vec<Value> = raw.into_iter().take(self.config.max_keywords).collect();
        if entries.len() < self.config.min_keywords {
            ::log::warn!(
                "Generated {} keywords, adding fillers to reach {}",
                entries.len(),
                self.config.min_keywords
            );
            let missing = self.config.min_keywords - entries.len();
            for i in 1..=missing {
                entries.push(serde_json::json!({
                    "keyword": format!("{niche} keyword {i}"),
                    "Ranking_Score": self.config.default_ranking_score,
                }));
            }
        }

        entries
            .into_iter()
            .filter_map(|entry| {
                let keyword = entry.get("keyword")?.as_str()?.to_string();
                match entry.get("Ranking_Score").and_then(parse_score) {
                    Some(score) if (0..=100).contains(&score) => Some(Keyword {
                        keyword,
                        ranking_score: score,
                    }),
                    _ => {
                        ::log::warn!("Invalid Ranking_Score for keyword: {}", keyword);
                        None
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl Stage for KeywordResearchStage {
    fn name(&self) -> &'static str {
        "keyword_research"
    }

    fn reads(&self) -> &[&'static str] {
        &[fields::NICHE, fields::INDUSTRY, fields::GOALS, fields::USP]
    }

    fn writes(&self) -> &[&'static str] {
        &[fields::SEO_KEYWORDS]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        let niche = state.get_str(fields::NICHE).unwrap_or(UNKNOWN_NICHE);
        let industry = state.get_str(fields::INDUSTRY).unwrap_or(UNKNOWN_INDUSTRY);
        let goals = string_list(state, fields::GOALS);
        let usp = string_list(state, fields::USP);
        ::log::info!("Generating keywords for niche: {}, industry: {}", niche, industry);

        let response = self
            .model
            .generate(&Self::prompt(niche, industry, &goals, &usp))
            .await?;
        let raw: Vec<Value> = parse_array(&response)?;
        let keywords = self.normalize(niche, raw);
        ::log::info!("Generated {} valid keywords", keywords.len());

        self.artifacts.write("seo_keywords.json", &keywords);
        let names: Vec<String> = keywords.into_iter().map(|k| k.keyword).collect();
        Ok(StateUpdate::new().with_json(fields::SEO_KEYWORDS, &names))
    }
}
