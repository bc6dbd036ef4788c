use crate::artifacts::ArtifactWriter;
use crate::error::StageError;
use crate::llm::{LanguageModel, parse_object};
use crate::pipeline::{ResearchState, Stage, StateUpdate, fields};
use crate::stages::website_text;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

const PROMPT: &str = r#"You are an expert brand strategist. Analyse the website content below and extract the company's brand identity.

Base every insight strictly on the content. Give 5-8 specific, non-overlapping goals and unique selling propositions, ranked by strength of evidence.

Respond with JSON only, in exactly this shape:
{
  "name": "Company Name",
  "niche": "specific market niche",
  "industry": "broader industry",
  "description": "one sentence description",
  "goals": ["goal", "..."],
  "usp": ["unique selling proposition", "..."]
}

WEBSITE CONTENT:
"#;

/// Niche, industry, goals and USPs inferred from the site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrandGuidelines {
    #[serde(default)]
    pub niche: String,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub usp: Vec<String>,
}

pub struct BrandIdentityStage {
    model: Arc<dyn LanguageModel>,
    artifacts: ArtifactWriter,
}

impl BrandIdentityStage {
    pub fn new(model: Arc<dyn LanguageModel>, artifacts: ArtifactWriter) -> Self {
        Self { model, artifacts }
    }
}

#[async_trait]
impl Stage for BrandIdentityStage {
    fn name(&self) -> &'static str {
        "brand_identity"
    }

    fn reads(&self) -> &[&'static str] {
        &[fields::WEBSITE_CONTENT]
    }

    fn writes(&self) -> &[&'static str] {
        &[
            fields::BRAND_GUIDELINES,
            fields::NICHE,
            fields::INDUSTRY,
            fields::GOALS,
            fields::USP,
        ]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        let content = website_text(state)?;
        let response = self.model.generate(&format!("{PROMPT}{content}")).await?;

        let raw: Value = parse_object(&response)?;
        self.artifacts.write("brand_guidelines.json", &raw);
        let guidelines: BrandGuidelines = serde_json::from_value(raw)
            .map_err(|e| StageError::Shape(format!("brand guidelines: {e}")))?;
        ::log::info!(
            "Brand identity: niche '{}', industry '{}'",
            guidelines.niche,
            guidelines.industry
        );

        Ok(StateUpdate::new()
            .with_json(fields::BRAND_GUIDELINES, &guidelines)
            .with(fields::NICHE, guidelines.niche.clone())
            .with(fields::INDUSTRY, guidelines.industry.clone())
            .with_json(fields::GOALS, &guidelines.goals)
            .with_json(fields::USP, &guidelines.usp))
    }
}
