use crate::artifacts::ArtifactWriter;
use crate::error::StageError;
use crate::pipeline::{ResearchState, Stage, StateUpdate, fields};
use crate::stages::periodic_table::parse_score;
use crate::stages::round2;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One company's share of the mentions in the prompt report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareEntry {
    pub name: String,
    pub mention_count: i64,
    pub percentage: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryShare {
    pub shareholding_distribution: Vec<ShareEntry>,
    pub total_mentions: i64,
    pub unique_companies: usize,
}

/// Sums `company_mentions` per `top_competitor` and ranks companies by their share.
///
/// Ties keep the order in which companies first appear.
pub fn share_of_mentions(analysis: &[Value]) -> IndustryShare {
    let mut counts: Vec<(String, i64)> = Vec::new();
    for entry in analysis {
        let Some(company) = entry
            .get("top_competitor")
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
        else {
            continue;
        };
        let mentions = entry
            .get("company_mentions")
            .and_then(parse_score)
            .unwrap_or(0);
        match counts.iter_mut().find(|(name, _)| name == company) {
            Some((_, count)) => *count += mentions,
            None => counts.push((company.to_string(), mentions)),
        }
    }

    let total_mentions: i64 = counts.iter().map(|(_, c)| c).sum();
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let shareholding_distribution = counts
        .into_iter()
        .enumerate()
        .map(|(i, (name, mention_count))| {
            let percentage = if total_mentions > 0 {
                round2(mention_count as f64 / total_mentions as f64 * 100.0)
            } else {
                0.0
            };
            ShareEntry {
                name,
                mention_count,
                percentage,
                rank: i + 1,
            }
        })
        .collect::<Vec<_>>();

    IndustryShare {
        unique_companies: shareholding_distribution.len(),
        shareholding_distribution,
        total_mentions,
    }
}

/// Turns the prompt report into an industry ranking. No model call.
pub struct IndustryStage {
    artifacts: ArtifactWriter,
}

impl IndustryStage {
    pub fn new(artifacts: ArtifactWriter) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl Stage for IndustryStage {
    fn name(&self) -> &'static str {
        "industry_analysis"
    }

    fn reads(&self) -> &[&'static str] {
        &[fields::PROMPT_REPORT]
    }

    fn writes(&self) -> &[&'static str] {
        &[fields::INDUSTRY_ANALYSIS, fields::RANKING_ANALYSIS_OUTPUT]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        let analysis = state
            .get(fields::PROMPT_REPORT)
            .and_then(|report| report.get("analysis"))
            .ok_or(StageError::MissingInput(fields::PROMPT_REPORT))?;
        let analysis = analysis.as_array().ok_or_else(|| StageError::InvalidInput {
            field: fields::PROMPT_REPORT,
            reason: "analysis is not a list".to_string(),
        })?;

        if analysis.is_empty() {
            ::log::warn!("No prompt data found for industry analysis");
            return Ok(StateUpdate::new().with(
                fields::INDUSTRY_ANALYSIS,
                json!({ "error": "No prompt data available for analysis" }),
            ));
        }

        let share = share_of_mentions(analysis);
        ::log::info!(
            "Industry analysis: {} companies, {} mentions",
            share.unique_companies,
            share.total_mentions
        );
        self.artifacts.write("ranking_analysis_output.json", &share);

        Ok(StateUpdate::new()
            .with_json(fields::INDUSTRY_ANALYSIS, &share)
            .with_json(fields::RANKING_ANALYSIS_OUTPUT, &share))
    }
}
