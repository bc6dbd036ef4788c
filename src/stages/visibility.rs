use crate::artifacts::ArtifactWriter;
use crate::error::StageError;
use crate::pipeline::{ResearchState, Stage, StateUpdate, fields};
use crate::stages::periodic_table::clamp_score;
use crate::stages::round2;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Answer engines with their own weighting, in the column order of [`WEIGHTS`]
pub const MODELS: [&str; 4] = ["gpt", "perplexity", "claude", "gemini"];

/// Per variable: (report key, overall weight, per-model weights, industry average)
pub const WEIGHTS: [(&str, f64, [f64; 4], f64); 15] = [
    ("Content_Quality_And_Depth", 9.25, [10.0, 10.0, 8.0, 9.0], 95.0),
    ("Trustworthiness_And_Credibility", 8.75, [10.0, 9.0, 9.0, 7.0], 85.0),
    ("Content_Relevance", 8.75, [9.0, 10.0, 8.0, 8.0], 85.0),
    ("Citations_And_Mentions_In_Trusted_Sources", 8.5, [7.0, 10.0, 9.0, 8.0], 95.0),
    ("Topical_Authority_And_Expertise", 8.5, [9.0, 8.0, 8.0, 7.0], 85.0),
    ("Search_Engine_Rankings_Bing_Google", 7.5, [7.0, 8.0, 6.0, 9.0], 85.0),
    ("Verifiable_Performance_Metrics", 7.5, [8.0, 7.0, 9.0, 6.0], 80.0),
    ("Sentiment_Analysis", 7.25, [8.0, 7.0, 8.0, 6.0], 85.0),
    ("Data_Frequency_And_Consistency", 7.25, [7.0, 10.0, 9.0, 3.0], 80.0),
    ("Social_Proof_And_Reviews", 7.25, [8.0, 7.0, 8.0, 6.0], 85.0),
    ("Structured_Data_Schema_Markup", 6.25, [6.0, 7.0, 6.0, 6.0], 80.0),
    ("Content_Freshness_And_Timeliness", 6.0, [7.0, 6.0, 6.0, 5.0], 80.0),
    ("Technical_Performance_Speed_Mobile", 5.75, [6.0, 6.0, 6.0, 5.0], 85.0),
    ("Localization", 5.75, [6.0, 6.0, 6.0, 5.0], 85.0),
    ("Social_Signals", 4.75, [6.0, 5.0, 5.0, 3.0], 85.0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableScore {
    pub score: i64,
    pub industry_avg: f64,
    pub variation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub score_percentage: f64,
    pub industry_avg_percentage: f64,
    pub visibility_grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibilityReport {
    pub score_percentage: f64,
    pub industry_avg_percentage: f64,
    pub visibility_grade: String,
    pub detailed: BTreeMap<String, VariableScore>,
    pub model_scores: BTreeMap<String, ModelScore>,
}

/// Letter grade for a percentage score
pub fn grade(percentage: f64) -> &'static str {
    match percentage {
        p if p >= 85.0 => "A+",
        p if p >= 75.0 => "A",
        p if p >= 65.0 => "B",
        p if p >= 50.0 => "C",
        _ => "D",
    }
}

/// Weighted (site, industry) percentages for one weight column
fn weighted(scores: &[i64], weight: impl Fn(usize) -> f64) -> (f64, f64) {
    let mut possible = 0.0;
    let mut site = 0.0;
    let mut industry = 0.0;
    for (i, (_, _, _, avg)) in WEIGHTS.iter().enumerate() {
        let w = weight(i);
        possible += w * 100.0;
        site += scores[i] as f64 * w;
        industry += avg * w;
    }
    (site / possible * 100.0, industry / possible * 100.0)
}

fn model_score(scores: &[i64], weight: impl Fn(usize) -> f64) -> ModelScore {
    let (site, industry) = weighted(scores, weight);
    ModelScore {
        score_percentage: round2(site),
        industry_avg_percentage: round2(industry),
        visibility_grade: grade(site).to_string(),
    }
}

/// Scores a periodic table report against the weight table and industry averages
pub fn evaluate(report: &Map<String, Value>) -> VisibilityReport {
    let scores: Vec<i64> = WEIGHTS
        .iter()
        .map(|(key, ..)| clamp_score(report.get(*key)))
        .collect();

    let overall = model_score(&scores, |i| WEIGHTS[i].1);
    let detailed = WEIGHTS
        .iter()
        .zip(&scores)
        .map(|((key, _, _, avg), &score)| {
            let variation = if score != 0 {
                (score as f64 - avg) / score as f64 * 100.0
            } else {
                0.0
            };
            (
                key.to_string(),
                VariableScore {
                    score,
                    industry_avg: *avg,
                    variation: round2(variation),
                },
            )
        })
        .collect();
    let model_scores = MODELS
        .iter()
        .enumerate()
        .map(|(m, name)| {
            (
                name.to_string(),
                model_score(&scores, |i| WEIGHTS[i].2[m]),
            )
        })
        .collect();

    VisibilityReport {
        score_percentage: overall.score_percentage,
        industry_avg_percentage: overall.industry_avg_percentage,
        visibility_grade: overall.visibility_grade,
        detailed,
        model_scores,
    }
}

/// Grades the site's AEO scores overall and per answer engine. No model call.
pub struct VisibilityStage {
    artifacts: ArtifactWriter,
}

impl VisibilityStage {
    pub fn new(artifacts: ArtifactWriter) -> Self {
        Self { artifacts }
    }
}

#[async_trait]
impl Stage for VisibilityStage {
    fn name(&self) -> &'static str {
        "visibility_analysis"
    }

    fn reads(&self) -> &[&'static str] {
        &[fields::PERIODIC_TABLE_REPORT]
    }

    fn writes(&self) -> &[&'static str] {
        &[fields::VISIBILITY_REPORT]
    }

    fn after(&self) -> &[&'static str] {
        &["industry_analysis"]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        let Some(report) = state
            .get(fields::PERIODIC_TABLE_REPORT)
            .and_then(Value::as_object)
        else {
            ::log::warn!("No periodic table report, skipping visibility scoring");
            return Ok(StateUpdate::new());
        };

        let visibility = evaluate(report);
        ::log::info!(
            "Visibility score {}% (grade {}), industry average {}%",
            visibility.score_percentage,
            visibility.visibility_grade,
            visibility.industry_avg_percentage
        );
        self.artifacts.write("visibility.json", &visibility);

        Ok(StateUpdate::new().with_json(fields::VISIBILITY_REPORT, &visibility))
    }
}
