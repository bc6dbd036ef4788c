use crate::artifacts::ArtifactWriter;
use crate::error::StageError;
use crate::llm::{LanguageModel, parse_object};
use crate::pipeline::{ResearchState, Stage, StateUpdate, fields};
use crate::stages::website_text;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// The answer-engine optimisation variables: (label shown to the model, report key)
pub const AEO_VARIABLES: [(&str, &str); 15] = [
    ("Content Quality & Depth", "Content_Quality_And_Depth"),
    ("Trustworthiness & Credibility", "Trustworthiness_And_Credibility"),
    ("Content Relevance", "Content_Relevance"),
    (
        "Citations & Mentions in Trusted Sources",
        "Citations_And_Mentions_In_Trusted_Sources",
    ),
    ("Topical Authority & Expertise", "Topical_Authority_And_Expertise"),
    (
        "Search Engine Rankings (Bing, Google)",
        "Search_Engine_Rankings_Bing_Google",
    ),
    ("Verifiable Performance Metrics", "Verifiable_Performance_Metrics"),
    ("Sentiment Analysis", "Sentiment_Analysis"),
    ("Data Frequency & Consistency", "Data_Frequency_And_Consistency"),
    ("Social Proof and Reviews", "Social_Proof_And_Reviews"),
    (
        "Structured Data (Schema Markup, etc.)",
        "Structured_Data_Schema_Markup",
    ),
    ("Content Freshness & Timeliness", "Content_Freshness_And_Timeliness"),
    (
        "Technical Performance (Speed, Mobile)",
        "Technical_Performance_Speed_Mobile",
    ),
    ("Localization", "Localization"),
    ("Social Signals", "Social_Signals"),
];

const CHECKLIST: &str = "\
- Content quality: comprehensive coverage, examples, no thin or keyword-stuffed copy
- Trust: cited sources, author credentials, privacy policy and editorial standards
- Relevance: content matches query intent and stays on topic
- Citations: links to and mentions from authoritative sources
- Authority: depth across the topic cluster, demonstrated expertise
- Rankings: visibility in Bing and Google results
- Metrics: verifiable numbers, case studies, benchmarks
- Sentiment: tone of reviews and mentions
- Consistency: regular publishing cadence and consistent facts
- Social proof: testimonials, ratings, reviews
- Structured data: schema.org markup, FAQ and product schema
- Freshness: recent updates and dated content
- Technical: speed, mobile friendliness, accessibility
- Localization: language and regional targeting
- Social signals: shares, followers, engagement";

pub struct PeriodicTableStage {
    model: Arc<dyn LanguageModel>,
    artifacts: ArtifactWriter,
}

impl PeriodicTableStage {
    pub fn new(model: Arc<dyn LanguageModel>, artifacts: ArtifactWriter) -> Self {
        Self { model, artifacts }
    }

    fn prompt(content: &str) -> String {
        let variables: Vec<String> = AEO_VARIABLES
            .iter()
            .enumerate()
            .map(|(i, (label, _))| format!("{}. {}", i + 1, label))
            .collect();
        let shape: Vec<String> = AEO_VARIABLES
            .iter()
            .map(|(label, _)| format!("  \"{label}\": 0"))
            .collect();
        format!(
            "You are a senior Answer Engine Optimization (AEO) specialist.\n\
             Score the website content below from 0 to 100 on each variable:\n{}\n\n\
             Judge on the basis of:\n{}\n\n\
             Base scores strictly on evidence in the content. Respond with JSON only:\n{{\n{}\n}}\n\n\
             WEBSITE CONTENT:\n{}",
            variables.join("\n"),
            CHECKLIST,
            shape.join(",\n"),
            content
        )
    }
}

/// Reads an integer score from a number or numeric string, truncating fractions
pub fn parse_score(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Integer score clamped to 0..=100. Anything unreadable is 0.
pub fn clamp_score(value: Option<&Value>) -> i64 {
    value
        .and_then(parse_score)
        .map(|s| s.clamp(0, 100))
        .unwrap_or(0)
}

/// Maps the model's labelled scores onto report keys
pub fn validate_scores(raw: &Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut labelled = Map::new();
    let mut report = Map::new();
    for (label, key) in AEO_VARIABLES {
        let value = raw.get(label);
        if value.is_none() {
            ::log::warn!("Missing score for {}, using 0", label);
        }
        let score = clamp_score(value);
        labelled.insert(label.to_string(), Value::from(score));
        report.insert(key.to_string(), Value::from(score));
    }
    (labelled, report)
}

#[async_trait]
impl Stage for PeriodicTableStage {
    fn name(&self) -> &'static str {
        "periodic_table_analysis"
    }

    fn reads(&self) -> &[&'static str] {
        &[fields::WEBSITE_CONTENT]
    }

    fn writes(&self) -> &[&'static str] {
        &[fields::PERIODIC_TABLE_REPORT]
    }

    async fn run(&self, state: &ResearchState) -> Result<StateUpdate, StageError> {
        let content = website_text(state)?;
        let response = self.model.generate(&Self::prompt(&content)).await?;
        let raw: Map<String, Value> = parse_object(&response)?;

        let (labelled, report) = validate_scores(&raw);
        self.artifacts.write("periodic_table.json", &labelled);

        Ok(StateUpdate::new().with(fields::PERIODIC_TABLE_REPORT, Value::Object(report)))
    }
}
