use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field names used by the research pipeline
pub mod fields {
    pub const COMPANY_NAME: &str = "companyName";
    pub const WEBSITE_CONTENT: &str = "websiteContent";
    pub const WEBSITE_CONTENT_INDIVIDUAL: &str = "websiteContentIndividual";
    pub const SCRAPED_SUMMARY: &str = "scrapedSummary";
    pub const BRAND_GUIDELINES: &str = "brandGuidelines";
    pub const NICHE: &str = "niche";
    pub const INDUSTRY: &str = "industry";
    pub const GOALS: &str = "goals";
    pub const USP: &str = "usp";
    pub const PERIODIC_TABLE_REPORT: &str = "periodicTableReport";
    pub const SEO_KEYWORDS: &str = "seoKeywords";
    pub const PROMPT_REPORT: &str = "promptReport";
    pub const UNIQUE_COMPETITORS: &str = "uniqueCompetitors";
    pub const INDUSTRY_ANALYSIS: &str = "industryAnalysis";
    pub const RANKING_ANALYSIS_OUTPUT: &str = "rankingAnalysisOutput";
    pub const VISIBILITY_REPORT: &str = "visibilityReport";
    pub const BRAND_METRICS: &str = "brandMetrics";
    pub const ERROR: &str = "error";
}

/// Whether a value counts as populated: not null, and not an empty string, array or object
pub fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

/// The shared record threaded through one pipeline run.
///
/// Only the engine mutates it, by merging [`StateUpdate`]s. Stages get a
/// read-only snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResearchState(BTreeMap<String, Value>);

impl ResearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial state for researching `company`
    pub fn for_company(company: &str) -> Self {
        let mut state = Self::new();
        state
            .0
            .insert(fields::COMPANY_NAME.to_string(), Value::String(company.to_string()));
        state
    }

    /// Error-only state, used when a run cannot start at all
    pub fn failed(message: impl Into<String>) -> Self {
        let mut state = Self::new();
        state
            .0
            .insert(fields::ERROR.to_string(), Value::String(message.into()));
        state
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The field as a string, if it is a non-empty string
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Deserialize a field into `T`. Unset or mismatched fields give `None`.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.0
            .get(field)
            .filter(|v| is_set(v))
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn is_set(&self, field: &str) -> bool {
        self.0.get(field).is_some_and(is_set)
    }

    pub fn error(&self) -> Option<&str> {
        self.get_str(fields::ERROR)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn put(&mut self, field: String, value: Value) {
        self.0.insert(field, value);
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.0).unwrap_or(Value::Null)
    }
}

/// Partial output of one stage: the fields it wants to write
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate(BTreeMap<String, Value>);

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update that only records an error
    pub fn error(message: impl Into<String>) -> Self {
        Self::new().with(fields::ERROR, Value::String(message.into()))
    }

    pub fn with(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    /// Set a field from anything serializable. Serialization failures leave the field null.
    pub fn with_json<T: Serialize>(self, field: &str, value: &T) -> Self {
        let value = serde_json::to_value(value).unwrap_or_else(|e| {
            ::log::warn!("Could not serialize field {}: {}", field, e);
            Value::Null
        });
        self.with(field, value)
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.0.insert(field.to_string(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl IntoIterator for StateUpdate {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
