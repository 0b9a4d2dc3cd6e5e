//! Canonical opportunity record shared by the alpha feed and token pages.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::timestamp::normalize_timestamp;

pub const UNKNOWN_CHAIN: &str = "Unknown";
pub const NO_ANALYSIS: &str = "No analysis provided.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl Recommendation {
    /// Case-insensitive; anything unrecognized is `Hold`.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "buy" => Self::Buy,
            "sell" => Self::Sell,
            _ => Self::Hold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::Buy => "recommendation-buy",
            Self::Sell => "recommendation-sell",
            Self::Hold => "recommendation-hold",
        }
    }
}

impl<'de> Deserialize<'de> for Recommendation {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw
            .as_deref()
            .map(Recommendation::parse_lenient)
            .unwrap_or_default())
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An analysis result. `name` (the token symbol) is the dedup identity
/// within a calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Opportunity {
    pub name: String,
    pub chain: String,
    pub contract_address: Option<String>,
    pub market_cap: Option<f64>,
    pub justification: String,
    pub sources: Vec<String>,
    pub recommendation: Recommendation,
    pub community_score: Option<f64>,
    pub safety_score: Option<f64>,
    pub created_at: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MissingName,
    MissingCreatedAt,
    UnparseableCreatedAt,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::MissingName => "missing name",
            Self::MissingCreatedAt => "missing created_at",
            Self::UnparseableCreatedAt => "unparseable created_at",
        };
        f.write_str(text)
    }
}

const KNOWN_FIELDS: [&str; 10] = [
    "name",
    "chain",
    "contract_address",
    "market_cap",
    "justification",
    "sources",
    "recommendation",
    "community_score",
    "safety_score",
    "created_at",
];

impl Opportunity {
    /// Validates and backfills a loosely-typed record. Records without a
    /// name or a parseable `created_at` are rejected; everything else falls
    /// back to defaults.
    pub fn from_fields(mut fields: Map<String, Value>) -> Result<Self, RejectReason> {
        let name = field_string(&fields, "name").ok_or(RejectReason::MissingName)?;
        let created_at =
            field_string(&fields, "created_at").ok_or(RejectReason::MissingCreatedAt)?;
        if normalize_timestamp(&created_at).is_none() {
            return Err(RejectReason::UnparseableCreatedAt);
        }

        let chain = field_string(&fields, "chain").unwrap_or_else(|| UNKNOWN_CHAIN.to_string());
        let contract_address = field_string(&fields, "contract_address");
        let market_cap = field_number(&fields, "market_cap");
        let justification =
            field_string(&fields, "justification").unwrap_or_else(|| NO_ANALYSIS.to_string());
        let sources = field_sources(&fields);
        let recommendation = field_string(&fields, "recommendation")
            .map(|raw| Recommendation::parse_lenient(&raw))
            .unwrap_or_default();
        let community_score = field_number(&fields, "community_score");
        let safety_score = field_number(&fields, "safety_score");

        for key in KNOWN_FIELDS {
            fields.remove(key);
        }

        Ok(Self {
            name,
            chain,
            contract_address,
            market_cap,
            justification,
            sources,
            recommendation,
            community_score,
            safety_score,
            created_at,
            extra: fields,
        })
    }

    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        normalize_timestamp(&self.created_at)
    }

    pub fn community_score_label(&self) -> String {
        score_label(self.community_score)
    }

    pub fn safety_score_label(&self) -> String {
        score_label(self.safety_score)
    }
}

impl TryFrom<Map<String, Value>> for Opportunity {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> Result<Self, Self::Error> {
        Opportunity::from_fields(fields).map_err(|reason| format!("invalid opportunity: {reason}"))
    }
}

pub fn score_label(score: Option<f64>) -> String {
    match score {
        Some(value) if value.fract() == 0.0 => format!("{}", value as i64),
        Some(value) => format!("{value}"),
        None => "N/A".to_string(),
    }
}

fn field_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(text)) if !text.trim().is_empty() => Some(text.clone()),
        Some(Value::Number(number)) => Some(number.to_string()),
        _ => None,
    }
}

fn field_number(fields: &Map<String, Value>, key: &str) -> Option<f64> {
    match fields.get(key) {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn field_sources(fields: &Map<String, Value>) -> Vec<String> {
    match fields.get("sources") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str())
            .filter(|url| !url.trim().is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}
