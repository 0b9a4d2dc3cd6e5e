//! Report submission, re-analysis requests and the hourly analysis gate.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::opportunity::Recommendation;
use crate::token::{Token, TokenReport};

pub const ANALYSIS_COOLDOWN_MINUTES: i64 = 60;

/// Raw form input as submitted by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReportForm {
    #[serde(default)]
    pub mentions_purchasable_token: Option<String>,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default)]
    pub token_chain: String,
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub is_listed_on_dex: Option<String>,
    #[serde(default)]
    pub trading_pairs: String,
    #[serde(default)]
    pub confidence_score: String,
    #[serde(default)]
    pub reasoning: String,
}

impl ReportForm {
    /// Client-side validation; runs before any network or key check.
    pub fn validate(&self) -> Result<TokenReport, ValidationError> {
        let reasoning = self.reasoning.trim();
        if reasoning.is_empty() {
            return Err(ValidationError::ReasoningRequired);
        }

        let raw_score = self.confidence_score.trim();
        let confidence_score: i64 = raw_score
            .parse()
            .map_err(|_| ValidationError::ConfidenceNotANumber(raw_score.to_string()))?;
        if !(1..=10).contains(&confidence_score) {
            return Err(ValidationError::ConfidenceOutOfRange(confidence_score));
        }

        Ok(TokenReport {
            id: None,
            mentions_purchasable_token: checkbox(&self.mentions_purchasable_token),
            token_symbol: non_empty(&self.token_symbol),
            token_chain: non_empty(&self.token_chain),
            token_address: non_empty(&self.token_address),
            is_listed_on_dex: checkbox(&self.is_listed_on_dex),
            trading_pairs: split_pairs(&self.trading_pairs),
            confidence_score: Some(confidence_score),
            reasoning: Some(reasoning.to_string()),
            created_at: None,
            social_media_post: None,
        })
    }
}

fn checkbox(value: &Option<String>) -> bool {
    matches!(
        value.as_deref().map(str::trim),
        Some("on" | "true" | "1" | "yes")
    )
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn split_pairs(raw: &str) -> Option<Vec<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.split(',').map(|pair| pair.trim().to_string()).collect())
}

/// Body of `POST /api/multi_agent_alpha_scout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ScoutRequest {
    Report(TokenReport),
    Linked {
        token_report: TokenReport,
        token_report_id: Option<i64>,
    },
}

impl ScoutRequest {
    /// Re-analysis of a token from its latest analyzable report.
    pub fn for_token(token: &Token) -> Result<Self, ValidationError> {
        let latest = token
            .latest_report()
            .ok_or(ValidationError::NoAnalyzableReport)?;

        let token_report = TokenReport {
            id: None,
            created_at: None,
            social_media_post: None,
            trading_pairs: Some(latest.trading_pairs.clone().unwrap_or_default()),
            ..latest.clone()
        };

        Ok(Self::Linked {
            token_report,
            token_report_id: latest.id,
        })
    }
}

pub const SCOUT_REQUIRED_FIELDS: [&str; 5] =
    ["name", "chain", "justification", "sources", "recommendation"];

/// Analysis result returned by the scout endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoutResult {
    pub name: String,
    pub chain: String,
    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub community_score: Option<f64>,
    #[serde(default)]
    pub safety_score: Option<f64>,
    pub justification: String,
    pub sources: Vec<String>,
    pub recommendation: Recommendation,
}

impl ScoutResult {
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let fields = match &value {
            Value::Object(map) => map,
            _ => return Err(ValidationError::MissingResponseField(SCOUT_REQUIRED_FIELDS[0])),
        };
        check_required(fields)?;

        let mut fields = fields.clone();
        if let Some(Value::Array(sources)) = fields.get_mut("sources") {
            sources.retain(Value::is_string);
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|_| ValidationError::MissingResponseField(first_mistyped(&value)))
    }
}

fn check_required(fields: &Map<String, Value>) -> Result<(), ValidationError> {
    for field in SCOUT_REQUIRED_FIELDS {
        match fields.get(field) {
            None | Some(Value::Null) => return Err(ValidationError::MissingResponseField(field)),
            Some(_) => {}
        }
    }
    Ok(())
}

fn first_mistyped(value: &Value) -> &'static str {
    SCOUT_REQUIRED_FIELDS
        .into_iter()
        .find(|field| {
            let entry = &value[*field];
            if *field == "sources" {
                !entry.is_array()
            } else {
                !entry.is_string()
            }
        })
        .unwrap_or(SCOUT_REQUIRED_FIELDS[0])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisAvailability {
    Ready,
    CoolingDown { minutes_left: i64 },
}

impl AnalysisAvailability {
    /// Re-analysis is allowed once the latest analysis is an hour old.
    pub fn evaluate(last_analysis: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last) = last_analysis else {
            return Self::Ready;
        };

        let elapsed = now.signed_duration_since(last);
        if elapsed >= Duration::minutes(ANALYSIS_COOLDOWN_MINUTES) {
            return Self::Ready;
        }

        let minutes_left =
            (ANALYSIS_COOLDOWN_MINUTES - elapsed.num_minutes()).clamp(0, ANALYSIS_COOLDOWN_MINUTES);
        Self::CoolingDown { minutes_left }
    }

    pub fn for_token(token: &Token, now: DateTime<Utc>) -> Self {
        let last = token.latest_opportunity().and_then(|opp| opp.timestamp());
        Self::evaluate(last, now)
    }

    pub fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn message(self) -> String {
        match self {
            Self::Ready => String::new(),
            Self::CoolingDown { minutes_left } => format!(
                "Available in {minutes_left} minute{}",
                if minutes_left == 1 { "" } else { "s" }
            ),
        }
    }
}
