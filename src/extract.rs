//! Turns the alpha-reports payload into canonical [`Opportunity`] records.
//!
//! Shape detection happens once, at the boundary: the payload is either a
//! batch of report objects or a single report object. Each report either
//! nests an `opportunities` array or is itself a flat opportunity.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ParseError;
use crate::opportunity::{Opportunity, Recommendation, UNKNOWN_CHAIN};

pub const UNKNOWN_TOKEN: &str = "Unknown Token";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReportPayload {
    Batch(Vec<Map<String, Value>>),
    Single(Map<String, Value>),
}

impl ReportPayload {
    pub fn decode(value: Value) -> Result<Self, ParseError> {
        let kind = value_kind(&value);
        ReportPayload::deserialize(value).map_err(|_| {
            ParseError::UnsupportedShape(format!(
                "expected a report object or an array of report objects, got {kind}"
            ))
        })
    }

    pub fn into_reports(self) -> Vec<Map<String, Value>> {
        match self {
            Self::Batch(reports) => reports,
            Self::Single(report) => vec![report],
        }
    }
}

/// Flattens every report into opportunity records. Never fails on missing
/// fields: records that cannot be validated are dropped and logged.
pub fn extract_opportunities(payload: ReportPayload) -> Vec<Opportunity> {
    let mut out = Vec::new();
    let mut discarded = 0usize;

    for report in payload.into_reports() {
        for raw in raw_opportunities(&report) {
            let fields = synthesize_fields(&report, raw);
            match Opportunity::from_fields(fields) {
                Ok(opportunity) => out.push(opportunity),
                Err(reason) => {
                    discarded += 1;
                    debug!(
                        component = "extractor",
                        event = "opportunity.discarded",
                        reason = %reason
                    );
                }
            }
        }
    }

    if discarded > 0 {
        debug!(
            component = "extractor",
            event = "extract.summary",
            kept = out.len(),
            discarded
        );
    }

    out
}

fn raw_opportunities(report: &Map<String, Value>) -> Vec<&Map<String, Value>> {
    match report.get("opportunities") {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => vec![report],
    }
}

/// Defaults derived from the report, shallow-merged with the opportunity's own
/// fields. Opportunity fields win, including explicit nulls.
fn synthesize_fields(report: &Map<String, Value>, opportunity: &Map<String, Value>) -> Map<String, Value> {
    let mut fields = Map::new();

    fields.insert(
        "name".to_string(),
        Value::String(derive_name(report, opportunity)),
    );
    if let Some(created_at) = opportunity
        .get("created_at")
        .or_else(|| report.get("created_at"))
    {
        fields.insert("created_at".to_string(), created_at.clone());
    }
    fields.insert(
        "chain".to_string(),
        non_empty_str(report, "token_chain")
            .map(|chain| Value::String(chain.to_string()))
            .unwrap_or_else(|| Value::String(UNKNOWN_CHAIN.to_string())),
    );
    if let Some(address) = report.get("token_address") {
        fields.insert("contract_address".to_string(), address.clone());
    }
    fields.insert(
        "recommendation".to_string(),
        Value::String(Recommendation::Hold.as_str().to_string()),
    );
    if let Some(justification) = derive_justification(report, opportunity) {
        fields.insert("justification".to_string(), Value::String(justification));
    }

    for (key, value) in opportunity {
        if key == "opportunities" {
            continue;
        }
        fields.insert(key.clone(), value.clone());
    }

    fields
}

fn derive_name(report: &Map<String, Value>, opportunity: &Map<String, Value>) -> String {
    non_empty_str(opportunity, "message")
        .and_then(dollar_symbol)
        .or_else(|| non_empty_str(report, "message").and_then(dollar_symbol))
        .or_else(|| {
            non_empty_str(report, "token_symbol").map(|symbol| symbol.trim().to_uppercase())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_TOKEN.to_string())
}

fn derive_justification(
    report: &Map<String, Value>,
    opportunity: &Map<String, Value>,
) -> Option<String> {
    non_empty_str(opportunity, "analysis")
        .or_else(|| non_empty_str(opportunity, "message"))
        .or_else(|| non_empty_str(report, "analysis"))
        .or_else(|| non_empty_str(report, "message"))
        .map(str::to_string)
}

/// First `$SYMBOL` mention in free text, without the dollar sign.
pub fn dollar_symbol(text: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"\$([A-Z0-9_]+)").expect("dollar symbol pattern is valid")
    });

    pattern
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|symbol| symbol.as_str().to_string())
}

fn non_empty_str<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array containing non-objects",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(value: Value) -> Vec<Opportunity> {
        extract_opportunities(ReportPayload::decode(value).unwrap())
    }

    #[test]
    fn decodes_batch_and_single_shapes() {
        assert!(matches!(
            ReportPayload::decode(json!([{"id": 1}])).unwrap(),
            ReportPayload::Batch(_)
        ));
        assert!(matches!(
            ReportPayload::decode(json!({"id": 1})).unwrap(),
            ReportPayload::Single(_)
        ));
    }

    #[test]
    fn rejects_unknown_shapes() {
        for value in [json!("text"), json!(3), json!([1, 2]), json!(null)] {
            let err = ReportPayload::decode(value).unwrap_err();
            assert!(matches!(err, ParseError::UnsupportedShape(_)));
        }
    }

    #[test]
    fn nested_opportunities_inherit_report_context() {
        let opps = extract(json!([{
            "message": "everyone is talking about $PEPE today",
            "analysis": "report level analysis",
            "created_at": "2024-05-01T08:00:00",
            "token_chain": "base",
            "token_address": "0xabc",
            "opportunities": [
                {"market_cap": 1000},
                {"message": "but $WIF too", "created_at": "2024-05-01T09:00:00", "recommendation": "BUY"}
            ]
        }]));

        assert_eq!(opps.len(), 2);
        assert_eq!(opps[0].name, "PEPE");
        assert_eq!(opps[0].created_at, "2024-05-01T08:00:00");
        assert_eq!(opps[0].chain, "base");
        assert_eq!(opps[0].contract_address.as_deref(), Some("0xabc"));
        assert_eq!(opps[0].justification, "report level analysis");
        assert_eq!(opps[0].recommendation, Recommendation::Hold);

        assert_eq!(opps[1].name, "WIF");
        assert_eq!(opps[1].justification, "but $WIF too");
        assert_eq!(opps[1].recommendation, Recommendation::Buy);
    }

    #[test]
    fn flat_report_is_a_single_opportunity() {
        let opps = extract(json!({
            "token_symbol": "doge",
            "created_at": "2024-05-01T08:00:00",
            "reasoning": "kept as an extra field"
        }));

        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].name, "DOGE");
        assert_eq!(opps[0].chain, UNKNOWN_CHAIN);
        assert_eq!(
            opps[0].extra.get("reasoning"),
            Some(&json!("kept as an extra field"))
        );
    }

    #[test]
    fn opportunity_fields_win_over_derived_defaults() {
        let opps = extract(json!({
            "message": "$AAA",
            "created_at": "2024-05-01T08:00:00",
            "opportunities": [{"name": "Explicit", "chain": "solana", "justification": "own"}]
        }));

        assert_eq!(opps[0].name, "Explicit");
        assert_eq!(opps[0].chain, "solana");
        assert_eq!(opps[0].justification, "own");
    }

    #[test]
    fn falls_back_to_unknown_token_name() {
        let opps = extract(json!({"message": "no tickers here $lower", "created_at": "2024-05-01T08:00:00"}));
        assert_eq!(opps[0].name, UNKNOWN_TOKEN);
    }

    #[test]
    fn invalid_records_are_discarded_not_raised() {
        let opps = extract(json!([
            {"message": "$OK", "created_at": "2024-05-01T08:00:00"},
            {"message": "$NOTS"},
            {"message": "$BAD", "created_at": "tomorrow"},
            {"message": "$NULL", "opportunities": [{"created_at": null}]}
        ]));

        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].name, "OK");
    }

    #[test]
    fn dollar_symbol_requires_uppercase_letters_digits_or_underscores() {
        assert_eq!(dollar_symbol("buy $BTC_2 now"), Some("BTC_2".to_string()));
        assert_eq!(dollar_symbol("price is $5"), Some("5".to_string()));
        assert_eq!(dollar_symbol("$eth"), None);
    }
}
