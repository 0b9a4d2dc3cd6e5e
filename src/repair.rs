//! Best-effort recovery of the malformed JSON the alpha-reports endpoint
//! occasionally emits.
//!
//! Repairs are an explicit, ordered list of textual find/replace rules, one
//! per known producer bug. Anything the rules do not fix is a hard
//! [`ParseError::Malformed`].

use std::borrow::Cow;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ParseError;

const SANITIZED_KEY: &str = "contract_address";

#[derive(Debug)]
pub struct RepairRule {
    pub name: &'static str,
    pattern: Regex,
    replacement: &'static str,
}

impl RepairRule {
    fn new(name: &'static str, pattern: &str, replacement: &'static str) -> Self {
        Self {
            name,
            // Patterns are compile-time constants covered by unit tests.
            pattern: Regex::new(pattern).unwrap_or_else(|err| {
                panic!("repair rule {name} has an invalid pattern: {err}")
            }),
            replacement,
        }
    }

    pub fn apply<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.pattern.replace_all(input, self.replacement)
    }
}

/// Rules in application order.
pub fn repair_rules() -> &'static [RepairRule] {
    static RULES: OnceLock<Vec<RepairRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            RepairRule::new("comma_before_id_object", r#"\}\{"id""#, r#"},{"id""#),
            RepairRule::new("comma_before_name_object", r#"\}\{"name""#, r#"},{"name""#),
            RepairRule::new(
                "colon_before_literal",
                r#""([^"]+)"(\d+|true|false)"#,
                r#""$1":$2"#,
            ),
            RepairRule::new("colon_before_array", r#""([^"]+)"\["#, r#""$1":["#),
            RepairRule::new("comma_between_object_and_array", r#"\}\["#, "},["),
        ]
    })
}

/// Runs every rule in order over `input`, returning the patched text and the
/// names of the rules that changed something.
pub fn apply_repairs(input: &str) -> (String, Vec<&'static str>) {
    let mut text = input.to_string();
    let mut applied = Vec::new();

    for rule in repair_rules() {
        if let Cow::Owned(patched) = rule.apply(&text) {
            applied.push(rule.name);
            text = patched;
        }
    }

    (text, applied)
}

/// Strict parse first; on a syntax error, apply the repair rules once and
/// retry. The error surfaced on failure wraps the original parse message.
pub fn parse_with_repair(body: &str) -> Result<Value, ParseError> {
    let original_err = match serde_json::from_str::<Value>(body) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let (patched, applied) = apply_repairs(body);
    if applied.is_empty() {
        warn!(
            component = "json_repair",
            event = "repair.no_rule_matched",
            error = %original_err
        );
        return Err(ParseError::Malformed(original_err.to_string()));
    }

    match serde_json::from_str::<Value>(&patched) {
        Ok(value) => {
            debug!(
                component = "json_repair",
                event = "repair.applied",
                rules = ?applied
            );
            Ok(value)
        }
        Err(repaired_err) => {
            warn!(
                component = "json_repair",
                event = "repair.failed",
                rules = ?applied,
                error = %original_err,
                repaired_error = %repaired_err
            );
            Err(ParseError::Malformed(original_err.to_string()))
        }
    }
}

/// Strips a single leading `:` from every string stored under
/// `contract_address`, at any depth. Everything else is left untouched.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, entry)| {
                    let entry = match entry {
                        Value::String(text) if key == SANITIZED_KEY => {
                            Value::String(strip_one_colon(text))
                        }
                        other => sanitize(other),
                    };
                    (key, entry)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

fn strip_one_colon(text: String) -> String {
    match text.strip_prefix(':') {
        Some(rest) => rest.to_string(),
        None => text,
    }
}
