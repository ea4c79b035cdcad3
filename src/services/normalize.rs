//! Lenient parsing of values coming back from the AI model and the product
//! catalog, which both like to send numbers as strings and enums in whatever
//! spelling they feel like.

use serde_json::Value;

use crate::models::{DataConfidence, Grade, VerdictLabel};

/// A number from a JSON number or a numeric string ("85", "85%", "1,5 g").
pub fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned = s
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
                .collect::<String>()
                .replace(',', ".");
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Nutrient amounts are never negative; unparseable ones count as zero.
pub fn nutrient_amount(value: Option<&Value>) -> f64 {
    value.and_then(loose_number).unwrap_or(0.0).max(0.0)
}

pub fn clamp_percent(percent: f64) -> f64 {
    percent.clamp(0.0, 100.0)
}

pub fn parse_verdict_label(raw: &str) -> Option<VerdictLabel> {
    let normalized = raw
        .trim()
        .to_lowercase()
        .replace([' ', '-'], "_");

    match normalized.as_str() {
        "safe" => Some(VerdictLabel::Safe),
        "occasionally_safe" | "occasionally" | "moderate" => Some(VerdictLabel::OccasionallySafe),
        "not_safe" | "unsafe" => Some(VerdictLabel::NotSafe),
        _ => None,
    }
}

pub fn parse_grade(raw: &str) -> Option<Grade> {
    match raw.trim().chars().next()?.to_ascii_uppercase() {
        'A' => Some(Grade::A),
        'B' => Some(Grade::B),
        'C' => Some(Grade::C),
        'D' => Some(Grade::D),
        'E' => Some(Grade::E),
        _ => None,
    }
}

/// "high (estimated)" still means high.
pub fn parse_confidence(raw: &str) -> Option<DataConfidence> {
    let lower = raw.trim().to_lowercase();
    if lower.starts_with("high") {
        Some(DataConfidence::High)
    } else if lower.starts_with("medium") {
        Some(DataConfidence::Medium)
    } else if lower.starts_with("low") {
        Some(DataConfidence::Low)
    } else {
        None
    }
}

/// OpenFoodFacts tags ("en:gluten-free") to display text ("Gluten Free").
pub fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let text = item.replace("en:", "").replace('-', " ");
            text.split_whitespace()
                .map(title_case)
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|item| !item.is_empty())
        .collect()
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Labels that read like marketing claims ("Gluten Free", "No Added Sugar").
pub fn marketing_claims(labels: &[String]) -> Vec<String> {
    labels
        .iter()
        .filter(|l| l.contains("Free") || l.contains("No "))
        .cloned()
        .collect()
}

/// Strip a markdown code fence around a JSON answer.
pub fn clean_json_text(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}
